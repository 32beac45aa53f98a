//! Seekable read stream over one archive member.
use super::codec::{self, Decompressor};
use super::index::FileEntry;
use crate::ext::io::*;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

/// A seekable byte stream over one file packed in an XP3 archive.
///
/// The stream maps logical file offsets onto the entry's segment list and
/// lazily opens a decompressor for the segment the cursor is in. It shares
/// the archive's source stream, so any number of file streams may be open
/// at once.
pub struct Xp3File<T: Read + Seek> {
    stream: Arc<Mutex<T>>,
    entry: FileEntry,
    /// Prefix sums of segment original sizes, for offset lookup.
    seg_pos: Vec<u64>,
    pos: u64,
    /// Decoder over the currently straddled compressed segment.
    cache: Option<Decompressor<StreamRegion<MutexWrapper<T>>>>,
}

impl<T: Read + Seek> std::fmt::Debug for Xp3File<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Xp3File")
            .field("filename", &self.entry.filename)
            .field("pos", &self.pos)
            .field("original_size", &self.entry.original_size)
            .finish_non_exhaustive()
    }
}

impl<T: Read + Seek> Xp3File<T> {
    pub(crate) fn new(stream: Arc<Mutex<T>>, entry: FileEntry) -> Self {
        let mut pos = 0;
        let seg_pos = entry
            .segments
            .iter()
            .map(|seg| {
                let p = pos;
                pos += seg.original_size;
                p
            })
            .collect();
        Self {
            stream,
            entry,
            seg_pos,
            pos: 0,
            cache: None,
        }
    }

    /// The entry this stream reads.
    pub fn entry(&self) -> &FileEntry {
        &self.entry
    }

    /// Uncompressed size of the file.
    pub fn original_size(&self) -> u64 {
        self.entry.original_size
    }

    /// Whether the cursor is at or past the end of the file.
    pub fn is_eof(&self) -> bool {
        self.pos >= self.entry.original_size
    }

    /// Index of the segment containing `pos` (last segment starting at or before it).
    fn segment_index(&self, pos: u64) -> usize {
        match self.seg_pos.binary_search(&pos) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        }
    }
}

impl<T: Read + Seek> Read for Xp3File<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.entry.original_size {
            self.cache.take();
            return Ok(0);
        }
        if let Some(cache) = self.cache.as_mut() {
            let readed = cache.read(buf)?;
            if readed > 0 {
                self.pos += readed as u64;
                return Ok(readed);
            }
            self.cache.take();
        }
        let seg_index = self.segment_index(self.pos);
        let seg = &self.entry.segments[seg_index];
        let skip_pos = self.pos - self.seg_pos[seg_index];
        if seg.is_compressed() {
            let region = StreamRegion::new(
                MutexWrapper::new(self.stream.clone(), 0),
                seg.start,
                seg.start + seg.packed_size,
            )?;
            let mut cache = codec::create_decompressor(region)?;
            if skip_pos > 0 {
                std::io::copy(&mut (&mut cache).take(skip_pos), &mut EmptyWriter::new())?;
            }
            let readed = cache.read(buf)?;
            self.pos += readed as u64;
            self.cache = Some(cache);
            Ok(readed)
        } else {
            let mut region = MutexWrapper::new(self.stream.clone(), seg.start + skip_pos)
                .take(seg.packed_size - skip_pos);
            let readed = region.read(buf)?;
            self.pos += readed as u64;
            Ok(readed)
        }
    }
}

impl<T: Read + Seek> Seek for Xp3File<T> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let size = self.entry.original_size;
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::End(offset) => {
                if offset < 0 {
                    if offset.unsigned_abs() > size {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "Seek from end exceeds file length",
                        ));
                    }
                    size - offset.unsigned_abs()
                } else {
                    size + offset as u64
                }
            }
            SeekFrom::Current(offset) => {
                if offset < 0 {
                    if offset.unsigned_abs() > self.pos {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "Seek from current exceeds file start",
                        ));
                    }
                    self.pos - offset.unsigned_abs()
                } else {
                    self.pos + offset as u64
                }
            }
        };
        if new_pos > size {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Seek position is beyond the end of the file",
            ));
        }
        if new_pos < size {
            if let Some(mut cache) = self.cache.take() {
                let old_seg_index = self.segment_index(self.pos);
                let new_seg_index = self.segment_index(new_pos);
                if old_seg_index == new_seg_index && new_pos >= self.pos {
                    // Forward seek within the segment: advance the decoder.
                    std::io::copy(
                        &mut (&mut cache).take(new_pos - self.pos),
                        &mut EmptyWriter::new(),
                    )?;
                    self.cache = Some(cache);
                }
                // Otherwise the decoder is dropped and re-created lazily on
                // the next read.
            }
        }
        self.pos = new_pos;
        Ok(self.pos)
    }

    fn rewind(&mut self) -> std::io::Result<()> {
        self.pos = 0;
        self.cache.take();
        Ok(())
    }

    fn stream_position(&mut self) -> std::io::Result<u64> {
        Ok(self.pos)
    }
}
