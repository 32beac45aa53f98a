//! XP3 index parsing.
use super::codec;
use super::consts::*;
use crate::ext::io::*;
use crate::utils::encoding::decode_utf16le;
use anyhow::Result;
use std::io::{Read, Seek, SeekFrom};

/// One physical run of bytes contributing to a file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Raw segment flags; the low three bits select the encode method.
    pub flag: u32,
    /// Absolute offset of the segment's data within the archive.
    pub start: u64,
    /// Size of the segment after decompression.
    pub original_size: u64,
    /// Size of the segment in the archive (equals `original_size` for raw segments).
    pub packed_size: u64,
}

impl Segment {
    /// Whether the segment data is compressed.
    pub fn is_compressed(&self) -> bool {
        self.flag & TVP_XP3_SEGM_ENCODE_METHOD_MASK == TVP_XP3_SEGM_ENCODE_ZLIB
    }
}

/// One logical file packed in the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEntry {
    /// File name, decoded from UTF-16LE.
    pub filename: String,
    /// Raw entry flags.
    pub flags: u32,
    /// Uncompressed size of the file.
    pub original_size: u64,
    /// Total size the file occupies in the archive.
    pub packed_size: u64,
    /// Adler-32 checksum of the file content; zero when absent.
    pub adler32: u32,
    /// Ordered segments making up the file content.
    pub segments: Vec<Segment>,
}

impl FileEntry {
    /// Whether the entry is marked as protected. Informational only.
    pub fn is_protected(&self) -> bool {
        self.flags & TVP_XP3_FILE_PROTECTED != 0
    }
}

/// Reads the archive index and returns the file entries in index order.
///
/// The index encode byte is masked with [TVP_XP3_INDEX_ENCODE_METHOD_MASK],
/// so a set [TVP_XP3_INDEX_CONTINUE] bit is tolerated. Continuation blocks
/// are not supported; only the first index block is read.
pub fn read_index<R: Read + Seek>(stream: &mut R) -> Result<Vec<FileEntry>> {
    stream
        .read_and_equal(XP3_MAGIC)
        .map_err(|_| anyhow::anyhow!("Not an XP3 archive (magic mismatch)"))?;
    let index_offset = stream.read_u64()?;
    stream.seek(SeekFrom::Start(index_offset))?;
    let index_encode_method = stream.read_u8()?;
    let index = match index_encode_method & TVP_XP3_INDEX_ENCODE_METHOD_MASK {
        TVP_XP3_INDEX_ENCODE_RAW => {
            let index_size = stream.read_u64()?;
            stream.read_exact_vec(index_size as usize)?
        }
        TVP_XP3_INDEX_ENCODE_ZLIB => {
            let packed_size = stream.read_u64()?;
            let original_size = stream.read_u64()?;
            let current_pos = stream.stream_position()?;
            let region = StreamRegion::new(&mut *stream, current_pos, current_pos + packed_size)?;
            codec::decompress(region, original_size)?
        }
        method => anyhow::bail!("Unknown index encode method: {}", method),
    };
    let mut index = MemReader::new(index);
    let mut files = Vec::new();
    while !index.is_eof() {
        let mut chunk_type = [0u8; 4];
        index.read_exact(&mut chunk_type)?;
        let chunk_size = index.read_u64()?;
        if &chunk_type != CHUNK_FILE {
            anyhow::bail!(
                "Unknown chunk type: {}",
                String::from_utf8_lossy(&chunk_type)
            );
        }
        let chunk_data = index.read_exact_vec(chunk_size as usize)?;
        files.push(read_file_entry(MemReader::new(chunk_data))?);
    }
    Ok(files)
}

fn read_file_entry(mut stream: MemReader) -> Result<FileEntry> {
    let mut entry = FileEntry::default();
    while !stream.is_eof() {
        let mut chunk_type = [0u8; 4];
        stream.read_exact(&mut chunk_type)?;
        let chunk_size = stream.read_u64()?;
        let chunk_data = stream.read_exact_vec(chunk_size as usize)?;
        let mut chunk = MemReader::new(chunk_data);
        if &chunk_type == CHUNK_INFO {
            entry.flags = chunk.read_u32()?;
            entry.original_size = chunk.read_u64()?;
            entry.packed_size = chunk.read_u64()?;
            let name_length = chunk.read_u16()? as usize;
            let name_data = chunk.read_exact_vec(name_length * 2)?;
            entry.filename = decode_utf16le(&name_data)?;
        } else if &chunk_type == CHUNK_ADLR {
            entry.adler32 = chunk.read_u32()?;
        } else if &chunk_type == CHUNK_SEGM {
            while !chunk.is_eof() {
                entry.segments.push(Segment {
                    flag: chunk.read_u32()?,
                    start: chunk.read_u64()?,
                    original_size: chunk.read_u64()?,
                    packed_size: chunk.read_u64()?,
                });
            }
        }
        // Unknown chunks are skipped over their stated length.
    }
    Ok(entry)
}
