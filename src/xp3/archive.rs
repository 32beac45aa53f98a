//! XP3 archive façade.
use super::file::Xp3File;
use super::index::{self, FileEntry};
use anyhow::Result;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A Kirikiri XP3 archive opened for reading.
///
/// The archive owns the source stream and the parsed entry list. The index
/// is read once at construction; entries are immutable afterwards. File
/// streams returned by [Xp3Archive::open_file] share the source, so several
/// of them may be used at once, from different threads if `T` is `Send`.
pub struct Xp3Archive<T: Read + Seek> {
    stream: Arc<Mutex<T>>,
    files: Vec<FileEntry>,
}

impl<T: Read + Seek> std::fmt::Debug for Xp3Archive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Xp3Archive")
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

impl Xp3Archive<std::fs::File> {
    /// Opens an XP3 archive file and reads its index.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::new(file)
    }
}

impl<T: Read + Seek> Xp3Archive<T> {
    /// Reads the index from the given seekable stream and takes ownership of it.
    pub fn new(mut stream: T) -> Result<Self> {
        let files = index::read_index(&mut stream)?;
        Ok(Self {
            stream: Arc::new(Mutex::new(stream)),
            files,
        })
    }

    /// The parsed file entries, in index order.
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Opens the file at the given index for reading.
    pub fn open_file(&self, index: usize) -> Result<Xp3File<T>> {
        let entry = self
            .files
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("Index out of bounds: {}", index))?;
        Ok(Xp3File::new(self.stream.clone(), entry.clone()))
    }

    /// Opens a file stream for a caller-owned entry copy.
    ///
    /// The entry does not have to come from this archive's list, but its
    /// segments must point into this archive's data.
    pub fn open_entry(&self, entry: FileEntry) -> Xp3File<T> {
        Xp3File::new(self.stream.clone(), entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ext::io::MemReader;
    use crate::xp3::consts::*;
    use adler::Adler32;
    use std::io::{Seek as _, SeekFrom, Write};

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(tag);
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn info_chunk(flags: u32, original_size: u64, packed_size: u64, name: &str) -> Vec<u8> {
        let utf16: Vec<u16> = name.encode_utf16().collect();
        let mut payload = Vec::new();
        payload.extend_from_slice(&flags.to_le_bytes());
        payload.extend_from_slice(&original_size.to_le_bytes());
        payload.extend_from_slice(&packed_size.to_le_bytes());
        payload.extend_from_slice(&(utf16.len() as u16).to_le_bytes());
        for unit in utf16 {
            payload.extend_from_slice(&unit.to_le_bytes());
        }
        chunk(CHUNK_INFO, &payload)
    }

    fn segm_chunk(segments: &[(u32, u64, u64, u64)]) -> Vec<u8> {
        let mut payload = Vec::new();
        for (flag, start, original_size, packed_size) in segments {
            payload.extend_from_slice(&flag.to_le_bytes());
            payload.extend_from_slice(&start.to_le_bytes());
            payload.extend_from_slice(&original_size.to_le_bytes());
            payload.extend_from_slice(&packed_size.to_le_bytes());
        }
        chunk(CHUNK_SEGM, &payload)
    }

    fn adlr_chunk(checksum: u32) -> Vec<u8> {
        chunk(CHUNK_ADLR, &checksum.to_le_bytes())
    }

    const DATA_START: u64 = 19;

    /// Assembles `magic + index_offset + data + index block`. Segment start
    /// offsets in `index` must be absolute, i.e. relative to [DATA_START].
    fn build_archive(method: u8, data: &[u8], index: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(XP3_MAGIC);
        out.extend_from_slice(&(DATA_START + data.len() as u64).to_le_bytes());
        out.extend_from_slice(data);
        out.push(method);
        match method & TVP_XP3_INDEX_ENCODE_METHOD_MASK {
            TVP_XP3_INDEX_ENCODE_RAW => {
                out.extend_from_slice(&(index.len() as u64).to_le_bytes());
                out.extend_from_slice(index);
            }
            TVP_XP3_INDEX_ENCODE_ZLIB => {
                let packed = zlib_compress(index);
                out.extend_from_slice(&(packed.len() as u64).to_le_bytes());
                out.extend_from_slice(&(index.len() as u64).to_le_bytes());
                out.extend_from_slice(&packed);
            }
            _ => {
                // Deliberately bogus framing for failure tests.
                out.extend_from_slice(&(index.len() as u64).to_le_bytes());
                out.extend_from_slice(index);
            }
        }
        out
    }

    fn single_raw_file_index(name: &str, content_len: u64) -> Vec<u8> {
        let mut payload = info_chunk(0, content_len, content_len, name);
        payload.extend_from_slice(&segm_chunk(&[(0, DATA_START, content_len, content_len)]));
        chunk(CHUNK_FILE, &payload)
    }

    fn read_all(file: &mut Xp3File<MemReader>) -> Vec<u8> {
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_raw_index_single_raw_file() {
        let index = single_raw_file_index("a.txt", 2);
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, b"hi", &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert_eq!(archive.files().len(), 1);
        let entry = &archive.files()[0];
        assert_eq!(entry.filename, "a.txt");
        assert_eq!(entry.original_size, 2);
        assert_eq!(entry.packed_size, 2);
        assert!(!entry.is_protected());
        assert_eq!(entry.segments.len(), 1);
        assert_eq!(read_all(&mut archive.open_file(0).unwrap()), b"hi");
    }

    #[test]
    fn test_zlib_index() {
        let index = single_raw_file_index("a.txt", 2);
        let data = build_archive(TVP_XP3_INDEX_ENCODE_ZLIB, b"hi", &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert_eq!(archive.files()[0].filename, "a.txt");
        assert_eq!(read_all(&mut archive.open_file(0).unwrap()), b"hi");
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_zstd_index() {
        let index = single_raw_file_index("a.txt", 2);
        let mut data = Vec::new();
        data.extend_from_slice(XP3_MAGIC);
        data.extend_from_slice(&(DATA_START + 2).to_le_bytes());
        data.extend_from_slice(b"hi");
        let packed = zstd::encode_all(&index[..], 3).unwrap();
        data.push(TVP_XP3_INDEX_ENCODE_ZLIB);
        data.extend_from_slice(&(packed.len() as u64).to_le_bytes());
        data.extend_from_slice(&(index.len() as u64).to_le_bytes());
        data.extend_from_slice(&packed);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert_eq!(read_all(&mut archive.open_file(0).unwrap()), b"hi");
    }

    #[test]
    fn test_continue_bit_is_masked() {
        let index = single_raw_file_index("a.txt", 2);
        let data = build_archive(
            TVP_XP3_INDEX_CONTINUE | TVP_XP3_INDEX_ENCODE_RAW,
            b"hi",
            &index,
        );
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert_eq!(read_all(&mut archive.open_file(0).unwrap()), b"hi");
    }

    #[test]
    fn test_unknown_index_method_fails() {
        let index = single_raw_file_index("a.txt", 2);
        let data = build_archive(0x05, b"hi", &index);
        let err = Xp3Archive::new(MemReader::new(data)).unwrap_err();
        assert!(err.to_string().contains("Unknown index encode method"));
    }

    #[test]
    fn test_magic_mismatch_fails() {
        let mut data = build_archive(
            TVP_XP3_INDEX_ENCODE_RAW,
            b"hi",
            &single_raw_file_index("a.txt", 2),
        );
        data[0] = b'Z';
        let err = Xp3Archive::new(MemReader::new(data)).unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_unknown_top_level_chunk_fails() {
        let mut index = single_raw_file_index("a.txt", 2);
        index.extend_from_slice(&chunk(b"Dirs", b""));
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, b"hi", &index);
        let err = Xp3Archive::new(MemReader::new(data)).unwrap_err();
        assert!(err.to_string().contains("Unknown chunk type: Dirs"));
    }

    #[test]
    fn test_truncated_index_fails() {
        let index = single_raw_file_index("a.txt", 2);
        let mut data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, b"hi", &index);
        // The stored index size no longer matches the available bytes.
        data.truncate(data.len() - 4);
        assert!(Xp3Archive::new(MemReader::new(data)).is_err());
    }

    #[test]
    fn test_unknown_inner_chunk_is_skipped() {
        let mut payload = info_chunk(0, 2, 2, "a.txt");
        payload.extend_from_slice(&chunk(b"time", &[0xAA; 8]));
        payload.extend_from_slice(&segm_chunk(&[(0, DATA_START, 2, 2)]));
        payload.extend_from_slice(&adlr_chunk(0));
        let index = chunk(CHUNK_FILE, &payload);
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, b"hi", &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert_eq!(archive.files()[0].filename, "a.txt");
        assert_eq!(archive.files()[0].segments.len(), 1);
        assert_eq!(read_all(&mut archive.open_file(0).unwrap()), b"hi");
    }

    #[test]
    fn test_entry_without_segments_is_kept() {
        let index = chunk(CHUNK_FILE, &info_chunk(0, 0, 0, "empty.bin"));
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, b"", &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert_eq!(archive.files().len(), 1);
        assert_eq!(archive.files()[0].filename, "empty.bin");
        assert!(archive.files()[0].segments.is_empty());
        assert_eq!(read_all(&mut archive.open_file(0).unwrap()), b"");
    }

    #[test]
    fn test_two_raw_segments_with_seek() {
        // "HELLO!" split as "HELL" and "O!".
        let mut payload = info_chunk(0, 6, 6, "hello.txt");
        payload.extend_from_slice(&segm_chunk(&[
            (0, DATA_START, 4, 4),
            (0, DATA_START + 4, 2, 2),
        ]));
        let index = chunk(CHUNK_FILE, &payload);
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, b"HELLO!", &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        let mut file = archive.open_file(0).unwrap();
        assert_eq!(read_all(&mut file), b"HELLO!");
        file.seek(SeekFrom::Start(5)).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(file.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf, b"!");
    }

    #[test]
    fn test_compressed_segment() {
        let original = b"compressed segment payload, long enough to matter";
        let packed = zlib_compress(original);
        let mut payload = info_chunk(
            0,
            original.len() as u64,
            packed.len() as u64,
            "packed.bin",
        );
        payload.extend_from_slice(&segm_chunk(&[(
            1,
            DATA_START,
            original.len() as u64,
            packed.len() as u64,
        )]));
        let index = chunk(CHUNK_FILE, &payload);
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, &packed, &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert_eq!(read_all(&mut archive.open_file(0).unwrap()), original);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_zstd_segment_auto_detect() {
        // A segment flagged as compressed whose bytes are a zstd frame.
        let original = b"zstd compressed segment payload";
        let packed = zstd::encode_all(&original[..], 3).unwrap();
        let mut payload = info_chunk(
            0,
            original.len() as u64,
            packed.len() as u64,
            "packed.bin",
        );
        payload.extend_from_slice(&segm_chunk(&[(
            1,
            DATA_START,
            original.len() as u64,
            packed.len() as u64,
        )]));
        let index = chunk(CHUNK_FILE, &payload);
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, &packed, &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert_eq!(read_all(&mut archive.open_file(0).unwrap()), original);
    }

    #[test]
    fn test_shared_segment_between_entries() {
        let mut index = Vec::new();
        for name in ["first.txt", "second.txt"] {
            let mut payload = info_chunk(0, 2, 2, name);
            payload.extend_from_slice(&segm_chunk(&[(0, DATA_START, 2, 2)]));
            index.extend_from_slice(&chunk(CHUNK_FILE, &payload));
        }
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, b"hi", &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert_eq!(archive.files().len(), 2);
        assert_eq!(
            archive.files()[0].segments[0].start,
            archive.files()[1].segments[0].start
        );
        let mut first = archive.open_file(0).unwrap();
        let mut second = archive.open_file(1).unwrap();
        // Interleaved reads through the shared source stay independent.
        let mut buf = [0u8; 1];
        first.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"h");
        assert_eq!(read_all(&mut second), b"hi");
        first.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"i");
    }

    #[test]
    fn test_adler32_matches_content() {
        let content = b"checksummed content";
        let mut adler = Adler32::new();
        adler.write_slice(content);
        let checksum = adler.checksum();

        let mut payload = info_chunk(0, content.len() as u64, content.len() as u64, "c.bin");
        payload.extend_from_slice(&segm_chunk(&[(
            0,
            DATA_START,
            content.len() as u64,
            content.len() as u64,
        )]));
        payload.extend_from_slice(&adlr_chunk(checksum));
        let index = chunk(CHUNK_FILE, &payload);
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, content, &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        let entry = &archive.files()[0];
        assert_eq!(entry.adler32, checksum);

        let mut recomputed = Adler32::new();
        recomputed.write_slice(&read_all(&mut archive.open_file(0).unwrap()));
        assert_eq!(recomputed.checksum(), entry.adler32);

        // A corrupted stored checksum is detectable the same way.
        let mut mismatch = entry.clone();
        mismatch.adler32 ^= 0xDEAD_BEEF;
        assert_ne!(recomputed.checksum(), mismatch.adler32);
    }

    #[test]
    fn test_protected_flag_is_parsed_not_enforced() {
        let mut payload = info_chunk(TVP_XP3_FILE_PROTECTED, 2, 2, "p.txt");
        payload.extend_from_slice(&segm_chunk(&[(0, DATA_START, 2, 2)]));
        let index = chunk(CHUNK_FILE, &payload);
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, b"hi", &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert!(archive.files()[0].is_protected());
        assert_eq!(read_all(&mut archive.open_file(0).unwrap()), b"hi");
    }

    #[test]
    fn test_open_file_out_of_bounds() {
        let index = single_raw_file_index("a.txt", 2);
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, b"hi", &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        assert!(archive.open_file(1).is_err());
    }

    #[test]
    fn test_open_entry_copy_outlives_list() {
        let index = single_raw_file_index("a.txt", 2);
        let data = build_archive(TVP_XP3_INDEX_ENCODE_RAW, b"hi", &index);
        let archive = Xp3Archive::new(MemReader::new(data)).unwrap();
        let entry = archive.files()[0].clone();
        let mut file = archive.open_entry(entry);
        assert_eq!(read_all(&mut file), b"hi");
    }
}
