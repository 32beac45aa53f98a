//! Streaming decompressors for index blocks and file segments.
use super::consts::ZSTD_MAGIC;
use crate::ext::io::Peek;
use anyhow::Result;
use flate2::read::ZlibDecoder;
use std::io::{Read, Seek};

/// A streaming decompressor over a source stream.
///
/// The codec is selected by [create_decompressor] from the first bytes of
/// the source. The decompressor owns the source and is read-only; it is not
/// seekable.
pub enum Decompressor<R: Read> {
    Zlib(ZlibDecoder<R>),
    #[cfg(feature = "zstd")]
    Zstd(zstd::stream::read::Decoder<'static, std::io::BufReader<R>>),
}

impl<R: Read> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Decompressor::Zlib(decoder) => decoder.read(buf),
            #[cfg(feature = "zstd")]
            Decompressor::Zstd(decoder) => decoder.read(buf),
        }
    }
}

/// Creates a decompressor for the given source stream.
///
/// Peeks up to 4 bytes to detect a Zstandard frame and falls back to zlib.
/// The peeked bytes are restored by seeking, so the source must be seekable.
pub fn create_decompressor<R: Read + Seek>(mut source: R) -> std::io::Result<Decompressor<R>> {
    let mut header = [0u8; 4];
    let peeked = source.peek(&mut header)?;
    #[cfg(feature = "zstd")]
    if peeked >= 4 && &header == ZSTD_MAGIC {
        return Ok(Decompressor::Zstd(zstd::stream::read::Decoder::new(
            source,
        )?));
    }
    #[cfg(not(feature = "zstd"))]
    let _ = peeked;
    Ok(Decompressor::Zlib(ZlibDecoder::new(source)))
}

/// Decompresses a source stream into a vector.
///
/// With a nonzero `expected_size`, exactly that many bytes must be produced;
/// fewer is an error. With `expected_size == 0`, reads until end of stream.
pub fn decompress<R: Read + Seek>(source: R, expected_size: u64) -> Result<Vec<u8>> {
    let mut decoder = create_decompressor(source)?;
    if expected_size > 0 {
        let mut result = vec![0u8; expected_size as usize];
        let mut total = 0;
        while total < result.len() {
            let readed = decoder.read(&mut result[total..])?;
            if readed == 0 {
                break;
            }
            total += readed;
        }
        if total as u64 != expected_size {
            anyhow::bail!(
                "Decompressed data is too short: expected {} bytes, got {}",
                expected_size,
                total
            );
        }
        Ok(result)
    } else {
        let mut result = Vec::new();
        decoder.read_to_end(&mut result)?;
        Ok(result)
    }
}
