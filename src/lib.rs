//! A Rust library for reading Kirikiri XP3 archives.
//!
//! An XP3 archive packs each file as one or more segments, raw or
//! compressed, listed in a chunked index at the end of the container.
//! [Xp3Archive] parses the index and [Xp3File] exposes a member as a
//! seekable byte stream that transparently spans and decompresses its
//! segments.
pub mod args;
pub mod ext;
pub mod utils;
pub mod xp3;

pub use xp3::{FileEntry, Segment, Xp3Archive, Xp3File};
