//! Kirikiri XP3 archive reading.
mod archive;
pub mod codec;
pub mod consts;
mod file;
mod index;

pub use archive::Xp3Archive;
pub use file::Xp3File;
pub use index::{FileEntry, Segment, read_index};
