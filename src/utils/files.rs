//! Utilities for file operations.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Ensures that the parent directory for the specified path exists, creating it if necessary.
pub fn make_sure_dir_exists<F: AsRef<Path> + ?Sized>(f: &F) -> io::Result<()> {
    let path = f.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Converts an archive member name into a relative path safe to join onto an
/// output directory. Empty, `.` and `..` components are dropped, so a
/// hostile name cannot escape the directory.
pub fn sanitize_entry_path(name: &str) -> PathBuf {
    let mut result = PathBuf::new();
    for part in name.split(['/', '\\']) {
        if part.is_empty() || part == "." || part == ".." {
            continue;
        }
        result.push(part);
    }
    result
}
