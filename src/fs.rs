//! Small filesystem helpers: atomic writes and byte-exact file I/O.
//!
//! Every on-disk write in this crate — ticket files and the cache file alike
//! — goes through [`write_atomic`] so a crash or a concurrent reader never
//! observes a partially written file.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Result, TkError};

/// Write `content` to `path` via a temp file in the same directory plus a
/// rename, so the target is never observed half-written.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(parent)?;

    let mut temp_file = NamedTempFile::new_in(parent).map_err(|e| TkError::StorageError {
        operation: "create temp file for",
        item_type: "file",
        path: path.to_path_buf(),
        source: e,
    })?;

    temp_file
        .write_all(content)
        .map_err(|e| TkError::StorageError {
            operation: "write",
            item_type: "file",
            path: temp_file.path().to_path_buf(),
            source: e,
        })?;

    temp_file.persist(path).map_err(|e| TkError::StorageError {
        operation: "rename",
        item_type: "file",
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}

pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| TkError::StorageError {
        operation: "read",
        item_type: "file",
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| TkError::StorageError {
            operation: "create",
            item_type: "directory",
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write_atomic(&path, b"hello").unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn atomic_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/a.txt");
        write_atomic(&path, b"hi").unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "hi");
    }
}
