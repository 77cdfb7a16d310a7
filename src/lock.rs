//! Advisory directory lock.
//!
//! Used both as the cache writer lock (target `.cache`) and as the
//! per-ticket-file writer lock (target `<id>.md`). Lock files live under
//! `.locks/`, never inside the ticket directory itself, so creating and
//! removing them never touches the directory mtime that cache invalidation
//! keys off of.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Result, TkError};

/// Default lock acquisition deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A held advisory lock. Dropping it releases the OS-level lock; callers
/// that care about the precise release order (unlink, then unlock, then
/// close) should call [`DirLock::release`] explicitly instead of relying
/// on `Drop`.
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    /// Acquire the lock for `target` (e.g. `.cache` or `<id>.md`) under
    /// `locks_dir`, blocking up to `timeout`.
    pub fn acquire(locks_dir: &Path, target: &str, timeout: Duration) -> Result<Self> {
        crate::fs::ensure_dir(locks_dir)?;
        let path = locks_dir.join(format!("{target}.lock"));
        let deadline = Instant::now() + timeout;

        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map_err(|e| TkError::StorageError {
                    operation: "open",
                    item_type: "lock file",
                    path: path.clone(),
                    source: e,
                })?;

            wait_for_exclusive(&file, deadline, &path)?;

            // Inode verification: confirm no one deleted and recreated this
            // lock file between our open and our lock.
            if inode_matches(&file, &path)? {
                return Ok(DirLock { file, path });
            }

            let _ = FileExt::unlock(&file);
            if Instant::now() >= deadline {
                return Err(TkError::LockTimeout(path));
            }
        }
    }

    /// Release in the required order: remove the path, then unlock, then
    /// close (the drop of `file` at the end of this function).
    pub fn release(self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(TkError::StorageError {
                    operation: "remove",
                    item_type: "lock file",
                    path: self.path.clone(),
                    source: e,
                });
            }
        }
        let _ = FileExt::unlock(&self.file);
        Ok(())
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn wait_for_exclusive(file: &File, deadline: Instant, path: &Path) -> Result<()> {
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(TkError::LockTimeout(path.to_path_buf()));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(TkError::StorageError {
                    operation: "lock",
                    item_type: "lock file",
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }
    }
}

#[cfg(unix)]
fn inode_matches(file: &File, path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let handle_ino = file.metadata()?.ino();
    match std::fs::metadata(path) {
        Ok(disk_meta) => Ok(disk_meta.ino() == handle_ino),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn inode_matches(_file: &File, path: &Path) -> Result<bool> {
    // No portable inode-equality check; treat presence as sufficient.
    Ok(path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let dir = tempfile::tempdir().unwrap();
        let locks_dir = dir.path().join(".locks");
        let lock = DirLock::acquire(&locks_dir, ".cache", DEFAULT_TIMEOUT).unwrap();
        lock.release().unwrap();
        let lock2 = DirLock::acquire(&locks_dir, ".cache", DEFAULT_TIMEOUT).unwrap();
        lock2.release().unwrap();
    }

    #[test]
    fn release_removes_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let locks_dir = dir.path().join(".locks");
        let lock = DirLock::acquire(&locks_dir, "t-001.md", DEFAULT_TIMEOUT).unwrap();
        let path = locks_dir.join("t-001.md.lock");
        assert!(path.exists());
        lock.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let locks_dir = dir.path().join(".locks");
        let _lock = DirLock::acquire(&locks_dir, ".cache", DEFAULT_TIMEOUT).unwrap();
        let result = DirLock::acquire(&locks_dir, ".cache", Duration::from_millis(100));
        assert!(matches!(result, Err(TkError::LockTimeout(_))));
    }

    #[test]
    fn concurrent_increments_serialize_correctly() {
        let dir = tempfile::tempdir().unwrap();
        let locks_dir = dir.path().join(".locks");
        let counter_path = dir.path().join("counter");
        std::fs::write(&counter_path, b"0").unwrap();

        std::thread::scope(|scope| {
            for _ in 0..10 {
                let locks_dir = &locks_dir;
                let counter_path = &counter_path;
                scope.spawn(move || {
                    for _ in 0..20 {
                        let lock =
                            DirLock::acquire(locks_dir, "counter", Duration::from_secs(5)).unwrap();
                        let current: u32 =
                            std::fs::read_to_string(counter_path).unwrap().trim().parse().unwrap();
                        std::fs::write(counter_path, (current + 1).to_string()).unwrap();
                        lock.release().unwrap();
                    }
                });
            }
        });

        let total: u32 = std::fs::read_to_string(&counter_path)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert_eq!(total, 200);
    }

    #[test]
    fn locks_dir_does_not_touch_ticket_dir_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let locks_dir = dir.path().join(".locks");
        // Pre-create .locks so the measured window only covers lock-file churn,
        // not the one-time creation of the .locks directory itself.
        std::fs::create_dir_all(&locks_dir).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        let before = std::fs::metadata(dir.path()).unwrap().modified().unwrap();
        let lock = DirLock::acquire(&locks_dir, ".cache", DEFAULT_TIMEOUT).unwrap();
        lock.release().unwrap();
        let after = std::fs::metadata(dir.path()).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }
}
