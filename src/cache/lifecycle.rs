//! The lifecycle coordinator: decides between use-cache, reconcile, and
//! rebuild; applies write-through updates; recovers from corruption.
//!
//! Corruption is always non-fatal here: every integrity error caught while
//! opening the cache is swallowed and converted into a rebuild, with a
//! single diagnostic line crossing the boundary.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use memmap2::Mmap;
use parking_lot::Mutex;

use crate::cache::codec::{self, CacheView};
use crate::cache::query::{self, Filter};
use crate::config::TkConfig;
use crate::error::{Result, TkError};
use crate::lock::DirLock;
use crate::types::{CacheEntry, Summary};

const CACHE_FILENAME: &str = ".cache";

/// An opened, memory-mapped cache file. Holds the backing file descriptor
/// open for as long as the mapping is alive.
pub struct CacheMapping {
    _file: File,
    mmap: Mmap,
}

impl CacheMapping {
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Release the mapping and close the file handle explicitly, rather
    /// than letting a mapping outlive a mutation boundary.
    pub fn close(self) {}
}

fn cache_path(dir: &Path) -> PathBuf {
    dir.join(CACHE_FILENAME)
}

fn locks_dir(dir: &Path) -> PathBuf {
    dir.join(".locks")
}

fn mtime_ns(path: &Path) -> Result<u64> {
    let meta = fs::metadata(path).map_err(|e| TkError::StorageError {
        operation: "stat",
        item_type: "file",
        path: path.to_path_buf(),
        source: e,
    })?;
    let modified = meta.modified().map_err(|e| TkError::StorageError {
        operation: "read mtime of",
        item_type: "file",
        path: path.to_path_buf(),
        source: e,
    })?;
    let dur = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TkError::NegativeMtime)?;
    Ok(dur.as_nanos() as u64)
}

/// Open and memory-map `dir`'s cache file. `CacheNotFound` is the only
/// non-diagnostic variant this (or [`CacheView::validate`] on its bytes)
/// can return; every other integrity error should be logged and recovered
/// from by rebuilding.
pub fn load_cache(dir: &Path) -> Result<CacheMapping> {
    let path = cache_path(dir);
    let file = File::open(&path).map_err(|_| TkError::CacheNotFound(path.clone()))?;
    let mmap = unsafe {
        Mmap::map(&file).map_err(|e| TkError::StorageError {
            operation: "mmap",
            item_type: "cache file",
            path: path.clone(),
            source: e,
        })?
    };
    CacheView::validate(&mmap, path)?;
    Ok(CacheMapping { _file: file, mmap })
}

fn find_ticket_filenames(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .ok()
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    if name.ends_with(".md") && !name.starts_with('.') {
                        Some(name)
                    } else {
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

fn build_entry(path: &Path) -> Result<CacheEntry> {
    let summary = crate::ticket::extract_summary(path)?;
    let mtime = mtime_ns(path)?;
    Ok(CacheEntry {
        summary,
        mtime_ns: mtime,
    })
}

/// Parse every ticket file in `dir` using a fixed-width worker pool. A file
/// that fails to parse is logged and skipped rather than aborting the
/// whole rebuild.
fn cold_build_entries(dir: &Path, cfg: &TkConfig, diag: &mut dyn IoWrite) -> Vec<CacheEntry> {
    let filenames = find_ticket_filenames(dir);
    let paths: Vec<PathBuf> = filenames.iter().map(|f| dir.join(f)).collect();

    if paths.is_empty() {
        return Vec::new();
    }

    let results = Mutex::new(Vec::with_capacity(paths.len()));
    let failures = AtomicUsize::new(0);
    let next = AtomicUsize::new(0);
    let worker_count = cfg.worker_pool_size.max(1).min(paths.len());

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| loop {
                let idx = next.fetch_add(1, Ordering::SeqCst);
                if idx >= paths.len() {
                    break;
                }
                match build_entry(&paths[idx]) {
                    Ok(entry) => results.lock().push(entry),
                    Err(e) => {
                        tracing::warn!(
                            path = %paths[idx].display(),
                            error = %e,
                            "skipping unparseable ticket during cold rebuild"
                        );
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    let failures = failures.load(Ordering::Relaxed);
    if failures > 0 {
        let _ = writeln!(
            diag,
            "cold rebuild: skipped {failures} ticket(s) that failed to parse"
        );
    }

    results.into_inner()
}

/// Merge `existing` against the current directory listing: drop entries
/// whose file is gone, parse and add files that aren't indexed yet. This is
/// the "reconcile" step; it never touches entries whose file is still
/// present and already indexed.
fn reconcile_against_directory(
    dir: &Path,
    existing: Vec<CacheEntry>,
    diag: &mut dyn IoWrite,
) -> Vec<CacheEntry> {
    let mut by_filename: BTreeMap<String, CacheEntry> = existing
        .into_iter()
        .map(|e| (format!("{}.md", e.summary.id), e))
        .collect();

    let current: BTreeSet<String> = find_ticket_filenames(dir).into_iter().collect();
    by_filename.retain(|filename, _| current.contains(filename));

    for filename in &current {
        if !by_filename.contains_key(filename) {
            let path = dir.join(filename);
            match build_entry(&path) {
                Ok(entry) => {
                    by_filename.insert(filename.clone(), entry);
                }
                Err(e) => {
                    let _ = writeln!(diag, "reconcile: failed to parse {filename}: {e}");
                    tracing::warn!(
                        filename,
                        error = %e,
                        "reconcile: skipping unparseable ticket"
                    );
                }
            }
        }
    }

    by_filename.into_values().collect()
}

fn materialize_all(mapping: &CacheMapping, path: PathBuf) -> Result<Vec<CacheEntry>> {
    let view = CacheView::validate(mapping.bytes(), path)?;
    (0..view.count())
        .map(|i| {
            Ok(CacheEntry {
                summary: view.materialize_summary(i)?,
                mtime_ns: view.mtime_ns(i),
            })
        })
        .collect()
}

fn materialize_filtered(entries: &[CacheEntry], f: &Filter) -> Result<Vec<Summary>> {
    let bytes = codec::encode(entries)?;
    let view = CacheView::validate(&bytes, PathBuf::from(CACHE_FILENAME))?;
    let indices = query::filter(&view, f)?;
    indices
        .into_iter()
        .map(|i| view.materialize_summary(i))
        .collect()
}

/// Atomically rewrite the cache file and normalize its mtime so the cache
/// never appears newer than the directory it indexes. On write failure,
/// try to delete the cache as a disposable-state fallback: the cache is
/// recoverable by rebuild, so a successful delete is not itself an error.
/// Only a failure to *both* write and delete is surfaced, with
/// instructions to remove the file manually.
fn write_cache(dir: &Path, entries: &[CacheEntry]) -> Result<()> {
    let bytes = codec::encode(entries)?;
    let path = cache_path(dir);
    if let Err(e) = crate::fs::write_atomic(&path, &bytes) {
        return match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(remove_err) if remove_err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(remove_err) => Err(TkError::CacheRecoveryFailed {
                path,
                rewrite: e.to_string(),
                delete: remove_err.to_string(),
            }),
        };
    }
    normalize_cache_mtime(dir, &path)
}

fn normalize_cache_mtime(dir: &Path, cache_path: &Path) -> Result<()> {
    let dir_mtime = fs::metadata(dir)
        .and_then(|m| m.modified())
        .map_err(|e| TkError::StorageError {
            operation: "stat",
            item_type: "directory",
            path: dir.to_path_buf(),
            source: e,
        })?;
    let cache_mtime =
        fs::metadata(cache_path)
            .and_then(|m| m.modified())
            .map_err(|e| TkError::StorageError {
                operation: "stat",
                item_type: "file",
                path: cache_path.to_path_buf(),
                source: e,
            })?;

    if cache_mtime < dir_mtime {
        let now = SystemTime::now();
        let target = dir_mtime.max(now);
        let file = OpenOptions::new()
            .write(true)
            .open(cache_path)
            .map_err(|e| TkError::StorageError {
                operation: "open",
                item_type: "cache file",
                path: cache_path.to_path_buf(),
                source: e,
            })?;
        file.set_modified(target)
            .map_err(|e| TkError::StorageError {
                operation: "set mtime of",
                item_type: "cache file",
                path: cache_path.to_path_buf(),
                source: e,
            })?;
    }
    Ok(())
}

fn rebuild_under_lock(dir: &Path, cfg: &TkConfig, diag: &mut dyn IoWrite) -> Result<Vec<CacheEntry>> {
    let lock = DirLock::acquire(&locks_dir(dir), CACHE_FILENAME, cfg.lock_timeout())?;
    let entries = cold_build_entries(dir, cfg, diag);
    let result = write_cache(dir, &entries);
    lock.release()?;
    result?;
    Ok(entries)
}

fn reconcile_under_lock(dir: &Path, diag: &mut dyn IoWrite, cfg: &TkConfig) -> Result<Vec<CacheEntry>> {
    let lock = DirLock::acquire(&locks_dir(dir), CACHE_FILENAME, cfg.lock_timeout())?;
    let outcome = (|| -> Result<Vec<CacheEntry>> {
        let existing = match load_cache(dir) {
            Ok(mapping) => materialize_all(&mapping, cache_path(dir))?,
            Err(_) => Vec::new(),
        };
        let entries = reconcile_against_directory(dir, existing, diag);
        write_cache(dir, &entries)?;
        Ok(entries)
    })();
    lock.release()?;
    outcome
}

/// `list(dir, filter, diag)`: stat the ticket directory, open and validate
/// the cache, reconcile if stale, filter, and materialize.
pub fn list(
    dir: &Path,
    filter_opts: &Filter,
    diag: &mut dyn IoWrite,
    cfg: &TkConfig,
) -> Result<Vec<Summary>> {
    if fs::metadata(dir).is_err() {
        return Ok(Vec::new());
    }
    let path = cache_path(dir);

    match load_cache(dir) {
        Ok(mapping) => {
            let dir_mtime = mtime_ns(dir)?;
            let cache_mtime = mtime_ns(&path)?;
            if dir_mtime > cache_mtime {
                let entries = reconcile_under_lock(dir, diag, cfg)?;
                materialize_filtered(&entries, filter_opts)
            } else {
                let view = CacheView::validate(mapping.bytes(), path)?;
                let indices = query::filter(&view, filter_opts)?;
                indices
                    .into_iter()
                    .map(|i| view.materialize_summary(i))
                    .collect()
            }
        }
        Err(TkError::CacheNotFound(_)) => {
            let entries = rebuild_under_lock(dir, cfg, diag)?;
            materialize_filtered(&entries, filter_opts)
        }
        Err(_) => {
            let _ = writeln!(diag, "loading cache: invalid format, rebuilding");
            tracing::warn!(dir = %dir.display(), "cache invalid, rebuilding");
            let entries = rebuild_under_lock(dir, cfg, diag)?;
            materialize_filtered(&entries, filter_opts)
        }
    }
}

/// `upsert_cache(dir, filename, summary)`: write-through update after a
/// ticket mutation. Re-reads the cache under lock, patches
/// or inserts one entry, and rewrites the full cache atomically.
pub fn upsert(dir: &Path, filename: &str, summary: Summary, cfg: &TkConfig) -> Result<()> {
    let lock = DirLock::acquire(&locks_dir(dir), CACHE_FILENAME, cfg.lock_timeout())?;
    let result = upsert_locked(dir, filename, summary, cfg);
    lock.release()?;
    result
}

fn upsert_locked(dir: &Path, filename: &str, summary: Summary, cfg: &TkConfig) -> Result<()> {
    let mut sink = std::io::sink();
    match load_cache(dir) {
        Ok(mapping) => {
            let path = cache_path(dir);
            let mut entries = materialize_all(&mapping, path.clone())?;
            if mtime_ns(dir)? > mtime_ns(&path)? {
                entries = reconcile_against_directory(dir, entries, &mut sink);
            }

            let ticket_path = dir.join(filename);
            let mtime = mtime_ns(&ticket_path)?;
            entries.retain(|e| format!("{}.md", e.summary.id) != filename);
            entries.push(CacheEntry {
                summary,
                mtime_ns: mtime,
            });

            write_cache(dir, &entries)
        }
        // Absent, wrong magic, wrong version, or corrupt: a cold rebuild
        // already incorporates the ticket this upsert is for, because the
        // file was written to disk before write-through was invoked.
        Err(_) => {
            let entries = cold_build_entries(dir, cfg, &mut sink);
            write_cache(dir, &entries)
        }
    }
}

/// `delete_cache_entry(dir, filename)`: write-through removal.
/// Tolerates cache absence (or any other load failure) silently — the next
/// read simply rebuilds without the deleted file, since it no longer
/// exists on disk.
pub fn delete(dir: &Path, filename: &str, cfg: &TkConfig) -> Result<()> {
    let lock = DirLock::acquire(&locks_dir(dir), CACHE_FILENAME, cfg.lock_timeout())?;
    let result = delete_locked(dir, filename);
    lock.release()?;
    result
}

fn delete_locked(dir: &Path, filename: &str) -> Result<()> {
    let mapping = match load_cache(dir) {
        Ok(m) => m,
        Err(_) => return Ok(()),
    };
    let path = cache_path(dir);
    let mut entries = materialize_all(&mapping, path)?;
    entries.retain(|e| format!("{}.md", e.summary.id) != filename);
    write_cache(dir, &entries)
}
