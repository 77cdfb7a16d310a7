//! Top-level application configuration.
//!
//! Configuration is stored in `<ticket-dir>/.tkconfig.yaml`. Every field is
//! defaulted so a missing or partial file is equivalent to
//! [`TkConfig::default`]. This is an external collaborator: the core takes
//! already-resolved values (pool size, timeout) as plain arguments and has
//! no dependency on this module.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TkError};

const CONFIG_FILENAME: &str = ".tkconfig.yaml";

fn default_worker_pool_size() -> usize {
    16
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_page_size() -> usize {
    50
}

/// Application configuration: lock timing, cold-rebuild parallelism, and
/// the default page size for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TkConfig {
    /// Worker pool size for cold rebuild (default 16).
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Lock acquisition deadline in milliseconds (default 2000).
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Default page size for `tk ls` when `--limit` is not given.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

impl Default for TkConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            lock_timeout_ms: default_lock_timeout_ms(),
            default_page_size: default_page_size(),
        }
    }
}

impl TkConfig {
    /// Path to the config file inside `dir`.
    pub fn config_path(dir: &Path) -> std::path::PathBuf {
        dir.join(CONFIG_FILENAME)
    }

    /// Load configuration from `<dir>/.tkconfig.yaml`, or the default if the
    /// file is absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::config_path(dir);
        if !path.exists() {
            return Ok(TkConfig::default());
        }

        let content = crate::fs::read_to_string(&path)?;
        serde_yaml_ng::from_str(&content).map_err(|e| TkError::Other(format!(
            "failed to parse {}: {e}",
            path.display()
        )))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
