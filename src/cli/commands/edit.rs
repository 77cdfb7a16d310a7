//! `tk edit`: shell out to `$EDITOR` against the ticket
//! file, then re-parse and re-validate on return so a bad hand-edit is
//! caught immediately rather than surfacing later as a cold-rebuild skip.

use std::path::Path;
use std::process::Command;

use crate::cache;
use crate::config::TkConfig;
use crate::error::{Result, TkError};
use crate::types::ticket_path;

use super::find_summary;

pub fn run(dir: &Path, id: &str) -> Result<()> {
    // Fail fast if the id doesn't exist rather than opening an editor on a
    // path that's about to become a brand-new (unexpected) ticket file.
    find_summary(dir, id)?;

    let path = ticket_path(dir, id);
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    let status = Command::new("sh")
        .arg("-c")
        .arg(format!("{editor} \"$1\""))
        .arg("--")
        .arg(&path)
        .status()
        .map_err(|e| TkError::StorageError {
            operation: "spawn editor for",
            item_type: "ticket file",
            path: path.clone(),
            source: e,
        })?;

    if !status.success() {
        return Err(TkError::Other(format!(
            "editor exited with status {:?}",
            status.code()
        )));
    }

    let summary = crate::ticket::extract_summary(&path)?;
    let cfg = TkConfig::load(dir)?;
    cache::upsert(dir, &format!("{id}.md"), summary, &cfg)?;
    Ok(())
}
