//! Per-subcommand implementations. Each function here is a thin caller of
//! the core (`cache::*`, `ticket::*`) plus the domain rules kept out of the
//! cache on purpose: status-transition legality, self-blocking, and
//! parent-state checks.

pub mod block;
pub mod completions;
pub mod edit;
pub mod ls;
pub mod new;
pub mod status;

use std::path::Path;

use crate::cache;
use crate::config::TkConfig;
use crate::error::{Result, TkError};
use crate::types::{Summary, TicketStatus, ticket_path};

/// Current time as an RFC 3339 UTC timestamp, the form every `created` and
/// `closed` field on disk uses.
pub fn now_rfc3339() -> String {
    jiff::Timestamp::now().to_string()
}

/// Look up a single ticket's summary by id via the cache, loading config
/// fresh each call since a command invocation is too short-lived to amortize
/// a cached config across commands.
pub fn find_summary(dir: &Path, id: &str) -> Result<Summary> {
    let cfg = TkConfig::load(dir)?;
    let mut diag = std::io::stderr();
    let summaries = cache::list(dir, &cache::Filter::default(), &mut diag, &cfg)?;
    summaries
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| TkError::TicketNotFound(id.to_string()))
}

/// Re-read a ticket's summary straight from its file (bypassing the cache),
/// used right after a mutation to build the write-through payload.
pub fn reload_summary(dir: &Path, id: &str) -> Result<Summary> {
    crate::ticket::extract_summary(&ticket_path(dir, id))
}

/// Write-through the cache after a ticket file mutation.
pub fn upsert(dir: &Path, id: &str, summary: Summary, cfg: &TkConfig) -> Result<()> {
    cache::upsert(dir, &format!("{id}.md"), summary, cfg)
}

/// Every ticket whose `parent` is `id` and whose status isn't closed.
pub fn open_children(dir: &Path, id: &str, cfg: &TkConfig) -> Result<Vec<Summary>> {
    let mut diag = std::io::stderr();
    let children = cache::list(
        dir,
        &cache::Filter {
            parent: Some(id.to_string()),
            ..Default::default()
        },
        &mut diag,
        cfg,
    )?;
    Ok(children
        .into_iter()
        .filter(|c| c.status != TicketStatus::Closed)
        .collect())
}

/// Print either a single JSON object or a plain-text line, matching the
/// two-shapes-per-command convention every subcommand follows.
pub fn print_result(summary: &Summary, json: bool, text: impl FnOnce(&Summary) -> String) {
    if json {
        if let Ok(rendered) = serde_json::to_string(summary) {
            println!("{rendered}");
        }
    } else {
        println!("{}", text(summary));
    }
}
