//! `tk start` / `tk close` / `tk reopen`: read-modify-write under the
//! per-ticket lock, then write-through.
//!
//! Status-transition legality lives here, not in the cache: the core only
//! knows how to store whatever status a ticket file already has.

use std::path::Path;

use crate::config::TkConfig;
use crate::error::{Result, TkError};
use crate::ticket;
use crate::types::TicketStatus;

use super::{find_summary, now_rfc3339, open_children, print_result, reload_summary, upsert};

pub fn cmd_start(dir: &Path, id: &str, json: bool) -> Result<()> {
    let cfg = TkConfig::load(dir)?;
    let current = find_summary(dir, id)?;
    match current.status {
        TicketStatus::Open => {}
        TicketStatus::InProgress => return Err(TkError::TicketAlreadyOpen(id.to_string())),
        TicketStatus::Closed => return Err(TkError::TicketNotOpen(id.to_string())),
    }

    ticket::update_status(dir, id, TicketStatus::InProgress, &now_rfc3339())?;
    let summary = reload_summary(dir, id)?;
    upsert(dir, id, summary.clone(), &cfg)?;
    print_result(&summary, json, |s| format!("Started {} - {}", s.id, s.title));
    Ok(())
}

pub fn cmd_close(dir: &Path, id: &str, json: bool) -> Result<()> {
    let cfg = TkConfig::load(dir)?;
    let current = find_summary(dir, id)?;
    match current.status {
        TicketStatus::InProgress => {}
        TicketStatus::Open => return Err(TkError::TicketNotInProgress(id.to_string())),
        TicketStatus::Closed => return Err(TkError::TicketAlreadyClosed(id.to_string())),
    }

    let children = open_children(dir, id, &cfg)?;
    if !children.is_empty() {
        return Err(TkError::HasOpenChildren(id.to_string()));
    }

    ticket::update_status(dir, id, TicketStatus::Closed, &now_rfc3339())?;
    let summary = reload_summary(dir, id)?;
    upsert(dir, id, summary.clone(), &cfg)?;
    print_result(&summary, json, |s| format!("Closed {} - {}", s.id, s.title));
    Ok(())
}

pub fn cmd_reopen(dir: &Path, id: &str, json: bool) -> Result<()> {
    let cfg = TkConfig::load(dir)?;
    let current = find_summary(dir, id)?;
    match current.status {
        TicketStatus::Closed => {}
        TicketStatus::Open | TicketStatus::InProgress => {
            return Err(TkError::TicketAlreadyOpen(id.to_string()));
        }
    }

    ticket::update_status(dir, id, TicketStatus::Open, &now_rfc3339())?;
    let summary = reload_summary(dir, id)?;
    upsert(dir, id, summary.clone(), &cfg)?;
    print_result(&summary, json, |s| format!("Reopened {} - {}", s.id, s.title));
    Ok(())
}
