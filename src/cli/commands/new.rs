//! `tk new`: `write_ticket_atomic(dir, ticket)` followed by write-through.

use std::path::Path;

use crate::config::TkConfig;
use crate::error::{Result, TkError};
use crate::ticket::{self, NewTicket};
use crate::types::{TicketPriority, TicketStatus, TicketType};

use super::{find_summary, now_rfc3339, print_result, reload_summary, upsert};

pub struct NewArgs {
    pub title: String,
    pub ticket_type: TicketType,
    pub priority: TicketPriority,
    pub parent: Option<String>,
    pub assignee: Option<String>,
    pub external_ref: Option<String>,
    pub json: bool,
}

pub fn run(dir: &Path, args: NewArgs) -> Result<()> {
    let cfg = TkConfig::load(dir)?;

    if let Some(parent_id) = &args.parent {
        let parent = find_summary(dir, parent_id)
            .map_err(|_| TkError::ParentNotFound(parent_id.clone()))?;
        if parent.status == TicketStatus::Closed {
            return Err(TkError::ParentClosed(parent_id.clone()));
        }
    }

    let fields = NewTicket {
        id: String::new(),
        status: TicketStatus::Open,
        blocked_by: Vec::new(),
        parent: args.parent,
        created: now_rfc3339(),
        ticket_type: args.ticket_type,
        priority: args.priority,
        assignee: args.assignee,
        external_ref: args.external_ref,
        closed: None,
        title: args.title,
        body: String::new(),
    };

    let (id, _path) = ticket::write_ticket_atomic(dir, fields, cfg.lock_timeout())?;
    let summary = reload_summary(dir, &id)?;
    upsert(dir, &id, summary.clone(), &cfg)?;

    print_result(&summary, args.json, |s| format!("Created {} - {}", s.id, s.title));
    Ok(())
}
