//! `tk block`: blocked-by is stored purely as ids; the core never
//! dereferences it, so every check here (existence, self-blocking,
//! duplicate/missing relationships) is a CLI-layer domain rule.

use std::path::Path;

use crate::config::TkConfig;
use crate::error::{Result, TkError};
use crate::ticket;

use super::{find_summary, print_result, reload_summary, upsert};

pub fn run(dir: &Path, id: &str, by: Option<&str>, remove: bool, json: bool) -> Result<()> {
    let by = by.ok_or(TkError::BlockerIDRequired)?;
    if by == id {
        return Err(TkError::CannotBlockSelf);
    }

    let current = find_summary(dir, id)?;
    find_summary(dir, by)?; // blocker must exist

    let already_present = current.blocked_by.iter().any(|b| b == by);
    if remove && !already_present {
        return Err(TkError::NotBlockedBy(id.to_string(), by.to_string()));
    }
    if !remove && already_present {
        return Err(TkError::AlreadyBlockedBy(id.to_string(), by.to_string()));
    }

    let by_owned = by.to_string();
    ticket::update_blocked_by(dir, id, |mut list| {
        if remove {
            list.retain(|b| b != &by_owned);
        } else {
            list.push(by_owned.clone());
        }
        list
    })?;

    let cfg = TkConfig::load(dir)?;
    let summary = reload_summary(dir, id)?;
    upsert(dir, id, summary.clone(), &cfg)?;

    print_result(&summary, json, |s| {
        if remove {
            format!("Removed block: {} no longer blocked by {by}", s.id)
        } else {
            format!("Blocked {} by {by}", s.id)
        }
    });
    Ok(())
}
