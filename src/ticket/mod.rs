//! Ticket file grammar, summary extraction, and mutation helpers.

pub mod id;

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Result, TkError};
use crate::frontmatter::{self, ParseOptions, Scalar, Value};
use crate::lock::{self, DirLock};
use crate::types::{Summary, TicketPriority, TicketStatus, TicketType, ticket_path};

/// Fields needed to author a brand-new ticket. `id` and `created` are filled
/// in by [`write_ticket_atomic`]; callers building [`write_ticket`] directly
/// supply every field.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub id: String,
    pub status: TicketStatus,
    pub blocked_by: Vec<String>,
    pub parent: Option<String>,
    pub created: String,
    pub ticket_type: TicketType,
    pub priority: TicketPriority,
    pub assignee: Option<String>,
    pub external_ref: Option<String>,
    pub closed: Option<String>,
    pub title: String,
    pub body: String,
}

/// Write a ticket file at `<dir>/<ticket.id>.md`. Fails with
/// `TicketFileExists` rather than silently overwriting.
pub fn write_ticket(dir: &Path, ticket: &NewTicket) -> Result<PathBuf> {
    let path = ticket_path(dir, &ticket.id);
    if path.exists() {
        return Err(TkError::TicketFileExists(path));
    }
    crate::fs::write_atomic(&path, render_ticket(ticket).as_bytes())?;
    Ok(path)
}

/// Generate a fresh id, then write the ticket. On an extremely unlikely
/// `TicketFileExists` race (the id was taken between generation and write),
/// the caller's id-generation lock already serializes same-second creators,
/// so this should not happen in practice; it is still propagated rather than
/// silently retried.
pub fn write_ticket_atomic(
    dir: &Path,
    mut fields: NewTicket,
    lock_timeout: Duration,
) -> Result<(String, PathBuf)> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32;
    let generated_id = id::generate_id(dir, now, lock_timeout)?;
    fields.id = generated_id.clone();
    let path = write_ticket(dir, &fields)?;
    Ok((generated_id, path))
}

/// Read-modify-write a ticket's `status` (and, for a close, its `closed`
/// timestamp) under the per-ticket-file lock. Does not update the cache;
/// callers must follow up with `cache::upsert`.
pub fn update_status(dir: &Path, id: &str, new_status: TicketStatus, now: &str) -> Result<()> {
    let path = ticket_path(dir, id);
    let locks_dir = dir.join(".locks");
    let lock = DirLock::acquire(&locks_dir, &format!("{id}.md"), lock::DEFAULT_TIMEOUT)?;

    let result = (|| {
        let content = crate::fs::read_to_string(&path)?;
        let doc = frontmatter::parse_document(&content, &ParseOptions::default())?;
        let mut frontmatter = doc.frontmatter;

        frontmatter.insert(
            "status".to_string(),
            Value::Scalar(Scalar::Str(new_status.to_string())),
        );
        match new_status {
            TicketStatus::Closed => {
                frontmatter.insert(
                    "closed".to_string(),
                    Value::Scalar(Scalar::Str(now.to_string())),
                );
            }
            _ => {
                frontmatter.remove("closed");
            }
        }

        let rendered = render_frontmatter_map(&frontmatter);
        let new_content = format!("---\n{rendered}---\n{}", doc.tail);
        crate::fs::write_atomic(&path, new_content.as_bytes())
    })();

    lock.release()?;
    result
}

/// Read-modify-write a ticket's `blocked-by` list under the per-ticket-file
/// lock. `mutate` receives the current list and returns the new one; the
/// caller (the `block` CLI command) is responsible for the domain checks
/// (self-blocking, duplicate/missing entries) before calling this.
pub fn update_blocked_by(
    dir: &Path,
    id: &str,
    mutate: impl FnOnce(Vec<String>) -> Vec<String>,
) -> Result<()> {
    let path = ticket_path(dir, id);
    let locks_dir = dir.join(".locks");
    let lock = DirLock::acquire(&locks_dir, &format!("{id}.md"), lock::DEFAULT_TIMEOUT)?;

    let result = (|| {
        let content = crate::fs::read_to_string(&path)?;
        let doc = frontmatter::parse_document(&content, &ParseOptions::default())?;
        let mut frontmatter = doc.frontmatter;

        let current = match frontmatter.get("blocked-by") {
            Some(Value::List(items)) => items.clone(),
            _ => Vec::new(),
        };
        let updated = mutate(current);
        frontmatter.insert("blocked-by".to_string(), Value::List(updated));

        let rendered = render_frontmatter_map(&frontmatter);
        let new_content = format!("---\n{rendered}---\n{}", doc.tail);
        crate::fs::write_atomic(&path, new_content.as_bytes())
    })();

    lock.release()?;
    result
}

/// Extract a `Summary` from a ticket file on disk.
pub fn extract_summary(path: &Path) -> Result<Summary> {
    let content = crate::fs::read_to_string(path)?;
    let doc = frontmatter::parse_document(&content, &ParseOptions::default())?;
    let fm = &doc.frontmatter;

    let schema_version = require_int(fm, "schema_version")?;
    if schema_version != 1 {
        return Err(TkError::UnsupportedSchemaVersion(schema_version));
    }

    let id = require_str(fm, "id")?.to_string();
    let filename_stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    if id != filename_stem {
        return Err(TkError::InvalidFieldValue {
            line: 0,
            field: "id".to_string(),
            value: format!("'{id}' does not match filename stem '{filename_stem}'"),
        });
    }

    let status: TicketStatus = require_str(fm, "status")?.parse()?;
    let ticket_type: TicketType = require_str(fm, "type")?.parse()?;
    let priority_raw = require_int(fm, "priority")?;
    let priority = TicketPriority::new(u8::try_from(priority_raw).map_err(|_| {
        TkError::InvalidFieldValue {
            line: 0,
            field: "priority".to_string(),
            value: priority_raw.to_string(),
        }
    })?)?;

    let blocked_by = match fm.get("blocked-by") {
        Some(Value::List(items)) => items.clone(),
        Some(_) => {
            return Err(TkError::InvalidFieldValue {
                line: 0,
                field: "blocked-by".to_string(),
                value: "expected a list".to_string(),
            });
        }
        None => return Err(TkError::MissingField { line: 0, field: "blocked-by" }),
    };

    let created = require_str(fm, "created")?.to_string();
    validate_rfc3339(&created, "created")?;

    let parent = optional_str(fm, "parent");
    let assignee = optional_str(fm, "assignee");
    let closed = optional_str(fm, "closed");

    match (&status, &closed) {
        (TicketStatus::Closed, None) => return Err(TkError::ClosedWithoutTimestamp),
        (other, Some(_)) if *other != TicketStatus::Closed => {
            return Err(TkError::ClosedTimestampOnNonClosed);
        }
        _ => {}
    }
    if let Some(c) = &closed {
        validate_rfc3339(c, "closed")?;
    }

    let title = extract_title(&doc.tail)?;

    Ok(Summary {
        schema_version: 1,
        id,
        status,
        blocked_by,
        parent,
        created,
        ticket_type,
        priority: priority.as_u8(),
        assignee,
        closed,
        title,
        path: path.to_string_lossy().to_string(),
    })
}

fn require_str<'a>(
    fm: &'a std::collections::BTreeMap<String, Value>,
    field: &'static str,
) -> Result<&'a str> {
    fm.get(field)
        .and_then(Value::as_str)
        .ok_or(TkError::MissingField { line: 0, field })
}

fn require_int(fm: &std::collections::BTreeMap<String, Value>, field: &'static str) -> Result<i64> {
    fm.get(field)
        .and_then(Value::as_scalar)
        .and_then(Scalar::as_int)
        .ok_or(TkError::MissingField { line: 0, field })
}

fn optional_str(fm: &std::collections::BTreeMap<String, Value>, field: &str) -> Option<String> {
    fm.get(field).and_then(Value::as_str).map(str::to_string)
}

fn validate_rfc3339(value: &str, field: &'static str) -> Result<()> {
    value
        .parse::<jiff::Timestamp>()
        .map(|_| ())
        .map_err(|_| TkError::InvalidFieldValue {
            line: 0,
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Pull the first `# ` heading out of the ticket body as the title.
fn extract_title(tail: &str) -> Result<String> {
    for line in tail.lines() {
        if let Some(rest) = line.strip_prefix("# ") {
            let title = rest.trim();
            if title.is_empty() {
                return Err(TkError::NoTitle);
            }
            return Ok(title.to_string());
        }
    }
    Err(TkError::NoTitle)
}

fn render_ticket(ticket: &NewTicket) -> String {
    let mut frontmatter = String::new();
    frontmatter.push_str("schema_version: 1\n");
    frontmatter.push_str(&format!("id: {}\n", Scalar::Str(ticket.id.clone()).to_yaml()));
    frontmatter.push_str(&format!("status: {}\n", ticket.status));
    frontmatter.push_str(&format!(
        "blocked-by: [{}]\n",
        ticket
            .blocked_by
            .iter()
            .map(|b| Scalar::Str(b.clone()).to_yaml())
            .collect::<Vec<_>>()
            .join(", ")
    ));
    frontmatter.push_str(&format!(
        "created: {}\n",
        Scalar::Str(ticket.created.clone()).to_yaml()
    ));
    frontmatter.push_str(&format!("type: {}\n", ticket.ticket_type));
    frontmatter.push_str(&format!("priority: {}\n", ticket.priority));
    if let Some(parent) = &ticket.parent {
        frontmatter.push_str(&format!("parent: {}\n", Scalar::Str(parent.clone()).to_yaml()));
    }
    if let Some(assignee) = &ticket.assignee {
        frontmatter.push_str(&format!(
            "assignee: {}\n",
            Scalar::Str(assignee.clone()).to_yaml()
        ));
    }
    if let Some(external_ref) = &ticket.external_ref {
        frontmatter.push_str(&format!(
            "external-ref: {}\n",
            Scalar::Str(external_ref.clone()).to_yaml()
        ));
    }
    if let Some(closed) = &ticket.closed {
        frontmatter.push_str(&format!(
            "closed: {}\n",
            Scalar::Str(closed.clone()).to_yaml()
        ));
    }

    let body = if ticket.body.is_empty() {
        String::new()
    } else {
        format!("\n{}", ticket.body)
    };

    format!(
        "---\n{frontmatter}---\n# {title}\n{body}",
        title = ticket.title
    )
}

fn render_frontmatter_map(fm: &std::collections::BTreeMap<String, Value>) -> String {
    let mut out = String::new();
    // Canonical field order, matching `render_ticket`, so status/closed
    // rewrites read the same as freshly authored tickets.
    const ORDER: &[&str] = &[
        "schema_version",
        "id",
        "status",
        "blocked-by",
        "created",
        "type",
        "priority",
        "parent",
        "assignee",
        "external-ref",
        "closed",
    ];

    for key in ORDER {
        if let Some(value) = fm.get(*key) {
            out.push_str(&render_value_line(key, value));
        }
    }
    // Anything not in the canonical order (forward-compatible unknown
    // fields) is preserved at the end, sorted for determinism.
    for (key, value) in fm {
        if !ORDER.contains(&key.as_str()) {
            out.push_str(&render_value_line(key, value));
        }
    }
    out
}

fn render_value_line(key: &str, value: &Value) -> String {
    match value {
        Value::Scalar(s) => format!("{key}: {}\n", s.to_yaml()),
        Value::List(items) => format!(
            "{key}: [{}]\n",
            items
                .iter()
                .map(|i| Scalar::Str(i.clone()).to_yaml())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Object(obj) => {
            let mut s = format!("{key}:\n");
            for (k, v) in obj {
                s.push_str(&format!("  {k}: {}\n", v.to_yaml()));
            }
            s
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ticket(id: &str) -> NewTicket {
        NewTicket {
            id: id.to_string(),
            status: TicketStatus::Open,
            blocked_by: vec![],
            parent: None,
            created: "2026-07-28T00:00:00Z".to_string(),
            ticket_type: TicketType::Bug,
            priority: TicketPriority::new(2).unwrap(),
            assignee: None,
            external_ref: None,
            closed: None,
            title: "Fix the thing".to_string(),
            body: "Some details.\n".to_string(),
        }
    }

    #[test]
    fn write_then_extract_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ticket = sample_ticket("a000001");
        let path = write_ticket(dir.path(), &ticket).unwrap();
        let summary = extract_summary(&path).unwrap();
        assert_eq!(summary.id, "a000001");
        assert_eq!(summary.title, "Fix the thing");
        assert_eq!(summary.status, TicketStatus::Open);
        assert_eq!(summary.priority, 2);
        assert!(summary.closed.is_none());
    }

    #[test]
    fn write_rejects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ticket = sample_ticket("a000002");
        write_ticket(dir.path(), &ticket).unwrap();
        let result = write_ticket(dir.path(), &ticket);
        assert!(matches!(result, Err(TkError::TicketFileExists(_))));
    }

    #[test]
    fn write_ticket_atomic_generates_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut ticket = sample_ticket("placeholder");
        ticket.id = String::new();
        let (id, path) =
            write_ticket_atomic(dir.path(), ticket, Duration::from_secs(2)).unwrap();
        assert_eq!(id.len(), 7);
        assert!(path.exists());
    }

    #[test]
    fn update_status_to_closed_sets_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let ticket = sample_ticket("a000003");
        write_ticket(dir.path(), &ticket).unwrap();
        update_status(
            dir.path(),
            "a000003",
            TicketStatus::Closed,
            "2026-07-28T01:00:00Z",
        )
        .unwrap();
        let summary = extract_summary(&ticket_path(dir.path(), "a000003")).unwrap();
        assert_eq!(summary.status, TicketStatus::Closed);
        assert_eq!(summary.closed.as_deref(), Some("2026-07-28T01:00:00Z"));
    }

    #[test]
    fn update_blocked_by_adds_and_removes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ticket = sample_ticket("a000007");
        write_ticket(dir.path(), &ticket).unwrap();

        update_blocked_by(dir.path(), "a000007", |mut list| {
            list.push("b000001".to_string());
            list
        })
        .unwrap();
        let summary = extract_summary(&ticket_path(dir.path(), "a000007")).unwrap();
        assert_eq!(summary.blocked_by, vec!["b000001".to_string()]);

        update_blocked_by(dir.path(), "a000007", |list| {
            list.into_iter().filter(|b| b != "b000001").collect()
        })
        .unwrap();
        let summary = extract_summary(&ticket_path(dir.path(), "a000007")).unwrap();
        assert!(summary.blocked_by.is_empty());
    }

    #[test]
    fn extract_summary_rejects_closed_without_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let content = "---\nschema_version: 1\nid: a000004\nstatus: closed\nblocked-by: []\ncreated: 2026-07-28T00:00:00Z\ntype: bug\npriority: 2\n---\n# Title\n";
        let path = dir.path().join("a000004.md");
        std::fs::write(&path, content).unwrap();
        let result = extract_summary(&path);
        assert!(matches!(result, Err(TkError::ClosedWithoutTimestamp)));
    }

    #[test]
    fn extract_summary_rejects_id_filename_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let content = "---\nschema_version: 1\nid: wrong-id\nstatus: open\nblocked-by: []\ncreated: 2026-07-28T00:00:00Z\ntype: bug\npriority: 2\n---\n# Title\n";
        let path = dir.path().join("a000005.md");
        std::fs::write(&path, content).unwrap();
        let result = extract_summary(&path);
        assert!(result.is_err());
    }

    #[test]
    fn extract_summary_rejects_missing_title() {
        let dir = tempfile::tempdir().unwrap();
        let content = "---\nschema_version: 1\nid: a000006\nstatus: open\nblocked-by: []\ncreated: 2026-07-28T00:00:00Z\ntype: bug\npriority: 2\n---\nNo heading here.\n";
        let path = dir.path().join("a000006.md");
        std::fs::write(&path, content).unwrap();
        let result = extract_summary(&path);
        assert!(matches!(result, Err(TkError::NoTitle)));
    }
}
