//! Filename lookup and the (status, priority, type, parent, roots-only)
//! filter.

use crate::cache::codec::CacheView;
use crate::error::{Result, TkError};
use crate::types::{TicketStatus, TicketType};

/// Filter dimensions for a list query. `None`/default means "don't filter
/// on this dimension".
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub status: Option<TicketStatus>,
    pub priority: Option<u8>,
    pub ticket_type: Option<TicketType>,
    pub parent: Option<String>,
    pub roots_only: bool,
    /// 0 means unlimited.
    pub limit: usize,
    pub offset: usize,
}

/// Scan `view`'s index section in filename-sorted order and return the
/// indices matching `filter`, after skipping `filter.offset` matches and
/// capping at `filter.limit` (0 = unlimited).
///
/// Returns `OffsetOutOfBounds` when `offset > 0` and fewer than
/// `offset + 1` matches exist overall.
pub fn filter(view: &CacheView, f: &Filter) -> Result<Vec<u32>> {
    let mut result = Vec::new();
    let mut matched = 0usize;

    for i in 0..view.count() {
        if f.limit != 0 && result.len() == f.limit {
            break;
        }
        if passes(view, i, f) {
            if matched >= f.offset {
                result.push(i);
            }
            matched += 1;
        }
    }

    if f.offset > 0 && matched <= f.offset {
        return Err(TkError::OffsetOutOfBounds {
            offset: f.offset,
            matches: matched,
        });
    }

    Ok(result)
}

fn passes(view: &CacheView, index: u32, f: &Filter) -> bool {
    if let Some(status) = f.status {
        if view.status_byte(index) != status.as_byte() {
            return false;
        }
    }
    if let Some(priority) = f.priority {
        if view.priority_byte(index) != priority {
            return false;
        }
    }
    if let Some(ticket_type) = f.ticket_type {
        if view.type_byte(index) != ticket_type.as_byte() {
            return false;
        }
    }
    if let Some(parent) = &f.parent {
        if view.parent_slot(index) != parent {
            return false;
        }
    }
    if f.roots_only && !view.parent_slot(index).is_empty() {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::codec::encode;
    use crate::types::{CacheEntry, Summary, TicketType};
    use std::path::PathBuf;

    fn entry(id: &str, status: TicketStatus, priority: u8, parent: Option<&str>) -> CacheEntry {
        CacheEntry {
            summary: Summary {
                schema_version: 1,
                id: id.to_string(),
                status,
                blocked_by: vec![],
                parent: parent.map(str::to_string),
                created: "2026-07-28T00:00:00Z".to_string(),
                ticket_type: TicketType::Task,
                priority,
                assignee: None,
                closed: None,
                title: "t".to_string(),
                path: format!("/tickets/{id}.md"),
            },
            mtime_ns: 1,
        }
    }

    fn sample_view(bytes: &[u8]) -> CacheView<'_> {
        CacheView::validate(bytes, PathBuf::from(".cache")).unwrap()
    }

    #[test]
    fn filters_by_status() {
        let entries = vec![
            entry("a-001", TicketStatus::Open, 1, None),
            entry("b-002", TicketStatus::Closed, 1, None),
        ];
        let bytes = encode(&entries).unwrap();
        let view = sample_view(&bytes);
        let f = Filter {
            status: Some(TicketStatus::Closed),
            ..Default::default()
        };
        let result = filter(&view, &f).unwrap();
        assert_eq!(result, vec![1]);
    }

    #[test]
    fn roots_only_excludes_entries_with_parent() {
        let entries = vec![
            entry("a-001", TicketStatus::Open, 1, None),
            entry("b-002", TicketStatus::Open, 1, Some("a-001")),
        ];
        let bytes = encode(&entries).unwrap();
        let view = sample_view(&bytes);
        let f = Filter {
            roots_only: true,
            ..Default::default()
        };
        let result = filter(&view, &f).unwrap();
        assert_eq!(result, vec![0]);
    }

    #[test]
    fn offset_and_limit_paginate() {
        let entries: Vec<_> = (0..5)
            .map(|i| entry(&format!("a-00{i}"), TicketStatus::Open, 1, None))
            .collect();
        let bytes = encode(&entries).unwrap();
        let view = sample_view(&bytes);
        let all = filter(&view, &Filter::default()).unwrap();
        let paged = filter(
            &view,
            &Filter {
                limit: 2,
                offset: 1,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(paged, all[1..3]);
    }

    #[test]
    fn offset_beyond_matches_is_out_of_bounds() {
        let entries = vec![entry("a-001", TicketStatus::Open, 1, None)];
        let bytes = encode(&entries).unwrap();
        let view = sample_view(&bytes);
        let result = filter(
            &view,
            &Filter {
                offset: 5,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(TkError::OffsetOutOfBounds { .. })));
    }

    #[test]
    fn zero_offset_with_no_matches_is_an_empty_list_not_an_error() {
        let entries = vec![entry("a-001", TicketStatus::Open, 1, None)];
        let bytes = encode(&entries).unwrap();
        let view = sample_view(&bytes);
        let result = filter(
            &view,
            &Filter {
                status: Some(TicketStatus::Closed),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn filter_preserves_filename_sorted_order() {
        let entries = vec![
            entry("c-003", TicketStatus::Open, 1, None),
            entry("a-001", TicketStatus::Open, 1, None),
            entry("b-002", TicketStatus::Open, 1, None),
        ];
        let bytes = encode(&entries).unwrap();
        let view = sample_view(&bytes);
        let result = filter(&view, &Filter::default()).unwrap();
        let names: Vec<&str> = result.iter().map(|&i| view.filename(i)).collect();
        assert_eq!(names, vec!["a-001.md", "b-002.md", "c-003.md"]);
    }
}
