//! Ticket-domain enums and the `Summary` projection.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Closed,
}

impl TicketStatus {
    /// Byte encoding used in the cache index (0=open, 1=in_progress, 2=closed).
    pub fn as_byte(self) -> u8 {
        match self {
            TicketStatus::Open => 0,
            TicketStatus::InProgress => 1,
            TicketStatus::Closed => 2,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TicketStatus::Open),
            1 => Some(TicketStatus::InProgress),
            2 => Some(TicketStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Open => write!(f, "open"),
            TicketStatus::InProgress => write!(f, "in_progress"),
            TicketStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for TicketStatus {
    type Err = TkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(TkError::InvalidFieldValue {
                line: 0,
                field: "status".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Bug,
    Feature,
    Task,
    Epic,
    Chore,
}

impl TicketType {
    /// Byte encoding used in the cache index (0=bug .. 4=chore).
    pub fn as_byte(self) -> u8 {
        match self {
            TicketType::Bug => 0,
            TicketType::Feature => 1,
            TicketType::Task => 2,
            TicketType::Epic => 3,
            TicketType::Chore => 4,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(TicketType::Bug),
            1 => Some(TicketType::Feature),
            2 => Some(TicketType::Task),
            3 => Some(TicketType::Epic),
            4 => Some(TicketType::Chore),
            _ => None,
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketType::Bug => write!(f, "bug"),
            TicketType::Feature => write!(f, "feature"),
            TicketType::Task => write!(f, "task"),
            TicketType::Epic => write!(f, "epic"),
            TicketType::Chore => write!(f, "chore"),
        }
    }
}

impl FromStr for TicketType {
    type Err = TkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bug" => Ok(TicketType::Bug),
            "feature" => Ok(TicketType::Feature),
            "task" => Ok(TicketType::Task),
            "epic" => Ok(TicketType::Epic),
            "chore" => Ok(TicketType::Chore),
            _ => Err(TkError::InvalidFieldValue {
                line: 0,
                field: "type".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Ticket priority, 1 (highest) through 4 (lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TicketPriority(u8);

impl TicketPriority {
    pub fn new(value: u8) -> Result<Self, TkError> {
        if (1..=4).contains(&value) {
            Ok(TicketPriority(value))
        } else {
            Err(TkError::InvalidTicketPriority(value as i64))
        }
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TicketPriority {
    type Err = TkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s.parse().map_err(|_| TkError::InvalidFieldValue {
            line: 0,
            field: "priority".to_string(),
            value: s.to_string(),
        })?;
        TicketPriority::new(value)
    }
}

/// In-memory projection of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub schema_version: u8,
    pub id: String,
    pub status: TicketStatus,
    pub blocked_by: Vec<String>,
    pub parent: Option<String>,
    pub created: String,
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    pub priority: u8,
    pub assignee: Option<String>,
    pub closed: Option<String>,
    pub title: String,
    pub path: String,
}

/// A cache entry: a summary plus the ticket file's mtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub summary: Summary,
    pub mtime_ns: u64,
}

/// Filename helpers shared by the ticket and cache layers.
pub fn filename_for_id(id: &str) -> String {
    format!("{id}.md")
}

pub fn id_from_filename(filename: &str) -> Option<&str> {
    filename.strip_suffix(".md")
}

pub fn ticket_path(dir: &std::path::Path, id: &str) -> PathBuf {
    dir.join(filename_for_id(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrips_through_byte() {
        for s in [TicketStatus::Open, TicketStatus::InProgress, TicketStatus::Closed] {
            assert_eq!(TicketStatus::from_byte(s.as_byte()), Some(s));
        }
    }

    #[test]
    fn type_roundtrips_through_byte() {
        for t in [
            TicketType::Bug,
            TicketType::Feature,
            TicketType::Task,
            TicketType::Epic,
            TicketType::Chore,
        ] {
            assert_eq!(TicketType::from_byte(t.as_byte()), Some(t));
        }
    }

    #[test]
    fn priority_rejects_out_of_range() {
        assert!(TicketPriority::new(0).is_err());
        assert!(TicketPriority::new(5).is_err());
        assert!(TicketPriority::new(1).is_ok());
        assert!(TicketPriority::new(4).is_ok());
    }

    #[test]
    fn status_parses_case_sensitively() {
        assert_eq!("open".parse::<TicketStatus>().unwrap(), TicketStatus::Open);
        assert!("Open".parse::<TicketStatus>().is_err());
    }
}
