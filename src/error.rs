//! Error kinds for every layer of the core: cache integrity, frontmatter
//! parsing, cache encoding, concurrency, ticket domain rules, and ID
//! generation. Kept as a single enum (rather than the per-module split a
//! larger workspace might use) because the whole core lives in one crate.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TkError {
    // --- Cache integrity -------------------------------------------------
    // All of these are recoverable by rebuild; the lifecycle coordinator
    // catches them internally and only `CacheNotFound` is silent.
    #[error("cache file not found at {0}")]
    CacheNotFound(PathBuf),

    #[error("cache file has invalid magic bytes")]
    InvalidMagic,

    #[error("cache format version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u16, expected: u16 },

    #[error("cache file is too small to contain a valid header")]
    FileTooSmall,

    #[error("cache file is too large ({0} bytes, max is u32::MAX)")]
    FileTooLarge(u64),

    #[error("cache file is corrupt: {0}")]
    Corrupt(String),

    // --- Frontmatter / parse ----------------------------------------------
    #[error("line {line}: missing required field '{field}'")]
    MissingField { line: usize, field: &'static str },

    #[error("line {line}: invalid value for field '{field}': {value}")]
    InvalidFieldValue {
        line: usize,
        field: String,
        value: String,
    },

    #[error("no YAML frontmatter found")]
    NoFrontmatter,

    #[error("line {0}: frontmatter is missing its closing '---' delimiter")]
    UnclosedFrontmatter(usize),

    #[error("frontmatter exceeds the configured line limit ({0} lines)")]
    FrontmatterTooLong(usize),

    #[error("line {0}: {1}")]
    ParseError(usize, String),

    #[error("ticket body has no title (first-level heading)")]
    NoTitle,

    #[error("unsupported schema_version {0}")]
    UnsupportedSchemaVersion(i64),

    #[error("ticket status is 'closed' but has no 'closed' timestamp")]
    ClosedWithoutTimestamp,

    #[error("ticket has a 'closed' timestamp but status is not 'closed'")]
    ClosedTimestampOnNonClosed,

    // --- Cache encoding limits ---------------------------------------------
    #[error("filename '{0}' exceeds the 32-byte slot")]
    FilenameTooLong(String),

    #[error("encoded entry for '{0}' exceeds 65,535 bytes")]
    EntryTooLarge(String),

    #[error("ticket '{0}' has more than 255 blockers")]
    TooManyBlockers(String),

    #[error("blocker id '{0}' exceeds 255 bytes")]
    BlockerIDTooLong(String),

    #[error("assignee exceeds 255 bytes")]
    AssigneeTooLong,

    #[error("id '{0}' exceeds 255 bytes")]
    IDTooLong(String),

    #[error("title exceeds 65,535 bytes")]
    TitleTooLong,

    #[error("path exceeds 65,535 bytes")]
    PathTooLong,

    #[error("parent id '{0}' exceeds 255 bytes")]
    ParentTooLong(String),

    #[error("invalid ticket type byte {0}")]
    InvalidTicketType(u8),

    #[error("invalid ticket priority {0} (must be 1..4)")]
    InvalidTicketPriority(i64),

    #[error("ticket mtime is negative")]
    NegativeMtime,

    // --- Concurrency -------------------------------------------------------
    #[error("timed out acquiring lock on {0}")]
    LockTimeout(PathBuf),

    // --- Ticket domain (enforced by the CLI command layer) ----------------
    #[error("ticket '{0}' not found")]
    TicketNotFound(String),

    #[error("ticket '{0}' is not open")]
    TicketNotOpen(String),

    #[error("ticket '{0}' is already closed")]
    TicketAlreadyClosed(String),

    #[error("ticket '{0}' is not in progress")]
    TicketNotInProgress(String),

    #[error("ticket '{0}' is already open")]
    TicketAlreadyOpen(String),

    #[error("a ticket cannot block itself")]
    CannotBlockSelf,

    #[error("ticket '{0}' has open children")]
    HasOpenChildren(String),

    #[error("parent ticket '{0}' is closed")]
    ParentClosed(String),

    #[error("parent ticket '{0}' has not been started")]
    ParentNotStarted(String),

    #[error("parent ticket '{0}' not found")]
    ParentNotFound(String),

    #[error("a blocker id is required")]
    BlockerIDRequired,

    #[error("ticket '{0}' is not blocked by '{1}'")]
    NotBlockedBy(String, String),

    #[error("ticket '{0}' is already blocked by '{1}'")]
    AlreadyBlockedBy(String, String),

    // --- Generation ---------------------------------------------------------
    #[error("failed to generate a unique ticket id: {0}")]
    IDGenerationFailed(String),

    // --- Offset paging -------------------------------------------------------
    #[error("offset {offset} exceeds the number of matches ({matches})")]
    OffsetOutOfBounds { offset: usize, matches: usize },

    // --- Filesystem plumbing ---------------------------------------------
    #[error("ticket file '{0}' already exists")]
    TicketFileExists(PathBuf),

    #[error("failed to {operation} {item_type} at {path}: {source}")]
    StorageError {
        operation: &'static str,
        item_type: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error(
        "failed to rewrite cache ({rewrite}) and failed to delete the stale cache ({delete}); \
         run `rm {path}` to recover"
    )]
    CacheRecoveryFailed {
        path: PathBuf,
        rewrite: String,
        delete: String,
    },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TkError>;
