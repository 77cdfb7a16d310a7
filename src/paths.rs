//! Resolution of the ticket directory root.
//!
//! The core (`cache`, `ticket`, `frontmatter`) never calls anything in this
//! module — every core entry point takes an already-resolved `&Path`. This
//! module exists only for the CLI front end, which needs to decide *which*
//! directory a bare `tk ls` operates on.

use std::path::PathBuf;

/// Resolve the ticket directory: `$TK_DIR` if set, otherwise `./tickets`.
pub fn ticket_dir() -> PathBuf {
    match std::env::var("TK_DIR") {
        Ok(root) => PathBuf::from(root),
        Err(_) => PathBuf::from("tickets"),
    }
}
