//! CLI front end. An external collaborator: it parses
//! arguments, enforces ticket-domain transition rules the core cache does
//! not know about, and translates `TkError` into exit codes. None of this
//! module is part of the on-disk format or lifecycle contract.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::types::{TicketPriority, TicketType};

#[derive(Parser)]
#[command(name = "tk")]
#[command(about = "A local ticket tracker backed by a memory-mappable binary index")]
#[command(version)]
pub struct Cli {
    /// Ticket directory (defaults to $TK_DIR, or ./tickets)
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tickets, optionally filtered
    Ls {
        #[arg(long, value_parser = parse_status)]
        status: Option<crate::types::TicketStatus>,

        #[arg(long, value_parser = parse_priority)]
        priority: Option<TicketPriority>,

        #[arg(long = "type", value_parser = parse_type)]
        ticket_type: Option<TicketType>,

        /// Only tickets whose `parent` equals this id
        #[arg(long)]
        parent: Option<String>,

        /// Only tickets with no parent
        #[arg(long)]
        roots_only: bool,

        /// Maximum number of results (0 = unlimited; defaults to the
        /// configured page size when omitted)
        #[arg(long)]
        limit: Option<usize>,

        /// Skip this many matches before collecting results
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Emit newline-delimited JSON summaries instead of a formatted table
        #[arg(long)]
        json: bool,
    },

    /// Create a new ticket
    New {
        /// Ticket title (becomes the first-level heading in the body)
        title: String,

        #[arg(short = 't', long = "type", default_value = "task", value_parser = parse_type)]
        ticket_type: TicketType,

        #[arg(short, long, default_value = "2", value_parser = parse_priority)]
        priority: TicketPriority,

        /// Parent ticket id
        #[arg(long)]
        parent: Option<String>,

        #[arg(long)]
        assignee: Option<String>,

        /// External reference, e.g. `gh-123`
        #[arg(long)]
        external_ref: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Mark a ticket as in progress
    Start {
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Close a ticket (requires it to be in progress)
    Close {
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Reopen a closed ticket
    Reopen {
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Open a ticket's file in $EDITOR and re-validate on return
    Edit { id: String },

    /// Add or remove a blocked-by relationship
    Block {
        /// The ticket that is blocked
        id: String,

        /// The id of the ticket doing the blocking
        #[arg(long = "by")]
        by: Option<String>,

        /// Remove the relationship instead of adding it
        #[arg(long)]
        remove: bool,

        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn parse_status(s: &str) -> std::result::Result<crate::types::TicketStatus, String> {
    s.parse().map_err(|_| {
        format!("invalid status '{s}' (expected open, in_progress, or closed)")
    })
}

fn parse_type(s: &str) -> std::result::Result<TicketType, String> {
    s.parse()
        .map_err(|_| format!("invalid type '{s}' (expected bug, feature, task, epic, or chore)"))
}

fn parse_priority(s: &str) -> std::result::Result<TicketPriority, String> {
    s.parse().map_err(|_| format!("invalid priority '{s}' (expected 1..4)"))
}

impl Commands {
    pub fn run(&self, dir: &std::path::Path) -> Result<()> {
        match self {
            Commands::Ls {
                status,
                priority,
                ticket_type,
                parent,
                roots_only,
                limit,
                offset,
                json,
            } => commands::ls::run(
                dir,
                commands::ls::LsArgs {
                    status: *status,
                    priority: priority.map(TicketPriority::as_u8),
                    ticket_type: *ticket_type,
                    parent: parent.clone(),
                    roots_only: *roots_only,
                    limit: *limit,
                    offset: *offset,
                    json: *json,
                },
            ),
            Commands::New {
                title,
                ticket_type,
                priority,
                parent,
                assignee,
                external_ref,
                json,
            } => commands::new::run(
                dir,
                commands::new::NewArgs {
                    title: title.clone(),
                    ticket_type: *ticket_type,
                    priority: *priority,
                    parent: parent.clone(),
                    assignee: assignee.clone(),
                    external_ref: external_ref.clone(),
                    json: *json,
                },
            ),
            Commands::Start { id, json } => commands::status::cmd_start(dir, id, *json),
            Commands::Close { id, json } => commands::status::cmd_close(dir, id, *json),
            Commands::Reopen { id, json } => commands::status::cmd_reopen(dir, id, *json),
            Commands::Edit { id } => commands::edit::run(dir, id),
            Commands::Block {
                id,
                by,
                remove,
                json,
            } => commands::block::run(dir, id, by.as_deref(), *remove, *json),
            Commands::Completions { shell } => {
                commands::completions::run(*shell);
                Ok(())
            }
        }
    }
}
