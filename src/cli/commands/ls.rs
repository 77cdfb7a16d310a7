//! `tk ls`: list tickets through `cache::list(dir, filter, diag)`.

use std::path::Path;

use owo_colors::OwoColorize;

use crate::cache::{self, Filter};
use crate::config::TkConfig;
use crate::error::Result;
use crate::types::{Summary, TicketStatus, TicketType};

pub struct LsArgs {
    pub status: Option<TicketStatus>,
    pub priority: Option<u8>,
    pub ticket_type: Option<TicketType>,
    pub parent: Option<String>,
    pub roots_only: bool,
    /// `None` means `--limit` was not given on the command line, which falls
    /// back to `cfg.default_page_size`. `Some(0)` is an explicit `--limit 0`
    /// and must mean unlimited, per the core's filter contract.
    pub limit: Option<usize>,
    pub offset: usize,
    pub json: bool,
}

pub fn run(dir: &Path, args: LsArgs) -> Result<()> {
    let cfg = TkConfig::load(dir)?;
    let limit = args.limit.unwrap_or(cfg.default_page_size);

    let filter = Filter {
        status: args.status,
        priority: args.priority,
        ticket_type: args.ticket_type,
        parent: args.parent,
        roots_only: args.roots_only,
        limit,
        offset: args.offset,
    };

    let mut diag = std::io::stderr();
    let summaries = cache::list(dir, &filter, &mut diag, &cfg)?;

    if args.json {
        for summary in &summaries {
            let rendered = serde_json::to_string(summary)
                .map_err(|e| crate::error::TkError::Other(e.to_string()))?;
            println!("{rendered}");
        }
    } else {
        for summary in &summaries {
            println!("{}", format_line(summary));
        }
    }
    Ok(())
}

fn format_line(summary: &Summary) -> String {
    let id = format!("{:8}", summary.id).cyan().to_string();
    let status_str = format!("[{}]", summary.status);
    let colored_status = match summary.status {
        TicketStatus::Open => status_str.yellow().to_string(),
        TicketStatus::InProgress => status_str.cyan().to_string(),
        TicketStatus::Closed => status_str.green().to_string(),
    };
    let priority = match summary.priority {
        1 => format!("[P{}]", summary.priority).red().to_string(),
        2 => format!("[P{}]", summary.priority).yellow().to_string(),
        p => format!("[P{p}]"),
    };
    format!("{id} {priority}{colored_status} {}", summary.title)
}
