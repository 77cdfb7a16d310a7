use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tk::cli::Cli;
use tk::paths;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dir = cli.dir.clone().unwrap_or_else(paths::ticket_dir);

    match cli.command.run(&dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
