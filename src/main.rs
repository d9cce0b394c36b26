//! CLI entry point for the harvester tool.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

mod app;
mod cli;
mod commands;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    app::runtime::init_tracing(app::runtime::default_log_level(&args));
    debug!(?args, "CLI arguments parsed");

    match app::runtime::run_harvester(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
