//! Tracing setup and subcommand dispatch.

use anyhow::Result;
use tracing::debug;

use crate::app::context::AppContext;
use crate::cli::{Args, Command};
use crate::commands;

/// Picks the default filter from `-q`/`-v`; `RUST_LOG` still wins.
pub(crate) fn default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

pub(crate) fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// Runs the selected subcommand.
pub(crate) async fn run_harvester(args: &Args) -> Result<()> {
    let ctx = AppContext::from_args(args)?;
    debug!(
        config = %ctx.config_path.display(),
        from_file = ctx.loaded_from_file,
        db = %ctx.settings.db_path.display(),
        "Effective configuration"
    );

    match &args.command {
        Command::Daily => commands::run_daily_command(&ctx).await,
        Command::Test => commands::run_test_command(&ctx).await,
        Command::Scheduler => commands::run_scheduler_command(&ctx).await,
        Command::Export(export_args) => commands::run_export_command(&ctx, export_args).await,
        Command::Import(import_args) => commands::run_import_command(&ctx, import_args).await,
        Command::ImportList(list_args) => commands::run_import_list_command(&ctx, list_args),
        Command::Recategorize(recat_args) => {
            commands::run_recategorize_command(&ctx, recat_args).await
        }
        Command::Report(report_args) => commands::run_report_command(&ctx, report_args).await,
        Command::Papers(papers_args) => commands::run_papers_command(&ctx, papers_args).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn test_default_log_level_from_flags() {
        let args = Args::try_parse_from(["harvester", "daily"]).unwrap();
        assert_eq!(default_log_level(&args), "info");

        let args = Args::try_parse_from(["harvester", "-vv", "daily"]).unwrap();
        assert_eq!(default_log_level(&args), "trace");

        let args = Args::try_parse_from(["harvester", "-q", "-v", "daily"]).unwrap();
        assert_eq!(default_log_level(&args), "error");
    }
}
