//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use harvester_core::TranslationStatus;
use harvester_core::config::DEFAULT_SETTINGS_PATH;
use harvester_core::report::DEFAULT_TREND_MONTHS;
use harvester_core::translation::DEFAULT_EXPORT_LIMIT;

/// Collect, categorize and translate new PubMed literature.
///
/// Harvester searches PubMed for papers matching a keyword list, tags each
/// paper with research topics, and stores everything in a local database.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about, arg_required_else_help = true)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (missing file means defaults)
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_PATH)]
    pub config: PathBuf,

    /// Database path, overriding `db_path` from the settings file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect papers created in the last day
    Daily,
    /// Search the last week without storing anything and show database status
    Test,
    /// Run the daily collection every day at the configured time
    Scheduler,
    /// Export papers to a CSV batch for translation
    Export(ExportArgs),
    /// Import a translated CSV batch
    Import(ImportArgs),
    /// List CSV files waiting to be imported
    ImportList(ImportListArgs),
    /// Recompute the categories of every stored paper
    Recategorize(RecategorizeArgs),
    /// Write the category trend report
    Report(ReportArgs),
    /// Show the most recently stored papers
    Papers(PapersArgs),
}

/// Translation status as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    #[value(name = "in_progress")]
    InProgress,
    Completed,
    Reviewed,
}

impl From<StatusArg> for TranslationStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => Self::Pending,
            StatusArg::InProgress => Self::InProgress,
            StatusArg::Completed => Self::Completed,
            StatusArg::Reviewed => Self::Reviewed,
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct ExportArgs {
    /// Maximum papers in the batch (1-10000)
    #[arg(short, long, default_value_t = DEFAULT_EXPORT_LIMIT, value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub limit: u32,

    /// Only export papers with this translation status
    #[arg(short, long, value_enum, default_value_t = StatusArg::Pending)]
    pub status: StatusArg,

    /// Directory for the batch file (defaults to `translations_dir`)
    #[arg(long)]
    pub export_dir: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct ImportArgs {
    /// Translated CSV file
    pub file: PathBuf,

    /// Validate and count without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Leave the file in place after importing
    #[arg(long)]
    pub no_archive: bool,
}

#[derive(ClapArgs, Debug)]
pub struct ImportListArgs {
    /// Directory to scan (defaults to `translations_dir`)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct RecategorizeArgs {
    /// Papers committed per transaction (1-10000)
    #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub batch_size: u32,
}

#[derive(ClapArgs, Debug)]
pub struct ReportArgs {
    /// Months of history to analyze (1-120)
    #[arg(short, long, default_value_t = DEFAULT_TREND_MONTHS, value_parser = clap::value_parser!(u32).range(1..=120))]
    pub months: u32,

    /// Also write a blog post with front matter
    #[arg(long)]
    pub blog: bool,
}

#[derive(ClapArgs, Debug)]
pub struct PapersArgs {
    /// Number of papers to show (1-1000)
    #[arg(short, long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub limit: u32,
}
