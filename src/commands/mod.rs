//! CLI command handlers.

mod collect;
mod maintenance;
mod translation;

pub use collect::{run_daily_command, run_scheduler_command, run_test_command};
pub use maintenance::{run_papers_command, run_recategorize_command, run_report_command};
pub use translation::{run_export_command, run_import_command, run_import_list_command};
