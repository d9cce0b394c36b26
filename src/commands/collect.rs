//! Collection command handlers: daily run, connectivity test and scheduler.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use harvester_core::pipeline::TEST_WINDOW_DAYS;
use harvester_core::report::{DEFAULT_TREND_MONTHS, write_trend_report};
use harvester_core::scheduler::{run_until_interrupted, start_daily_scheduler};
use harvester_core::{PaperStore, Pipeline, RunSummary};
use tracing::{info, warn};

use crate::app::context::AppContext;

/// One daily run: collect, then refresh the trend report.
///
/// A report failure is logged and does not affect the run.
async fn run_daily_job(pipeline: &Pipeline, store: &PaperStore, output_dir: &Path) -> RunSummary {
    let summary = pipeline.run_daily_update().await;

    let today = Local::now().date_naive();
    match write_trend_report(store, output_dir, DEFAULT_TREND_MONTHS, today).await {
        Ok(path) => info!(path = %path.display(), "Trend report updated"),
        Err(err) => warn!(error = %err, "Failed to generate trend report"),
    }
    summary
}

fn print_run_summary(summary: &RunSummary) {
    if let Some(err) = &summary.search_error {
        println!("Search failed after {} attempt(s): {err}", summary.attempts);
    }
    println!("Fetched: {}", summary.fetched);
    println!("Added: {}", summary.added);
    println!("Already stored: {}", summary.duplicates);
    if summary.failed > 0 {
        println!("Failed to store: {}", summary.failed);
    }
    if let Some(total) = summary.total_papers {
        println!("Total papers in database: {total}");
    }
}

pub async fn run_daily_command(ctx: &AppContext) -> Result<()> {
    let store = ctx.open_store().await?;
    let pipeline = ctx.build_pipeline(store.clone())?;
    let summary = run_daily_job(&pipeline, &store, &ctx.settings.output_dir).await;
    print_run_summary(&summary);
    Ok(())
}

pub async fn run_test_command(ctx: &AppContext) -> Result<()> {
    let store = ctx.open_store().await?;
    let pipeline = ctx.build_pipeline(store)?;
    let check = pipeline.run_collection_test().await;

    if let Some(err) = &check.search_error {
        println!("Search failed after {} attempt(s): {err}", check.attempts);
    }
    println!(
        "Found {} papers in the last {TEST_WINDOW_DAYS} days",
        check.fetched
    );
    for (index, title) in check.sample_titles.iter().enumerate() {
        let short: String = title.chars().take(100).collect();
        println!("  {}. {short}", index + 1);
    }
    println!("Database status:");
    match check.total_papers {
        Some(total) => println!("  - Total papers: {total}"),
        None => println!("  - Total papers: unavailable"),
    }
    println!("  - Categories: {}", check.categories.join(", "));
    Ok(())
}

pub async fn run_scheduler_command(ctx: &AppContext) -> Result<()> {
    let store = ctx.open_store().await?;
    let pipeline = Arc::new(ctx.build_pipeline(store.clone())?);
    let output_dir = ctx.settings.output_dir.clone();
    let time = ctx.settings.scheduler_time;
    let timezone = ctx.settings.scheduler_timezone;

    let scheduler = start_daily_scheduler(time, timezone, move || {
        let pipeline = Arc::clone(&pipeline);
        let store = store.clone();
        let output_dir = output_dir.clone();
        async move {
            run_daily_job(&pipeline, &store, &output_dir).await;
        }
    })
    .await?;

    println!(
        "Scheduler started. Will run daily at {} {timezone}. Press Ctrl-C to stop.",
        time.format("%H:%M")
    );
    run_until_interrupted(scheduler).await
}
