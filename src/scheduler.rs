//! Daily cron trigger for collection runs.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

/// Six-field cron expression firing once a day at `time`.
#[must_use]
pub fn daily_cron_expression(time: NaiveTime) -> String {
    format!("0 {} {} * * *", time.minute(), time.hour())
}

/// Next firing instant strictly after `now`, in `timezone`.
///
/// A time skipped by a DST jump moves to the following day.
#[must_use]
pub fn next_run_after(time: NaiveTime, timezone: Tz, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
    let local_today = now.with_timezone(&timezone).date_naive();
    (0..=2).find_map(|offset| {
        let day = local_today + Duration::days(offset);
        timezone
            .from_local_datetime(&day.and_time(time))
            .earliest()
            .filter(|candidate| candidate.with_timezone(&Utc) > now)
    })
}

/// Starts a scheduler that runs `job` every day at `time` in `timezone`.
///
/// The returned scheduler must be kept alive; runs are not serialized, so a
/// run that outlasts a day overlaps the next one.
///
/// # Errors
///
/// Returns an error if the scheduler or the job cannot be created.
pub async fn start_daily_scheduler<F, Fut>(
    time: NaiveTime,
    timezone: Tz,
    job: F,
) -> Result<JobScheduler>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let scheduler = JobScheduler::new()
        .await
        .context("Failed to create job scheduler")?;

    let job = Arc::new(job);
    let cron = daily_cron_expression(time);
    let daily = Job::new_async_tz(cron.as_str(), timezone, move |_uuid, _lock| {
        let job = Arc::clone(&job);
        Box::pin(async move {
            job().await;
        })
    })
    .with_context(|| format!("Invalid schedule '{cron}'"))?;

    scheduler
        .add(daily)
        .await
        .context("Failed to register daily job")?;
    scheduler
        .start()
        .await
        .context("Failed to start job scheduler")?;

    info!(
        time = %time.format("%H:%M"),
        timezone = %timezone,
        next = ?next_run_after(time, timezone, Utc::now()),
        "Scheduler started"
    );
    Ok(scheduler)
}

/// Blocks until Ctrl-C, then stops the scheduler.
///
/// # Errors
///
/// Returns an error if the signal handler or the shutdown fails.
pub async fn run_until_interrupted(mut scheduler: JobScheduler) -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down scheduler");
    scheduler
        .shutdown()
        .await
        .context("Failed to stop job scheduler")?;
    Ok(())
}
