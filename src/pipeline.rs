//! Collection runs: search, then ingest each record.
//!
//! A run never aborts on a single record. Duplicates are logged and counted,
//! persistence failures are logged and counted, and the loop moves on.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::pubmed::{ArticleSource, DateWindow, SearchOutcome};
use crate::store::PaperRepository;

/// Days searched by the daily run.
pub const DAILY_WINDOW_DAYS: u32 = 1;

/// Days searched by the connectivity test.
pub const TEST_WINDOW_DAYS: u32 = 7;

/// Sample titles logged by the connectivity test.
const TEST_SAMPLE_TITLES: usize = 3;

/// Retry policy for failed searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Counters from one collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Search attempts made.
    pub attempts: u32,
    /// Final search error, when every attempt failed.
    pub search_error: Option<String>,
    pub fetched: usize,
    pub added: usize,
    pub duplicates: usize,
    /// Records the store rejected.
    pub failed: usize,
    /// Store size after the run, when it could be read.
    pub total_papers: Option<i64>,
}

/// Result of the connectivity test; nothing is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivitySummary {
    pub attempts: u32,
    pub search_error: Option<String>,
    pub fetched: usize,
    pub sample_titles: Vec<String>,
    pub total_papers: Option<i64>,
    pub categories: Vec<String>,
}

/// Wires a record source to a repository.
#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn ArticleSource>,
    repository: Arc<dyn PaperRepository>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new(
        source: Arc<dyn ArticleSource>,
        repository: Arc<dyn PaperRepository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            repository,
            retry,
        }
    }

    /// Collects papers created in the last day.
    pub async fn run_daily_update(&self) -> RunSummary {
        info!("Starting daily paper collection");
        self.run_collection(DateWindow::DaysBack(DAILY_WINDOW_DAYS))
            .await
    }

    /// Searches `window` and stores every new record.
    #[instrument(skip(self))]
    pub async fn run_collection(&self, window: DateWindow) -> RunSummary {
        let (outcome, attempts) = self.search_with_retry(window).await;
        let mut summary = RunSummary {
            attempts,
            ..RunSummary::default()
        };

        let records = match outcome {
            SearchOutcome::Found(records) => records,
            SearchOutcome::Empty => {
                info!("No papers matched the search window");
                Vec::new()
            }
            SearchOutcome::Failed(err) => {
                error!(attempts, error = %err, "Search failed; nothing collected");
                summary.search_error = Some(err.to_string());
                Vec::new()
            }
        };
        summary.fetched = records.len();
        info!(found = records.len(), "Fetched papers");

        for record in &records {
            match self.repository.add(record).await {
                Ok(true) => summary.added += 1,
                Ok(false) => {
                    summary.duplicates += 1;
                    info!(pmid = %record.pmid, "Paper already stored; skipped");
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(pmid = %record.pmid, error = %err, "Failed to add paper");
                }
            }
        }

        summary.total_papers = self.total_papers().await;
        info!(
            added = summary.added,
            duplicates = summary.duplicates,
            failed = summary.failed,
            total = ?summary.total_papers,
            "Collection run complete"
        );
        summary
    }

    /// Searches the last week without storing anything and reports store status.
    pub async fn run_collection_test(&self) -> ConnectivitySummary {
        info!("Starting collection test");
        let (outcome, attempts) = self
            .search_with_retry(DateWindow::DaysBack(TEST_WINDOW_DAYS))
            .await;

        let mut summary = ConnectivitySummary {
            attempts,
            ..ConnectivitySummary::default()
        };
        if let SearchOutcome::Failed(err) = &outcome {
            summary.search_error = Some(err.to_string());
        }
        let records = outcome.into_records();
        summary.fetched = records.len();
        info!(found = records.len(), days = TEST_WINDOW_DAYS, "Collection test search complete");

        summary.sample_titles = records
            .iter()
            .take(TEST_SAMPLE_TITLES)
            .map(|record| record.title.clone())
            .collect();
        for (index, title) in summary.sample_titles.iter().enumerate() {
            info!(sample = index + 1, title = %title, "Sample paper");
        }

        summary.total_papers = self.total_papers().await;
        match self.repository.get_all_category_names().await {
            Ok(categories) => summary.categories = categories,
            Err(err) => warn!(error = %err, "Could not read categories"),
        }
        summary
    }

    async fn search_with_retry(&self, window: DateWindow) -> (SearchOutcome, u32) {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = self.source.search(window).await;
            let retryable = matches!(&outcome, SearchOutcome::Failed(err) if err.is_transient());
            if !retryable || attempts > self.retry.retries {
                return (outcome, attempts);
            }
            warn!(
                attempt = attempts,
                max_attempts = self.retry.retries + 1,
                delay_secs = self.retry.delay.as_secs(),
                "Search failed; retrying"
            );
            tokio::time::sleep(self.retry.delay).await;
        }
    }

    async fn total_papers(&self) -> Option<i64> {
        match self.repository.count_papers().await {
            Ok(total) => Some(total),
            Err(err) => {
                warn!(error = %err, "Could not count stored papers");
                None
            }
        }
    }
}
