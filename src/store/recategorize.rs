//! Offline maintenance: recompute every paper's categories with current rules.

use sqlx::{Acquire, SqliteConnection};
use tracing::{info, instrument, warn};

use super::{PaperStore, Result, attach_category};
use crate::topics::Categorizer;

/// Papers committed per transaction when no size is given.
pub const DEFAULT_RECATEGORIZE_BATCH_SIZE: usize = 10;

/// Counters from one recategorization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecategorizeReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Transactions committed.
    pub batches: usize,
}

impl PaperStore {
    /// Replaces the category links of every paper using this store's categorizer.
    ///
    /// Work is committed every `batch_size` papers. Each paper runs in its own
    /// savepoint, so a failing paper is rolled back alone, logged and counted
    /// while the run continues.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] when the paper list cannot be read
    /// or a batch cannot be committed; batches committed earlier are kept.
    #[instrument(skip(self))]
    pub async fn recategorize_all(&self, batch_size: usize) -> Result<RecategorizeReport> {
        let batch_size = batch_size.max(1);
        let papers: Vec<(i64, String, Option<String>)> =
            sqlx::query_as("SELECT id, title, abstract FROM papers ORDER BY id")
                .fetch_all(self.db.pool())
                .await?;

        let mut report = RecategorizeReport::default();
        for chunk in papers.chunks(batch_size) {
            let mut tx = self.db.pool().begin().await?;

            for (paper_id, title, abstract_text) in chunk {
                report.processed += 1;
                let mut savepoint = Acquire::begin(&mut tx).await?;
                let outcome = replace_categories(
                    &mut savepoint,
                    &self.categorizer,
                    *paper_id,
                    title,
                    abstract_text.as_deref().unwrap_or_default(),
                )
                .await;

                match outcome {
                    Ok(_) => {
                        savepoint.commit().await?;
                        report.succeeded += 1;
                    }
                    Err(err) => {
                        savepoint.rollback().await?;
                        report.failed += 1;
                        warn!(paper_id, error = %err, "Recategorization failed for paper");
                    }
                }
            }

            tx.commit().await?;
            report.batches += 1;
            info!(
                processed = report.processed,
                total = papers.len(),
                "Recategorization batch committed"
            );
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            "Recategorization complete"
        );
        Ok(report)
    }
}

async fn replace_categories(
    conn: &mut SqliteConnection,
    categorizer: &Categorizer,
    paper_id: i64,
    title: &str,
    abstract_text: &str,
) -> Result<usize> {
    sqlx::query("DELETE FROM paper_categories WHERE paper_id = ?")
        .bind(paper_id)
        .execute(&mut *conn)
        .await?;

    let topics = categorizer.categorize(title, abstract_text);
    for topic in &topics {
        attach_category(conn, paper_id, topic).await?;
    }
    Ok(topics.len())
}
