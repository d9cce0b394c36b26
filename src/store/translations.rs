//! Persistence for the manual translation workflow.

use tracing::{info, instrument, warn};

use super::{
    BatchStatus, PAPER_COLUMNS, Paper, PaperStore, Result, TranslationBatch, TranslationStatus,
};

/// One row of translator output to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUpdate {
    /// Internal paper id.
    pub paper_id: i64,
    /// Korean abstract; `None` clears it.
    pub abstract_korean: Option<String>,
    pub status: TranslationStatus,
    pub translator_notes: Option<String>,
}

/// Outcome of applying a set of updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationWriteReport {
    /// Rows updated.
    pub updated: usize,
    /// Paper ids that matched no stored paper.
    pub missing: Vec<i64>,
}

impl PaperStore {
    /// Papers in `status` that have an English abstract, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the query fails.
    pub async fn papers_for_translation(
        &self,
        status: TranslationStatus,
        limit: u32,
    ) -> Result<Vec<Paper>> {
        let papers = sqlx::query_as::<_, Paper>(&format!(
            r"SELECT {PAPER_COLUMNS} FROM papers
              WHERE translation_status = ?
                AND abstract IS NOT NULL
                AND trim(abstract) <> ''
              ORDER BY created_date DESC, id DESC
              LIMIT ?"
        ))
        .bind(status.as_str())
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;
        Ok(papers)
    }

    /// Returns which of `ids` exist in the papers table.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if a query fails.
    pub async fn existing_paper_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let mut found = Vec::new();
        let mut conn = self.db.pool().acquire().await?;
        for id in ids {
            let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM papers WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
            if let Some((id,)) = row {
                found.push(id);
            }
        }
        Ok(found)
    }

    /// Applies translator output in a single transaction.
    ///
    /// Each matched paper gets the Korean abstract, status and notes, and a
    /// fresh `translation_date`. Unknown ids are reported, not fatal.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if a write fails; nothing is
    /// applied in that case.
    #[instrument(skip(self, updates), fields(rows = updates.len()))]
    pub async fn apply_translations(
        &self,
        updates: &[TranslationUpdate],
    ) -> Result<TranslationWriteReport> {
        let mut report = TranslationWriteReport::default();
        let mut tx = self.db.pool().begin().await?;

        for update in updates {
            let result = sqlx::query(
                r"UPDATE papers
                  SET abstract_korean = ?,
                      translation_status = ?,
                      translator_notes = ?,
                      translation_date = datetime('now')
                  WHERE id = ?",
            )
            .bind(update.abstract_korean.as_deref())
            .bind(update.status.as_str())
            .bind(update.translator_notes.as_deref())
            .bind(update.paper_id)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                warn!(paper_id = update.paper_id, "No paper with this id; row skipped");
                report.missing.push(update.paper_id);
            } else {
                report.updated += 1;
            }
        }

        tx.commit().await?;
        info!(
            updated = report.updated,
            missing = report.missing.len(),
            "Applied translations"
        );
        Ok(report)
    }

    /// Records a freshly exported batch.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the insert fails, including
    /// a repeated `batch_id`.
    pub async fn record_batch(
        &self,
        batch_id: &str,
        file_path: &str,
        total_papers: usize,
    ) -> Result<i64> {
        let total = i64::try_from(total_papers).unwrap_or(i64::MAX);
        let result = sqlx::query(
            r"INSERT INTO translation_batches (batch_id, file_path, total_papers, status)
              VALUES (?, ?, ?, ?)",
        )
        .bind(batch_id)
        .bind(file_path)
        .bind(total)
        .bind(BatchStatus::Exported.as_str())
        .execute(self.db.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Marks a batch imported with its completed-paper count.
    ///
    /// Returns `false` when no batch carries `batch_id`.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the update fails.
    pub async fn mark_batch_imported(&self, batch_id: &str, completed_papers: usize) -> Result<bool> {
        let completed = i64::try_from(completed_papers).unwrap_or(i64::MAX);
        let result = sqlx::query(
            r"UPDATE translation_batches
              SET import_date = datetime('now'),
                  completed_papers = ?,
                  status = ?
              WHERE batch_id = ?",
        )
        .bind(completed)
        .bind(BatchStatus::Imported.as_str())
        .bind(batch_id)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Looks up a batch by its `batch_id`.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the query fails.
    pub async fn get_batch(&self, batch_id: &str) -> Result<Option<TranslationBatch>> {
        let batch = sqlx::query_as::<_, TranslationBatch>(
            "SELECT * FROM translation_batches WHERE batch_id = ?",
        )
        .bind(batch_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(batch)
    }

    /// All batches, newest export first.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Database`] if the query fails.
    pub async fn list_batches(&self) -> Result<Vec<TranslationBatch>> {
        let batches = sqlx::query_as::<_, TranslationBatch>(
            "SELECT * FROM translation_batches ORDER BY export_date DESC, id DESC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(batches)
    }
}
