//! Repository seam for paper persistence.
//!
//! The pipeline depends on this trait rather than on [`PaperStore`] directly,
//! so ingestion can be driven against any implementation.

use async_trait::async_trait;

use super::{Paper, PaperDetails, PaperStore, Result};
use crate::pubmed::ArticleRecord;

/// Data-access contract for ingestion and reads.
#[async_trait]
pub trait PaperRepository: Send + Sync {
    /// Stores a record; `Ok(false)` when its PMID is already present.
    async fn add(&self, record: &ArticleRecord) -> Result<bool>;

    /// Returns every stored paper.
    async fn get_all(&self) -> Result<Vec<Paper>>;

    /// Looks up one paper by PMID.
    async fn get_by_pmid(&self, pmid: &str) -> Result<Option<PaperDetails>>;

    /// Returns every category name.
    async fn get_all_category_names(&self) -> Result<Vec<String>>;

    /// Returns the number of stored papers.
    async fn count_papers(&self) -> Result<i64>;
}

#[async_trait]
impl PaperRepository for PaperStore {
    async fn add(&self, record: &ArticleRecord) -> Result<bool> {
        PaperStore::add(self, record).await
    }

    async fn get_all(&self) -> Result<Vec<Paper>> {
        PaperStore::get_all(self).await
    }

    async fn get_by_pmid(&self, pmid: &str) -> Result<Option<PaperDetails>> {
        PaperStore::get_by_pmid(self, pmid).await
    }

    async fn get_all_category_names(&self) -> Result<Vec<String>> {
        PaperStore::get_all_category_names(self).await
    }

    async fn count_papers(&self) -> Result<i64> {
        PaperStore::count_papers(self).await
    }
}
