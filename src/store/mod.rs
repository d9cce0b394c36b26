//! SQLite-backed paper store.
//!
//! The store owns every persisted row: papers, authors, categories, their
//! join tables and translation batches. Ingestion goes through
//! [`PaperStore::add`], which is idempotent per PMID and atomic per paper.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use harvester_core::{Categorizer, Database, PaperStore};
//!
//! let db = Database::new(Path::new("papers.db")).await?;
//! let store = PaperStore::new(db, Arc::new(Categorizer::default()));
//!
//! if store.add(&record).await? {
//!     // newly stored
//! }
//! ```

mod error;
mod models;
mod recategorize;
mod repository;
mod translations;

pub use error::{DbErrorKind, StoreError};
pub use models::{BatchStatus, Paper, PaperDetails, TranslationBatch, TranslationStatus};
pub use recategorize::{DEFAULT_RECATEGORIZE_BATCH_SIZE, RecategorizeReport};
pub use repository::PaperRepository;
pub use translations::{TranslationUpdate, TranslationWriteReport};

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};

use crate::db::Database;
use crate::pubmed::ArticleRecord;
use crate::topics::Categorizer;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

const PAPER_COLUMNS: &str = "id, pmid, title, abstract, journal_name, journal_volume, \
     journal_issue, publication_year, created_date, abstract_korean, translation_status, \
     translation_date, translator_notes";

/// Paper counts for one month and category.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MonthlyCategoryCount {
    /// `YYYY-MM`.
    pub month: String,
    pub category: String,
    pub papers: i64,
}

/// Store for harvested papers.
#[derive(Debug, Clone)]
pub struct PaperStore {
    db: Database,
    categorizer: Arc<Categorizer>,
}

impl PaperStore {
    /// Creates a store over `db` that categorizes new papers with `categorizer`.
    #[must_use]
    pub fn new(db: Database, categorizer: Arc<Categorizer>) -> Self {
        Self { db, categorizer }
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    /// Stores a new paper with its categories and authors.
    ///
    /// Returns `Ok(false)` without touching anything when the PMID is
    /// already stored. Otherwise the paper row, its category links and its
    /// author links are written in one transaction; on any failure nothing
    /// is kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRecord`] for a blank PMID or title, and
    /// [`StoreError::Database`] when any write fails (the insert is rolled back).
    #[instrument(skip(self, record), fields(pmid = %record.pmid))]
    pub async fn add(&self, record: &ArticleRecord) -> Result<bool> {
        let pmid = record.pmid.trim();
        if pmid.is_empty() {
            return Err(invalid(pmid, "PMID is empty"));
        }
        let title = record.title.trim();
        if title.is_empty() {
            return Err(invalid(pmid, "title is empty"));
        }

        let mut tx = self.db.pool().begin().await?;

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM papers WHERE pmid = ?")
            .bind(pmid)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            debug!("Paper already stored");
            return Ok(false);
        }

        let topics = self
            .categorizer
            .categorize(title, &record.abstract_text);

        let inserted = sqlx::query(
            r"INSERT INTO papers
                (pmid, title, abstract, journal_name, journal_volume, journal_issue, publication_year)
              VALUES (?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(pmid) DO NOTHING",
        )
        .bind(pmid)
        .bind(title)
        .bind(non_empty(&record.abstract_text))
        .bind(non_empty(&record.journal.name))
        .bind(non_empty(&record.journal.volume))
        .bind(non_empty(&record.journal.issue))
        .bind(non_empty(&record.journal.year))
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(false);
        }
        let paper_id = inserted.last_insert_rowid();

        for topic in &topics {
            attach_category(&mut tx, paper_id, topic).await?;
        }

        for (index, author) in record.authors.iter().enumerate() {
            let author_id = find_or_insert_name(&mut tx, NamedTable::Authors, author).await?;
            let position = i64::try_from(index + 1).unwrap_or(i64::MAX);
            sqlx::query(
                r"INSERT INTO paper_authors (paper_id, author_id, author_order)
                  VALUES (?, ?, ?)
                  ON CONFLICT(paper_id, author_id) DO NOTHING",
            )
            .bind(paper_id)
            .bind(author_id)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            paper_id,
            categories = topics.len(),
            authors = record.authors.len(),
            "Stored new paper"
        );
        Ok(true)
    }

    /// Finds a category by exact name, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure, including a blank name.
    pub async fn find_by_name_or_insert_category(&self, name: &str) -> Result<i64> {
        let mut conn = self.db.pool().acquire().await?;
        find_or_insert_name(&mut conn, NamedTable::Categories, name).await
    }

    /// Finds an author by exact name, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure, including a blank name.
    pub async fn find_by_name_or_insert_author(&self, name: &str) -> Result<i64> {
        let mut conn = self.db.pool().acquire().await?;
        find_or_insert_name(&mut conn, NamedTable::Authors, name).await
    }

    /// Returns every stored paper (full scan, id order).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<Paper>> {
        let papers = sqlx::query_as::<_, Paper>(&format!(
            "SELECT {PAPER_COLUMNS} FROM papers ORDER BY id"
        ))
        .fetch_all(self.db.pool())
        .await?;
        Ok(papers)
    }

    /// Returns the newest papers first, by ingestion date.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn latest(&self, limit: u32) -> Result<Vec<Paper>> {
        let papers = sqlx::query_as::<_, Paper>(&format!(
            "SELECT {PAPER_COLUMNS} FROM papers ORDER BY created_date DESC, id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;
        Ok(papers)
    }

    /// Looks up a paper by internal id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Paper>> {
        let paper = sqlx::query_as::<_, Paper>(&format!(
            "SELECT {PAPER_COLUMNS} FROM papers WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(paper)
    }

    /// Looks up a paper by PMID together with its authors and categories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a query fails.
    #[instrument(skip(self))]
    pub async fn get_by_pmid(&self, pmid: &str) -> Result<Option<PaperDetails>> {
        let paper = sqlx::query_as::<_, Paper>(&format!(
            "SELECT {PAPER_COLUMNS} FROM papers WHERE pmid = ?"
        ))
        .bind(pmid.trim())
        .fetch_optional(self.db.pool())
        .await?;

        let Some(paper) = paper else {
            return Ok(None);
        };
        let authors = self.authors_for(paper.id).await?;
        let categories = self.categories_for(paper.id).await?;
        Ok(Some(PaperDetails {
            paper,
            authors,
            categories,
        }))
    }

    /// Author names of a paper in byline order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn authors_for(&self, paper_id: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"SELECT a.name FROM paper_authors pa
              JOIN authors a ON a.id = pa.author_id
              WHERE pa.paper_id = ?
              ORDER BY pa.author_order",
        )
        .bind(paper_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Category names of a paper, alphabetical.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn categories_for(&self, paper_id: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r"SELECT c.name FROM paper_categories pc
              JOIN categories c ON c.id = pc.category_id
              WHERE pc.paper_id = ?
              ORDER BY c.name",
        )
        .bind(paper_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Every category name, alphabetical.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn get_all_category_names(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM categories ORDER BY name")
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Number of papers attached to each category, largest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn category_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"SELECT c.name, COUNT(pc.paper_id) AS papers
              FROM categories c
              LEFT JOIN paper_categories pc ON pc.category_id = c.id
              GROUP BY c.id
              ORDER BY papers DESC, c.name",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Total stored papers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn count_papers(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM papers")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Papers per `YYYY-MM` and category, for papers ingested on or after `since`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    pub async fn monthly_category_counts(
        &self,
        since: NaiveDate,
    ) -> Result<Vec<MonthlyCategoryCount>> {
        let rows = sqlx::query_as::<_, MonthlyCategoryCount>(
            r"SELECT strftime('%Y-%m', p.created_date) AS month,
                     c.name AS category,
                     COUNT(*) AS papers
              FROM papers p
              JOIN paper_categories pc ON pc.paper_id = p.id
              JOIN categories c ON c.id = pc.category_id
              WHERE p.created_date >= ?
              GROUP BY month, c.name
              ORDER BY month, c.name",
        )
        .bind(since.format("%Y-%m-%d").to_string())
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}

fn invalid(pmid: &str, reason: &str) -> StoreError {
    StoreError::InvalidRecord {
        pmid: pmid.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[derive(Debug, Clone, Copy)]
enum NamedTable {
    Authors,
    Categories,
}

/// Upserts a name into `authors` or `categories` and returns its id.
///
/// The UNIQUE constraint on `name` makes repeated calls converge on one row.
async fn find_or_insert_name(
    conn: &mut SqliteConnection,
    table: NamedTable,
    name: &str,
) -> Result<i64> {
    let (insert_sql, select_sql) = match table {
        NamedTable::Authors => (
            "INSERT INTO authors (name) VALUES (?) ON CONFLICT(name) DO NOTHING",
            "SELECT id FROM authors WHERE name = ?",
        ),
        NamedTable::Categories => (
            "INSERT INTO categories (name) VALUES (?) ON CONFLICT(name) DO NOTHING",
            "SELECT id FROM categories WHERE name = ?",
        ),
    };

    sqlx::query(insert_sql).bind(name).execute(&mut *conn).await?;
    let (id,): (i64,) = sqlx::query_as(select_sql)
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

async fn attach_category(conn: &mut SqliteConnection, paper_id: i64, topic: &str) -> Result<()> {
    let category_id = find_or_insert_name(conn, NamedTable::Categories, topic).await?;
    sqlx::query(
        r"INSERT INTO paper_categories (paper_id, category_id)
          VALUES (?, ?)
          ON CONFLICT(paper_id, category_id) DO NOTHING",
    )
    .bind(paper_id)
    .bind(category_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pubmed::JournalInfo;
    use crate::topics::RuleTable;

    async fn store() -> PaperStore {
        let db = Database::new_in_memory().await.unwrap();
        let rules = RuleTable::from_pairs([
            ("imaging", vec!["mri", "pet scan"]),
            ("ai_ml", vec!["neural network"]),
        ])
        .unwrap();
        PaperStore::new(db, Arc::new(Categorizer::new(rules)))
    }

    fn record(pmid: &str) -> ArticleRecord {
        ArticleRecord {
            pmid: pmid.to_string(),
            title: "MRI study of memory".to_string(),
            authors: vec!["Min-ji Kim".to_string(), "Jun Lee".to_string()],
            abstract_text: "uses a neural network classifier".to_string(),
            journal: JournalInfo {
                name: "Journal of Memory".to_string(),
                volume: "12".to_string(),
                issue: String::new(),
                year: "2024".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_add_new_paper_stores_relations() {
        let store = store().await;
        assert!(store.add(&record("100")).await.unwrap());

        let details = store.get_by_pmid("100").await.unwrap().unwrap();
        assert_eq!(details.paper.title, "MRI study of memory");
        assert_eq!(details.paper.journal_issue, None);
        assert_eq!(details.paper.publication_year.as_deref(), Some("2024"));
        assert_eq!(details.paper.translation_status(), TranslationStatus::Pending);
        assert_eq!(details.authors, vec!["Min-ji Kim", "Jun Lee"]);
        assert_eq!(details.categories, vec!["ai_ml", "imaging"]);
    }

    #[tokio::test]
    async fn test_add_duplicate_returns_false() {
        let store = store().await;
        assert!(store.add(&record("100")).await.unwrap());

        let mut changed = record("100");
        changed.title = "Different title".to_string();
        assert!(!store.add(&changed).await.unwrap());

        assert_eq!(store.count_papers().await.unwrap(), 1);
        let details = store.get_by_pmid("100").await.unwrap().unwrap();
        assert_eq!(details.paper.title, "MRI study of memory");
    }

    #[tokio::test]
    async fn test_add_reuses_authors_and_categories() {
        let store = store().await;
        store.add(&record("1")).await.unwrap();
        store.add(&record("2")).await.unwrap();

        let (authors,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM authors")
            .fetch_one(store.database().pool())
            .await
            .unwrap();
        assert_eq!(authors, 2);
        assert_eq!(
            store.get_all_category_names().await.unwrap(),
            vec!["ai_ml", "imaging"]
        );
    }

    #[tokio::test]
    async fn test_add_rejects_blank_title() {
        let store = store().await;
        let mut bad = record("3");
        bad.title = "   ".to_string();
        let err = store.add(&bad).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
        assert_eq!(store.count_papers().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_with_blank_author_rolls_back_everything() {
        let store = store().await;
        let mut bad = record("4");
        bad.authors.push(String::new());

        let err = store.add(&bad).await.unwrap_err();
        assert!(err.is_constraint_violation());
        assert!(store.get_by_pmid("4").await.unwrap().is_none());
        assert!(store.get_all_category_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_uncategorized_paper_has_no_categories() {
        let store = store().await;
        let mut plain = record("5");
        plain.title = "Sleep quality".to_string();
        plain.abstract_text = String::new();
        assert!(store.add(&plain).await.unwrap());

        let details = store.get_by_pmid("5").await.unwrap().unwrap();
        assert!(details.categories.is_empty());
        assert_eq!(details.paper.abstract_text, None);
    }

    #[tokio::test]
    async fn test_add_repeated_author_name_keeps_first_position() {
        let store = store().await;
        let mut rec = record("6");
        rec.authors = vec!["A One".to_string(), "B Two".to_string(), "A One".to_string()];
        assert!(store.add(&rec).await.unwrap());
        let details = store.get_by_pmid("6").await.unwrap().unwrap();
        assert_eq!(details.authors, vec!["A One", "B Two"]);
    }

    #[tokio::test]
    async fn test_find_by_name_or_insert_is_idempotent() {
        let store = store().await;
        let first = store.find_by_name_or_insert_category("imaging").await.unwrap();
        let second = store.find_by_name_or_insert_category("imaging").await.unwrap();
        assert_eq!(first, second);

        let author = store.find_by_name_or_insert_author("Jun Lee").await.unwrap();
        assert_eq!(
            store.find_by_name_or_insert_author("Jun Lee").await.unwrap(),
            author
        );
    }

    #[tokio::test]
    async fn test_get_all_and_latest() {
        let store = store().await;
        store.add(&record("7")).await.unwrap();
        store.add(&record("8")).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert_eq!(all.iter().map(|p| p.pmid.as_str()).collect::<Vec<_>>(), vec!["7", "8"]);

        let latest = store.latest(1).await.unwrap();
        assert_eq!(latest[0].pmid, "8");
    }

    #[tokio::test]
    async fn test_monthly_category_counts_groups_by_month() {
        let store = store().await;
        store.add(&record("9")).await.unwrap();
        sqlx::query("UPDATE papers SET created_date = '2024-01-15' WHERE pmid = '9'")
            .execute(store.database().pool())
            .await
            .unwrap();

        let rows = store
            .monthly_category_counts(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.month == "2024-01" && row.papers == 1));

        let none = store
            .monthly_category_counts(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
