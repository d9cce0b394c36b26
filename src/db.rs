//! Database connection and schema management.
//!
//! This module provides SQLite connectivity for the literature store:
//! - Connection pool management
//! - WAL mode and busy timeout applied to every pooled connection
//! - Versioned migrations embedded in the binary and applied at startup
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("papers.db")).await?;
//! // Use db for queries...
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Default maximum number of connections in the pool.
/// Kept low for SQLite since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// SQLite busy timeout in milliseconds.
/// Connections will wait this long before returning `SQLITE_BUSY`.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5000;

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The parent directory of the database file could not be created.
    #[error("failed to prepare database directory '{path}': {source}")]
    Directory {
        /// Directory that could not be created.
        path: String,
        /// Underlying IO failure.
        source: std::io::Error,
    },
}

/// Tunables for opening a file-backed database.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseOptions {
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Busy timeout applied to each connection.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Database connection wrapper with connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `db_path` with default options.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        Self::new_with_options(db_path, DatabaseOptions::default()).await
    }

    /// Opens the database at `db_path`.
    ///
    /// This will:
    /// 1. Create the parent directory and database file if they don't exist
    /// 2. Enable WAL mode and the busy timeout on every connection
    /// 3. Run any pending migrations, in version order, each exactly once
    ///
    /// # Errors
    ///
    /// Returns `DbError::Directory` when the parent directory cannot be created,
    /// `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(db_path, options), fields(path = %db_path.display()))]
    pub async fn new_with_options(db_path: &Path, options: DatabaseOptions) -> Result<Self, DbError> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| DbError::Directory {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let connect_options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(u64::from(options.busy_timeout_ms)));

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections.max(1))
            .connect_with(connect_options)
            .await?;

        run_migrations(&pool).await?;
        debug!("database ready");

        Ok(Self { pool })
    }

    /// Creates an in-memory database for testing.
    ///
    /// A single connection keeps the in-memory schema alive for the pool's lifetime.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;

        run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0.eq_ignore_ascii_case("wal"))
    }

    /// Returns the applied migration versions in ascending order.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    pub async fn applied_migrations(&self) -> Result<Vec<i64>, DbError> {
        let versions: Vec<(i64,)> =
            sqlx::query_as("SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version")
                .fetch_all(&self.pool)
                .await?;
        Ok(versions.into_iter().map(|(version,)| version).collect())
    }

    /// Gracefully closes all connections in the pool.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Columns of the translation workflow with their definitions.
const TRANSLATION_COLUMNS: [(&str, &str); 4] = [
    ("abstract_korean", "TEXT"),
    (
        "translation_status",
        "TEXT NOT NULL DEFAULT 'pending' \
         CHECK (translation_status IN ('pending', 'in_progress', 'completed', 'reviewed'))",
    ),
    ("translation_date", "TEXT"),
    ("translator_notes", "TEXT"),
];

/// Brings a pre-existing schema up to the migrations' precondition, then
/// applies pending migrations in version order.
async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    add_missing_translation_columns(pool).await?;
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Adds whichever translation columns an existing `papers` table lacks.
///
/// A database without a `papers` table is left alone; the core migration
/// creates the table with every column.
async fn add_missing_translation_columns(pool: &SqlitePool) -> Result<Vec<&'static str>, DbError> {
    let existing: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info('papers')")
        .fetch_all(pool)
        .await?;
    if existing.is_empty() {
        return Ok(Vec::new());
    }

    let mut added = Vec::new();
    for (name, definition) in TRANSLATION_COLUMNS {
        if existing.iter().any(|(column,)| column == name) {
            continue;
        }
        let statement = format!("ALTER TABLE papers ADD COLUMN {name} {definition}");
        sqlx::query(&statement).execute(pool).await?;
        added.push(name);
    }
    if !added.is_empty() {
        info!(columns = ?added, "Added translation columns to existing papers table");
    }
    Ok(added)
}
