//! Harvester Core Library
//!
//! Collects newly published biomedical literature from PubMed, tags each
//! paper with research topics by keyword rules, and keeps everything in a
//! local SQLite store that also drives a manual translation workflow.
//!
//! # Architecture
//!
//! - [`topics`] - Rule table and keyword categorizer
//! - [`pubmed`] - Query building, E-utilities fetcher and XML record parser
//! - [`db`] - Database connection and migrations
//! - [`store`] - Idempotent paper ingestion, reads and recategorization
//! - [`translation`] - CSV export/import for human translators
//! - [`pipeline`] - Search-then-ingest collection runs
//! - [`scheduler`] - Daily cron trigger
//! - [`report`] - Category trend report and blog post
//! - [`config`] - Settings file loading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod db;
pub mod pipeline;
pub mod pubmed;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod topics;
pub mod translation;

// Re-export commonly used types
pub use config::{LoadedSettings, Settings, load_settings};
pub use db::{Database, DatabaseOptions, DbError};
pub use pipeline::{Pipeline, ConnectivitySummary, RetryPolicy, RunSummary};
pub use pubmed::{
    ArticleRecord, ArticleSource, DateWindow, FetchError, FetcherConfig, PubMedFetcher,
    SearchOutcome, parse_article_set,
};
pub use store::{PaperRepository, PaperStore, StoreError, TranslationStatus};
pub use topics::{Categorizer, RuleTable, TopicRule};
pub use translation::{
    ImportOptions, ImportSummary, TranslationError, TranslationExporter, TranslationImporter,
};
