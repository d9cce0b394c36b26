//! Shared run context: effective settings and the components built from them.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use harvester_core::topics::load_search_keywords;
use harvester_core::{
    Categorizer, Database, PaperStore, Pipeline, PubMedFetcher, RetryPolicy, Settings,
    load_settings,
};
use tracing::{debug, info, warn};

use crate::cli::Args;

/// Effective configuration for one process.
#[derive(Debug, Clone)]
pub(crate) struct AppContext {
    pub(crate) settings: Settings,
    pub(crate) config_path: PathBuf,
    pub(crate) loaded_from_file: bool,
}

impl AppContext {
    /// Loads the settings file named by `--config` and applies CLI overrides.
    pub(crate) fn from_args(args: &Args) -> Result<Self> {
        let loaded = load_settings(&args.config)?;
        let mut settings = loaded.settings;
        if let Some(db) = &args.db {
            settings.db_path.clone_from(db);
        }

        if loaded.loaded_from_file {
            debug!(path = %loaded.path.display(), "Loaded settings file");
        } else {
            info!(path = %loaded.path.display(), "Settings file not found; using defaults");
        }

        Ok(Self {
            settings,
            config_path: loaded.path,
            loaded_from_file: loaded.loaded_from_file,
        })
    }

    /// Opens the database (running migrations) and wraps it in a store.
    pub(crate) async fn open_store(&self) -> Result<PaperStore> {
        let db_path = &self.settings.db_path;
        let db = Database::new_with_options(db_path, self.settings.database_options())
            .await
            .with_context(|| format!("Failed to open database '{}'", db_path.display()))?;
        let categorizer = Categorizer::from_rules_file(&self.settings.rules_file);
        Ok(PaperStore::new(db, Arc::new(categorizer)))
    }

    /// Builds the fetcher-to-store pipeline.
    pub(crate) fn build_pipeline(&self, store: PaperStore) -> Result<Pipeline> {
        let keywords = load_search_keywords(&self.settings.keywords_file)?;
        if keywords.is_empty() {
            warn!(
                path = %self.settings.keywords_file.display(),
                "Keyword list is empty; searches will fail"
            );
        }
        let fetcher = PubMedFetcher::new(keywords, &self.settings.fetcher_config())
            .context("Failed to create PubMed fetcher")?;
        let retry = RetryPolicy {
            retries: self.settings.retry_attempts,
            delay: self.settings.retry_delay(),
        };
        Ok(Pipeline::new(Arc::new(fetcher), Arc::new(store), retry))
    }
}
