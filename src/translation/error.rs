//! Error types for translation export/import.

use std::path::Path;

use thiserror::Error;

use crate::store::StoreError;

/// Errors from the translation CSV workflow.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The file was rejected before any row was applied.
    #[error("invalid translation file: {0}")]
    Validation(String),

    /// Reading or writing a file failed.
    #[error("file operation failed for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TranslationError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
