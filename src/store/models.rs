//! Persisted row types and status enums.

use std::fmt;

use sqlx::FromRow;

use super::StoreError;

/// Manual translation progress of a paper's abstract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationStatus {
    /// Not yet picked up.
    Pending,
    /// Exported to a translator.
    InProgress,
    /// Translation delivered.
    Completed,
    /// Translation checked by a reviewer.
    Reviewed,
}

impl TranslationStatus {
    /// All accepted values, for error messages.
    pub const EXPECTED: &'static str = "pending, in_progress, completed, reviewed";

    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Reviewed => "reviewed",
        }
    }

    /// Whether this status promises a finished Korean abstract.
    #[must_use]
    pub fn requires_translation(&self) -> bool {
        matches!(self, Self::Completed | Self::Reviewed)
    }
}

impl fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TranslationStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "reviewed" => Ok(Self::Reviewed),
            _ => Err(StoreError::InvalidStatus {
                status: s.to_string(),
                expected: Self::EXPECTED,
            }),
        }
    }
}

/// Lifecycle of one CSV translation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Exported,
    InProgress,
    Completed,
    Imported,
}

impl BatchStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exported => "exported",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Imported => "imported",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exported" => Ok(Self::Exported),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "imported" => Ok(Self::Imported),
            _ => Err(StoreError::InvalidStatus {
                status: s.to_string(),
                expected: "exported, in_progress, completed, imported",
            }),
        }
    }
}

/// A stored paper.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Paper {
    /// Internal row id.
    pub id: i64,
    /// PubMed identifier, unique.
    pub pmid: String,
    pub title: String,
    #[sqlx(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub journal_name: Option<String>,
    pub journal_volume: Option<String>,
    pub journal_issue: Option<String>,
    pub publication_year: Option<String>,
    /// Ingestion date, `YYYY-MM-DD`.
    pub created_date: String,
    pub abstract_korean: Option<String>,
    /// Stored as text, parsed via `translation_status()`.
    #[sqlx(rename = "translation_status")]
    pub translation_status_str: String,
    pub translation_date: Option<String>,
    pub translator_notes: Option<String>,
}

impl Paper {
    /// Returns the parsed translation status.
    ///
    /// Falls back to `Pending` if the stored string is invalid.
    #[must_use]
    pub fn translation_status(&self) -> TranslationStatus {
        self.translation_status_str
            .parse()
            .unwrap_or(TranslationStatus::Pending)
    }
}

/// A paper with its ordered authors and category names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperDetails {
    pub paper: Paper,
    /// Author names by position.
    pub authors: Vec<String>,
    /// Category names, alphabetical.
    pub categories: Vec<String>,
}

/// One export/import cycle.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TranslationBatch {
    pub id: i64,
    /// `YYYYMMDD_HHMMSS`, optionally suffixed `_N`.
    pub batch_id: String,
    pub export_date: String,
    pub import_date: Option<String>,
    pub file_path: String,
    pub total_papers: i64,
    pub completed_papers: i64,
    #[sqlx(rename = "status")]
    pub status_str: String,
    pub notes: Option<String>,
}

impl TranslationBatch {
    /// Returns the parsed batch status, falling back to `Exported`.
    #[must_use]
    pub fn status(&self) -> BatchStatus {
        self.status_str.parse().unwrap_or(BatchStatus::Exported)
    }
}
