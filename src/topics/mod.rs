//! Topic configuration and keyword categorization.
//!
//! Two configuration files drive this module:
//! - a search keyword list (one phrase per line) used to build the PubMed query
//! - a rule table mapping each topic to trigger keywords, used by the [`Categorizer`]
//!
//! Both are loaded once at startup and handed to their consumers as values.

mod categorizer;
mod rules;

pub use categorizer::Categorizer;
pub use rules::{RuleTable, TopicRule};

use anyhow::{Context, Result};
use std::path::Path;
use tracing::instrument;

/// Loads the search keyword list from a file (one phrase per line).
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
/// Returns error if the file cannot be read.
#[instrument]
pub fn load_search_keywords(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read keywords file '{}'", path.display()))?;

    let keywords = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();

    Ok(keywords)
}
