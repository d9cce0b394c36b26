//! Topic rule table: topic name to lowercase trigger keywords.
//!
//! Rules are read from a small line-oriented file:
//!
//! ```text
//! # topic = ["keyword", ...]
//! imaging = ["mri", "pet scan"]
//! ai_ml = ["neural network", "deep learning"]
//! ```
//!
//! File order is preserved and becomes the categorizer's output order.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::instrument;

use crate::config::strip_inline_comment;

/// One topic and its trigger keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRule {
    /// Topic label persisted as a category name.
    pub topic: String,
    /// Lowercase, de-duplicated trigger keywords in declaration order.
    pub keywords: Vec<String>,
}

/// Ordered, immutable set of topic rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<TopicRule>,
}

impl RuleTable {
    /// Builds a table from `(topic, keywords)` pairs, keeping their order.
    ///
    /// Keywords are trimmed and lowercased; blanks and repeats are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when a topic name is blank or appears twice.
    pub fn from_pairs<T, K, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, K)>,
        T: Into<String>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let mut rules: Vec<TopicRule> = Vec::new();
        for (topic, keywords) in pairs {
            let topic = topic.into().trim().to_string();
            if topic.is_empty() {
                bail!("Topic name must not be empty");
            }
            if rules.iter().any(|rule| rule.topic == topic) {
                bail!("Duplicate topic '{topic}'");
            }

            let mut normalized: Vec<String> = Vec::new();
            for keyword in keywords {
                let keyword = keyword.as_ref().trim().to_lowercase();
                if !keyword.is_empty() && !normalized.contains(&keyword) {
                    normalized.push(keyword);
                }
            }
            rules.push(TopicRule {
                topic,
                keywords: normalized,
            });
        }
        Ok(Self { rules })
    }

    /// Loads a rule table from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is malformed.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Cannot read rules file '{}'", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid rules file '{}'", path.display()))
    }

    /// Parses rule-file text.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending line on malformed input.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut pairs: Vec<(String, Vec<String>)> = Vec::new();
        for (line_index, raw_line) in raw.lines().enumerate() {
            let line = strip_inline_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            let Some((raw_topic, raw_list)) = line.split_once('=') else {
                bail!(
                    "Invalid rule syntax on line {}: expected topic = [\"keyword\", ...]",
                    line_index + 1
                );
            };
            let topic = unquote(raw_topic.trim()).to_string();
            let keywords = parse_keyword_list(raw_list.trim())
                .with_context(|| format!("Invalid keyword list for '{topic}' on line {}", line_index + 1))?;
            pairs.push((topic, keywords));
        }
        Self::from_pairs(pairs)
    }

    /// Rules in table order.
    #[must_use]
    pub fn rules(&self) -> &[TopicRule] {
        &self.rules
    }

    /// Topic names in table order.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.topic.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_keyword_list(raw: &str) -> Result<Vec<String>> {
    let Some(inner) = raw.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) else {
        bail!("Expected a bracketed list");
    };

    let mut keywords = Vec::new();
    for item in inner.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if item.len() < 2 || !item.starts_with('"') || !item.ends_with('"') {
            bail!("Expected double-quoted keyword, found `{item}`");
        }
        keywords.push(item[1..item.len() - 1].to_string());
    }
    Ok(keywords)
}
