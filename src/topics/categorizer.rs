//! Keyword categorizer: assigns topic labels by literal substring match.

use std::path::Path;

use tracing::{error, info};

use super::RuleTable;

/// Assigns zero or more topics to a title/abstract pair.
///
/// Matching is a case-insensitive literal substring test over
/// `title + " " + abstract`. Output order follows the rule table.
#[derive(Debug, Clone, Default)]
pub struct Categorizer {
    rules: RuleTable,
}

impl Categorizer {
    #[must_use]
    pub fn new(rules: RuleTable) -> Self {
        Self { rules }
    }

    /// Loads rules from `path`; a load failure yields an empty categorizer.
    ///
    /// The failure is logged here, once. Every later call to
    /// [`Categorizer::categorize`] then returns no topics.
    #[must_use]
    pub fn from_rules_file(path: &Path) -> Self {
        match RuleTable::load(path) {
            Ok(rules) => {
                info!(path = %path.display(), topics = rules.len(), "Loaded category rules");
                Self::new(rules)
            }
            Err(err) => {
                error!(
                    path = %path.display(),
                    error = format!("{err:#}"),
                    "Category rules unavailable; papers will be stored without categories"
                );
                Self::default()
            }
        }
    }

    /// Returns every topic with at least one keyword hit.
    #[must_use]
    pub fn categorize(&self, title: &str, abstract_text: &str) -> Vec<String> {
        let text = format!("{title} {abstract_text}").to_lowercase();

        self.rules
            .rules()
            .iter()
            .filter(|rule| rule.keywords.iter().any(|keyword| text.contains(keyword.as_str())))
            .map(|rule| rule.topic.clone())
            .collect()
    }

    #[must_use]
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
