//! Error types for PubMed search and parsing.

use thiserror::Error;

/// A batch document could not be read at all.
///
/// Problems confined to a single article never produce this error; that
/// article is skipped and the rest of the batch is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The document is not well-formed XML.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// The document parsed but has no `PubmedArticleSet` root.
    #[error("document has no PubmedArticleSet root element")]
    MissingRoot,
}

/// Failure modes of one search invocation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No search keywords were configured.
    #[error("no search keywords configured\n  Suggestion: Add one phrase per line to the keywords file")]
    EmptyQuery,

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Network or transport failure (DNS, connect, timeout, body read).
    #[error("{step} request failed: {source}")]
    Transport {
        /// `esearch` or `efetch`.
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success HTTP status.
    #[error("{step} returned HTTP {status}")]
    HttpStatus {
        /// `esearch` or `efetch`.
        step: &'static str,
        /// Response status code.
        status: u16,
    },

    /// The search response body was not the expected JSON.
    #[error("esearch response could not be decoded: {0}")]
    Decode(String),

    /// The search endpoint answered but reported an error of its own.
    #[error("E-utilities reported an error: {0}")]
    Api(String),

    /// The fetch response was not a readable article set.
    #[error("efetch response could not be parsed: {0}")]
    Parse(#[from] ParseError),

    /// The configured daily request budget is used up.
    #[error("daily request cap of {cap} reached\n  Suggestion: Wait until tomorrow or raise `max_requests_per_day`")]
    DailyCapExceeded {
        /// Configured requests per day.
        cap: u32,
    },

    /// The configured base URL cannot be joined with an endpoint name.
    #[error("invalid API base URL '{0}'")]
    InvalidBaseUrl(String),
}

impl FetchError {
    /// Returns true when retrying the same call later might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::EmptyQuery
            | Self::ClientBuild(_)
            | Self::Decode(_)
            | Self::Api(_)
            | Self::Parse(_)
            | Self::DailyCapExceeded { .. }
            | Self::InvalidBaseUrl(_) => false,
        }
    }
}
