//! PubMed E-utilities access: query construction, fetching and XML parsing.
//!
//! The [`PubMedFetcher`] performs the two-step protocol (esearch for ids,
//! then a single efetch for the records) and reports an explicit
//! [`SearchOutcome`]. Parsing lives in [`parse_article_set`] so it can be
//! exercised without a network.

mod client;
mod error;
mod http_client;
mod parser;
mod query;

pub use client::{
    ArticleSource, DEFAULT_EUTILS_BASE_URL, DEFAULT_MAX_RESULTS, FetcherConfig, PubMedFetcher,
    SearchOutcome,
};
pub use error::{FetchError, ParseError};
pub use http_client::eutils_user_agent;
pub use parser::{ArticleRecord, JournalInfo, parse_article_set};
pub use query::{DateWindow, build_search_term};
