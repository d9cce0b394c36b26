//! Two-step E-utilities fetcher: esearch for ids, then one efetch for records.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::FetchError;
use super::http_client::build_eutils_client;
use super::parser::{ArticleRecord, parse_article_set};
use super::query::{DateWindow, build_search_term};

/// Production E-utilities endpoint.
pub const DEFAULT_EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Default cap on ids returned by one esearch call.
pub const DEFAULT_MAX_RESULTS: u32 = 100;

/// Result of one search invocation.
///
/// `Empty` and `Failed` are kept apart so callers can tell a quiet day from
/// an outage.
#[derive(Debug)]
pub enum SearchOutcome {
    /// Records fetched and parsed.
    Found(Vec<ArticleRecord>),
    /// The search matched nothing; no fetch call was made.
    Empty,
    /// A step failed; the error was already logged.
    Failed(FetchError),
}

impl SearchOutcome {
    /// Collapses the outcome to a plain list; failures become empty.
    #[must_use]
    pub fn into_records(self) -> Vec<ArticleRecord> {
        match self {
            Self::Found(records) => records,
            Self::Empty | Self::Failed(_) => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Short label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::Empty => "empty",
            Self::Failed(_) => "failed",
        }
    }
}

/// Anything that can produce article records for a date window.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Searches the window and returns the fetched records.
    async fn search(&self, window: DateWindow) -> SearchOutcome;
}

/// Fetcher settings.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// E-utilities base URL, without the endpoint name.
    pub base_url: String,
    /// `retmax` for esearch.
    pub max_results: u32,
    /// HTTP calls allowed per calendar day.
    pub max_requests_per_day: u32,
    /// Whole-request timeout.
    pub request_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EUTILS_BASE_URL.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            max_requests_per_day: 1000,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchData,
}

#[derive(Debug, Deserialize)]
struct ESearchData {
    #[serde(default, rename = "ERROR")]
    error: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
}

/// Per-day request counter.
#[derive(Debug)]
struct RequestBudget {
    cap: u32,
    used: Mutex<(NaiveDate, u32)>,
}

impl RequestBudget {
    fn new(cap: u32) -> Self {
        Self {
            cap,
            used: Mutex::new((NaiveDate::MIN, 0)),
        }
    }

    fn try_acquire(&self, today: NaiveDate) -> Result<(), FetchError> {
        let mut guard = self
            .used
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.0 != today {
            *guard = (today, 0);
        }
        if guard.1 >= self.cap {
            return Err(FetchError::DailyCapExceeded { cap: self.cap });
        }
        guard.1 += 1;
        Ok(())
    }

    fn used(&self) -> u32 {
        self.used
            .lock()
            .map_or(0, |guard| guard.1)
    }
}

/// PubMed fetcher bound to a keyword list.
#[derive(Debug)]
pub struct PubMedFetcher {
    client: Client,
    base_url: String,
    keywords: Vec<String>,
    max_results: u32,
    budget: RequestBudget,
}

impl PubMedFetcher {
    /// Creates a fetcher for `keywords` using `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] when the HTTP client cannot be built.
    pub fn new(keywords: Vec<String>, config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = build_eutils_client(config.request_timeout)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            keywords,
            max_results: config.max_results,
            budget: RequestBudget::new(config.max_requests_per_day),
        })
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Requests consumed today.
    #[must_use]
    pub fn requests_used_today(&self) -> u32 {
        self.budget.used()
    }

    /// Searches `window` relative to the given `today`.
    #[instrument(skip(self), fields(keywords = self.keywords.len()))]
    pub async fn search_on(&self, window: DateWindow, today: NaiveDate) -> SearchOutcome {
        match self.run_search(window, today).await {
            Ok(None) => SearchOutcome::Empty,
            Ok(Some(records)) => SearchOutcome::Found(records),
            Err(err) => {
                warn!(error = %err, "PubMed search failed");
                SearchOutcome::Failed(err)
            }
        }
    }

    async fn run_search(
        &self,
        window: DateWindow,
        today: NaiveDate,
    ) -> Result<Option<Vec<ArticleRecord>>, FetchError> {
        let (start, end) = window.resolve(today);
        let term = build_search_term(&self.keywords, start, end).ok_or(FetchError::EmptyQuery)?;
        debug!(term = %term, "Built search term");

        let ids = self.search_ids(&term, today).await?;
        info!(ids = ids.len(), %start, %end, "esearch complete");
        if ids.is_empty() {
            return Ok(None);
        }

        let records = self.fetch_records(&ids, today).await?;
        if records.len() < ids.len() {
            warn!(
                requested = ids.len(),
                parsed = records.len(),
                "Some fetched articles were not parsed"
            );
        }
        Ok(Some(records))
    }

    async fn search_ids(&self, term: &str, today: NaiveDate) -> Result<Vec<String>, FetchError> {
        let retmax = self.max_results.to_string();
        let url = self.endpoint(
            "esearch.fcgi",
            &[
                ("db", "pubmed"),
                ("term", term),
                ("retmode", "json"),
                ("retmax", &retmax),
            ],
        )?;
        let body = self.get_text("esearch", url, today).await?;

        let parsed: ESearchResponse =
            serde_json::from_str(&body).map_err(|err| FetchError::Decode(err.to_string()))?;
        if let Some(message) = parsed.esearchresult.error {
            return Err(FetchError::Api(message));
        }

        Ok(parsed
            .esearchresult
            .idlist
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect())
    }

    async fn fetch_records(
        &self,
        ids: &[String],
        today: NaiveDate,
    ) -> Result<Vec<ArticleRecord>, FetchError> {
        let joined = ids.join(",");
        let url = self.endpoint(
            "efetch.fcgi",
            &[("db", "pubmed"), ("id", &joined), ("retmode", "xml")],
        )?;
        let body = self.get_text("efetch", url, today).await?;
        Ok(parse_article_set(&body)?)
    }

    fn endpoint(&self, name: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
        Url::parse_with_params(&format!("{}/{name}", self.base_url), params)
            .map_err(|_| FetchError::InvalidBaseUrl(self.base_url.clone()))
    }

    async fn get_text(
        &self,
        step: &'static str,
        url: Url,
        today: NaiveDate,
    ) -> Result<String, FetchError> {
        self.budget.try_acquire(today)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport { step, source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                step,
                status: status.as_u16(),
            });
        }
        response
            .text()
            .await
            .map_err(|source| FetchError::Transport { step, source })
    }
}

#[async_trait]
impl ArticleSource for PubMedFetcher {
    async fn search(&self, window: DateWindow) -> SearchOutcome {
        self.search_on(window, Local::now().date_naive()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_request_budget_enforces_cap_and_resets_daily() {
        let budget = RequestBudget::new(2);
        let day = date(2024, 5, 1);
        assert!(budget.try_acquire(day).is_ok());
        assert!(budget.try_acquire(day).is_ok());
        assert!(matches!(
            budget.try_acquire(day),
            Err(FetchError::DailyCapExceeded { cap: 2 })
        ));
        assert!(budget.try_acquire(date(2024, 5, 2)).is_ok());
        assert_eq!(budget.used(), 1);
    }

    #[test]
    fn test_search_outcome_into_records_collapses_failures() {
        assert!(SearchOutcome::Empty.into_records().is_empty());
        assert!(
            SearchOutcome::Failed(FetchError::EmptyQuery)
                .into_records()
                .is_empty()
        );
        let found = SearchOutcome::Found(vec![ArticleRecord::default()]);
        assert_eq!(found.label(), "found");
        assert_eq!(found.into_records().len(), 1);
    }

    #[tokio::test]
    async fn test_search_without_keywords_fails_without_network() {
        let fetcher = PubMedFetcher::new(Vec::new(), &FetcherConfig::default()).unwrap();
        let outcome = fetcher.search_on(DateWindow::DaysBack(1), date(2024, 1, 2)).await;
        assert!(matches!(outcome, SearchOutcome::Failed(FetchError::EmptyQuery)));
        assert_eq!(fetcher.requests_used_today(), 0);
    }

    #[test]
    fn test_endpoint_joins_base_url_and_encodes_term() {
        let config = FetcherConfig {
            base_url: "http://localhost:9/eutils/".to_string(),
            ..FetcherConfig::default()
        };
        let fetcher = PubMedFetcher::new(vec!["x".to_string()], &config).unwrap();
        let url = fetcher
            .endpoint("esearch.fcgi", &[("term", "\"a b\" AND c")])
            .unwrap();
        assert_eq!(url.path(), "/eutils/esearch.fcgi");
        assert_eq!(
            url.query_pairs().next().unwrap().1,
            "\"a b\" AND c"
        );
    }
}
