//! HTTP client construction for E-utilities calls.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

use super::FetchError;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Tool label in the User-Agent; NCBI asks E-utilities clients to identify themselves.
const TOOL_LABEL: &str = "PubMed literature harvester";

/// User-Agent sent with every E-utilities request.
#[must_use]
pub fn eutils_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("harvester/{version} ({TOOL_LABEL})")
}

/// Builds the client used for esearch/efetch.
///
/// `request_timeout` bounds a whole request including the body read.
///
/// # Errors
///
/// Returns [`FetchError::ClientBuild`] when client construction fails.
pub fn build_eutils_client(request_timeout: Duration) -> Result<Client, FetchError> {
    match try_build_client(request_timeout, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic while reading system proxy settings.
            warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
            try_build_client(request_timeout, true).map_err(|failure| match failure {
                BuildClientFailure::Panic => FetchError::ClientBuild(
                    "client construction panicked while reading proxy settings".to_string(),
                ),
                BuildClientFailure::Build(error) => FetchError::ClientBuild(error.to_string()),
            })
        }
        Err(BuildClientFailure::Build(error)) => Err(FetchError::ClientBuild(error.to_string())),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    request_timeout: Duration,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(request_timeout);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(request_timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(request_timeout))
        .timeout(request_timeout)
        .user_agent(eutils_user_agent())
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"])
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"])
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_identifies_tool_and_version() {
        let ua = eutils_user_agent();
        assert!(ua.starts_with("harvester/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
        assert!(ua.ends_with("(PubMed literature harvester)"));
    }

    #[test]
    fn test_build_client_succeeds() {
        assert!(build_eutils_client(Duration::from_secs(5)).is_ok());
    }
}
