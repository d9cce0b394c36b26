//! Settings file loading.
//!
//! `settings.toml` holds flat `key = value` lines: quoted strings, integers
//! and `#` comments. Every key is optional; missing keys keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::db::{DEFAULT_BUSY_TIMEOUT_MS, DatabaseOptions};
use crate::pubmed::{DEFAULT_EUTILS_BASE_URL, DEFAULT_MAX_RESULTS, FetcherConfig};

/// Default settings file location, relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.toml";

/// Runtime settings with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base_url: String,
    pub max_requests_per_day: u32,
    /// Extra search attempts after a failed one.
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub max_results: u32,
    pub request_timeout_secs: u64,
    /// Local time of the daily run.
    pub scheduler_time: NaiveTime,
    pub scheduler_timezone: Tz,
    pub keywords_file: PathBuf,
    pub rules_file: PathBuf,
    pub db_path: PathBuf,
    pub output_dir: PathBuf,
    pub translations_dir: PathBuf,
    pub db_busy_timeout_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_EUTILS_BASE_URL.to_string(),
            max_requests_per_day: 1000,
            retry_attempts: 3,
            retry_delay_secs: 5,
            max_results: DEFAULT_MAX_RESULTS,
            request_timeout_secs: 30,
            scheduler_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            scheduler_timezone: chrono_tz::Asia::Seoul,
            keywords_file: PathBuf::from("config/keywords.txt"),
            rules_file: PathBuf::from("config/category_rules.toml"),
            db_path: PathBuf::from("data/papers.db"),
            output_dir: PathBuf::from("output"),
            translations_dir: PathBuf::from("data/translations"),
            db_busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl Settings {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range key.
    pub fn validate(&self) -> Result<()> {
        check_range("max_requests_per_day", u64::from(self.max_requests_per_day), 1, 100_000)?;
        check_range("retry_attempts", u64::from(self.retry_attempts), 0, 10)?;
        check_range("retry_delay_secs", self.retry_delay_secs, 0, 3600)?;
        check_range("max_results", u64::from(self.max_results), 1, 10_000)?;
        check_range("request_timeout_secs", self.request_timeout_secs, 1, 3600)?;
        check_range("db_busy_timeout_ms", u64::from(self.db_busy_timeout_ms), 0, 120_000)?;

        let url = url::Url::parse(&self.api_base_url).with_context(|| {
            format!("Invalid config value for `api_base_url`: '{}'", self.api_base_url)
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "Invalid config value for `api_base_url`: '{}'. Expected an http(s) URL",
                self.api_base_url
            );
        }
        Ok(())
    }

    /// Fetcher settings derived from this configuration.
    #[must_use]
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            base_url: self.api_base_url.clone(),
            max_results: self.max_results,
            max_requests_per_day: self.max_requests_per_day,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    #[must_use]
    pub fn database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            busy_timeout_ms: self.db_busy_timeout_ms,
            ..DatabaseOptions::default()
        }
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Loaded settings metadata.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub path: PathBuf,
    pub settings: Settings,
    /// Whether a file existed at `path`.
    pub loaded_from_file: bool,
}

/// Loads settings from `path`, or defaults when the file is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings(path: &Path) -> Result<LoadedSettings> {
    if !path.exists() {
        return Ok(LoadedSettings {
            path: path.to_path_buf(),
            settings: Settings::default(),
            loaded_from_file: false,
        });
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    let settings = parse_settings_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
    Ok(LoadedSettings {
        path: path.to_path_buf(),
        settings,
        loaded_from_file: true,
    })
}

fn parse_settings_str(raw: &str) -> Result<Settings> {
    let mut cfg = Settings::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };
        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "api_base_url" => {
                cfg.api_base_url = parse_string_literal(value).with_context(invalid)?;
            }
            "max_requests_per_day" => {
                cfg.max_requests_per_day = parse_integer_u32(value).with_context(invalid)?;
            }
            "retry_attempts" => {
                cfg.retry_attempts = parse_integer_u32(value).with_context(invalid)?;
            }
            "retry_delay_secs" => {
                cfg.retry_delay_secs = parse_integer_u64(value).with_context(invalid)?;
            }
            "max_results" => {
                cfg.max_results = parse_integer_u32(value).with_context(invalid)?;
            }
            "request_timeout_secs" => {
                cfg.request_timeout_secs = parse_integer_u64(value).with_context(invalid)?;
            }
            "scheduler_time" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.scheduler_time = NaiveTime::parse_from_str(&parsed, "%H:%M")
                    .with_context(|| {
                        format!("Invalid `scheduler_time` value '{parsed}' on line {line_no}: expected HH:MM")
                    })?;
            }
            "scheduler_timezone" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.scheduler_timezone = parsed.parse::<Tz>().map_err(|_| {
                    anyhow::anyhow!(
                        "Invalid `scheduler_timezone` value '{parsed}' on line {line_no}: expected an IANA timezone name"
                    )
                })?;
            }
            "keywords_file" => {
                cfg.keywords_file = parse_path(value).with_context(invalid)?;
            }
            "rules_file" => {
                cfg.rules_file = parse_path(value).with_context(invalid)?;
            }
            "db_path" => {
                cfg.db_path = parse_path(value).with_context(invalid)?;
            }
            "output_dir" => {
                cfg.output_dir = parse_path(value).with_context(invalid)?;
            }
            "translations_dir" => {
                cfg.translations_dir = parse_path(value).with_context(invalid)?;
            }
            "db_busy_timeout_ms" => {
                cfg.db_busy_timeout_ms = parse_integer_u32(value).with_context(invalid)?;
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Cuts a trailing `#` comment, ignoring `#` inside double quotes.
pub(crate) fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_path(raw_value: &str) -> Result<PathBuf> {
    let value = parse_string_literal(raw_value)?;
    if value.trim().is_empty() {
        bail!("Expected a non-empty path");
    }
    Ok(PathBuf::from(value))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_integer_u32(raw_value: &str) -> Result<u32> {
    let value = parse_integer_u64(raw_value)?;
    u32::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u32"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings_partial_fields_keep_defaults() {
        let cfg = parse_settings_str(
            r#"
max_results = 250
scheduler_time = "06:30" # early
scheduler_timezone = "Europe/Berlin"
"#,
        )
        .unwrap();
        assert_eq!(cfg.max_results, 250);
        assert_eq!(cfg.scheduler_time, NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(cfg.scheduler_timezone, chrono_tz::Europe::Berlin);
        assert_eq!(cfg.retry_attempts, 3);
        assert_eq!(cfg.api_base_url, DEFAULT_EUTILS_BASE_URL);
    }

    #[test]
    fn test_defaults() {
        let cfg = Settings::default();
        assert_eq!(cfg.max_requests_per_day, 1000);
        assert_eq!(cfg.retry_delay_secs, 5);
        assert_eq!(cfg.request_timeout_secs, 30);
        assert_eq!(cfg.scheduler_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(cfg.scheduler_timezone, chrono_tz::Asia::Seoul);
        assert_eq!(cfg.db_path, PathBuf::from("data/papers.db"));
        cfg.validate().unwrap();
    }

    #[test]
    fn test_parse_settings_rejects_unknown_keys() {
        let err = parse_settings_str("\nunknown_key = 1").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_settings_rejects_bad_time_and_timezone() {
        let err = parse_settings_str(r#"scheduler_time = "25:00""#).unwrap_err();
        assert!(err.to_string().contains("scheduler_time"));

        let err = parse_settings_str(r#"scheduler_timezone = "Mars/Olympus""#).unwrap_err();
        assert!(err.to_string().contains("scheduler_timezone"));
    }

    #[test]
    fn test_parse_settings_rejects_out_of_range_values() {
        let err = parse_settings_str("max_requests_per_day = 0").unwrap_err();
        assert!(err.to_string().contains("max_requests_per_day"));

        let err = parse_settings_str("retry_attempts = 11").unwrap_err();
        assert!(err.to_string().contains("retry_attempts"));

        let err = parse_settings_str("request_timeout_secs = -1").unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_parse_settings_rejects_unquoted_strings_and_bad_urls() {
        let err = parse_settings_str("db_path = data/x.db").unwrap_err();
        assert!(err.to_string().contains("db_path"));

        let err = parse_settings_str(r#"api_base_url = "ftp://example.org""#).unwrap_err();
        assert!(err.to_string().contains("api_base_url"));
    }

    #[test]
    fn test_strip_inline_comment_respects_quotes() {
        assert_eq!(strip_inline_comment(r#"a = "x#y" # c"#), r#"a = "x#y" "#);
    }

    #[test]
    fn test_load_settings_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_settings(&dir.path().join("settings.toml")).unwrap();
        assert!(!loaded.loaded_from_file);
        assert_eq!(loaded.settings, Settings::default());
    }

    #[test]
    fn test_load_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "db_path = \"custom.db\"\ndb_busy_timeout_ms = 100\n").unwrap();

        let loaded = load_settings(&path).unwrap();
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.settings.db_path, PathBuf::from("custom.db"));
        assert_eq!(loaded.settings.database_options().busy_timeout_ms, 100);
        assert_eq!(
            loaded.settings.fetcher_config().request_timeout,
            Duration::from_secs(30)
        );
    }
}
