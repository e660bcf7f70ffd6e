// src/models/config.rs

//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP, pacing and retry behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Field normalization settings
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Export settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Run-level network failure detection
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or the defaults when the file does not exist.
    ///
    /// A file that exists but does not parse is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.concurrency_limit == 0 {
            return Err(AppError::validation(
                "crawler.concurrency_limit must be > 0",
            ));
        }
        if self.crawler.max_retries == 0 {
            return Err(AppError::validation("crawler.max_retries must be > 0"));
        }
        if self.crawler.backoff_max_ms < self.crawler.backoff_base_ms {
            return Err(AppError::validation(
                "crawler.backoff_max_ms must be >= crawler.backoff_base_ms",
            ));
        }
        let currency = &self.normalize.fallback_currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(AppError::validation(format!(
                "normalize.fallback_currency must be a 3-letter ISO code, got '{currency}'"
            )));
        }
        if self.output.filename_prefix.trim().is_empty() {
            return Err(AppError::validation("output.filename_prefix is empty"));
        }
        Ok(())
    }
}

/// HTTP client, pacing and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Minimum delay between two requests to the same host
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Upper bound of the random delay added on top of `request_delay_ms`
    #[serde(default = "defaults::request_jitter")]
    pub request_jitter_ms: u64,

    /// Total attempts per URL, first try included
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff step; doubles on every retry
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling, also caps `Retry-After`
    #[serde(default = "defaults::backoff_max")]
    pub backoff_max_ms: u64,

    /// Maximum profiles in flight
    #[serde(default = "defaults::concurrency_limit")]
    pub concurrency_limit: usize,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            request_jitter_ms: defaults::request_jitter(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_max_ms: defaults::backoff_max(),
            concurrency_limit: defaults::concurrency_limit(),
        }
    }
}

/// Normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Currency assigned to amounts the page gives without one
    #[serde(default = "defaults::fallback_currency")]
    pub fallback_currency: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            fallback_currency: defaults::fallback_currency(),
        }
    }
}

/// Export file format for completed records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(AppError::config(format!(
                "unknown output format '{other}' (expected json or csv)"
            ))),
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Directory receiving the record file and the error report
    #[serde(default = "defaults::output_directory")]
    pub directory: String,

    #[serde(default = "defaults::filename_prefix")]
    pub filename_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            directory: defaults::output_directory(),
            filename_prefix: defaults::filename_prefix(),
        }
    }
}

/// Run-level circuit breaker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of leading network failures that abort the run. 0 disables.
    #[serde(default = "defaults::failure_threshold")]
    pub failure_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::failure_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; profile-crawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn request_delay() -> u64 {
        1500
    }
    pub fn request_jitter() -> u64 {
        500
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_base() -> u64 {
        1000
    }
    pub fn backoff_max() -> u64 {
        30_000
    }
    pub fn concurrency_limit() -> usize {
        5
    }

    // Normalize defaults
    pub fn fallback_currency() -> String {
        "USD".into()
    }

    // Output defaults
    pub fn output_directory() -> String {
        "output".into()
    }
    pub fn filename_prefix() -> String {
        "zoominfo_companies".into()
    }

    pub fn failure_threshold() -> usize {
        5
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.crawler.concurrency_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_fallback_currency() {
        let mut config = Config::default();
        config.normalize.fallback_currency = "usd".to_string();
        assert!(config.validate().is_err());
        config.normalize.fallback_currency = "EURO".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            concurrency_limit = 16
            max_retries = 4

            [output]
            format = "csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.concurrency_limit, 16);
        assert_eq!(config.crawler.max_retries, 4);
        assert_eq!(config.crawler.request_delay_ms, 1500);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.normalize.fallback_currency, "USD");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let config = Config::load_or_default("/nonexistent/config.toml").unwrap();
        assert_eq!(config.crawler.max_retries, 3);
    }

    #[test]
    fn load_or_default_rejects_broken_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[crawler\nmax_retries = ").unwrap();
        assert!(matches!(
            Config::load_or_default(&path),
            Err(AppError::Toml(_))
        ));

        fs::write(&path, "[crawler]\nmax_retries = 5\n").unwrap();
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.crawler.max_retries, 5);
    }
}
