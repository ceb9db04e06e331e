//! Configuration management.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Values are layered: defaults, then an optional TOML
//! file, then `BOOK_ACQUIRE__<SECTION>__<KEY>` environment variables.

mod file_config;

pub use file_config::ConfigFileError;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::search::SearchStrategy;
use crate::utils::RetryConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub formats: FormatsConfig,

    #[serde(default)]
    pub verify: VerifyConfig,

    #[serde(default)]
    pub catalogs: CatalogsConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Strategy loop and pagination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Catalog to search ("archive" or "gutenberg")
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Records requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Hard cap on pages fetched by a single strategy
    #[serde(default = "default_max_pages")]
    pub max_pages_per_strategy: usize,

    /// Consecutive repeated pages that end a strategy
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_page_threshold: u32,

    /// Strategies in the order they are tried
    #[serde(default = "default_strategies")]
    pub strategies: Vec<SearchStrategy>,

    /// Lower bound of the randomized delay between page fetches
    #[serde(default = "default_page_delay_min")]
    pub page_delay_min_ms: u64,

    /// Upper bound of the randomized delay between page fetches
    #[serde(default = "default_page_delay_max")]
    pub page_delay_max_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            page_size: default_page_size(),
            max_pages_per_strategy: default_max_pages(),
            duplicate_page_threshold: default_duplicate_threshold(),
            strategies: default_strategies(),
            page_delay_min_ms: default_page_delay_min(),
            page_delay_max_ms: default_page_delay_max(),
        }
    }
}

impl SearchConfig {
    /// Delay bounds for page pacing
    pub fn page_delay(&self) -> (Duration, Duration) {
        let min = Duration::from_millis(self.page_delay_min_ms);
        let max = Duration::from_millis(self.page_delay_max_ms.max(self.page_delay_min_ms));
        (min, max)
    }
}

fn default_catalog() -> String {
    "archive".to_string()
}

fn default_page_size() -> usize {
    50
}

fn default_max_pages() -> usize {
    20
}

fn default_duplicate_threshold() -> u32 {
    2
}

fn default_strategies() -> Vec<SearchStrategy> {
    vec![
        SearchStrategy::Relevance,
        SearchStrategy::Popularity,
        SearchStrategy::Recency,
        SearchStrategy::Random,
        SearchStrategy::Title,
    ]
}

fn default_page_delay_min() -> u64 {
    250
}

fn default_page_delay_max() -> u64 {
    1000
}

/// Query normalization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Language used when a request names none
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Upper bound applied to requested limits
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_language() -> String {
    "spa".to_string()
}

fn default_max_limit() -> usize {
    100
}

/// Format preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatsConfig {
    /// Format tags, most preferred first
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
        }
    }
}

fn default_priority() -> Vec<String> {
    ["txt", "pdf", "epub", "djvu", "lcp pdf", "lcp epub"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Probe fan-out limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Concurrent probes for one candidate's URL variants
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,

    /// Candidates on one page resolved at the same time
    #[serde(default = "default_candidate_concurrency")]
    pub candidate_concurrency: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            probe_concurrency: default_probe_concurrency(),
            candidate_concurrency: default_candidate_concurrency(),
        }
    }
}

fn default_probe_concurrency() -> usize {
    4
}

fn default_candidate_concurrency() -> usize {
    4
}

/// Catalog endpoints, overridable for mirrors and tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogsConfig {
    #[serde(default = "default_archive_url")]
    pub archive_base_url: String,

    #[serde(default = "default_gutenberg_url")]
    pub gutenberg_base_url: String,
}

impl Default for CatalogsConfig {
    fn default() -> Self {
        Self {
            archive_base_url: default_archive_url(),
            gutenberg_base_url: default_gutenberg_url(),
        }
    }
}

fn default_archive_url() -> String {
    "https://archive.org".to_string()
}

fn default_gutenberg_url() -> String {
    "https://www.gutenberg.org".to_string()
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Timeout for a single request (page fetch, probe, login)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// Retry ceiling and backoff for page fetches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetrySettings {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    500
}

fn default_max_delay() -> u64 {
    8000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Catalog account used for gated formats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// "json" for structured output, anything else for the human format
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("BOOK_ACQUIRE").separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Get the default configuration with environment overrides applied
pub fn get_config() -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix("BOOK_ACQUIRE").separator("__"))
        .build()?;

    settings.try_deserialize()
}

/// Look for a config file in the working directory, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("book-acquire.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("book-acquire").join("config.toml"))
        .filter(|path| path.is_file())
}
