//! Catalog sources.
//!
//! A [`CatalogSource`] is a page source: given a query, a strategy and a page
//! number it returns the parsed [`CandidateRecord`]s of that page. Everything
//! about the wire format (JSON API, scraped HTML) stays inside the source, so
//! the pagination and loop-detection logic in [`crate::search`] never changes
//! when a parser is swapped.
//!
//! Available catalogs:
//!
//! - `archive` - Internet Archive advanced search (JSON)
//! - `gutenberg` - Project Gutenberg search pages (HTML)
//!
//! [`MockCatalog`] serves scripted pages for tests.

mod archive;
mod gutenberg;
pub mod mock;
mod registry;

pub use archive::ArchiveSource;
pub use gutenberg::GutenbergSource;
pub use mock::MockCatalog;
pub use registry::CatalogRegistry;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::auth::AuthEndpoints;
use crate::models::{CandidateRecord, Query};
use crate::resolve::FormatTable;
use crate::search::SearchStrategy;
use crate::utils::HttpClient;

/// One page request issued by the strategy loop
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    /// Client of the current run; carries that run's session cookies
    pub client: &'a HttpClient,
    pub query: &'a Query,
    pub strategy: SearchStrategy,
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
}

/// The CatalogSource trait defines the interface every catalog implements.
///
/// # Implementing a New Catalog
///
/// 1. Implement `id`, `name`, `formats` and `fetch_page`
/// 2. Keep the response parsing in a pure function so it can be tested offline
/// 3. Override `supports` if some strategies have no equivalent on the catalog
/// 4. Override `auth_endpoints` if the catalog has accounts
/// 5. Register it in [`CatalogRegistry::new`]
#[async_trait]
pub trait CatalogSource: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this catalog
    fn id(&self) -> &str;

    /// Human-readable name of this catalog
    fn name(&self) -> &str;

    /// Whether the catalog can order results by this strategy
    fn supports(&self, _strategy: SearchStrategy) -> bool {
        true
    }

    /// Filename conventions of the catalog's artifact host
    fn formats(&self) -> &FormatTable;

    /// Login/logout endpoints, if the catalog has accounts
    fn auth_endpoints(&self) -> Option<AuthEndpoints> {
        None
    }

    /// Fetch and parse one page of results
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Vec<CandidateRecord>, SourceError>;
}

/// Errors that can occur when interacting with a catalog
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or transport error, including timeouts
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (JSON, HTML)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-retryable error status from the catalog
    #[error("API error: {0}")]
    Api(String),

    /// Server-side (5xx) error
    #[error("Server error: {0}")]
    Server(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl SourceError {
    /// Classify an unsuccessful HTTP status
    pub fn from_status(status: StatusCode, context: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => SourceError::NotFound(context.to_string()),
            StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimit,
            s if s.is_server_error() => SourceError::Server(format!("{} returned {}", context, s)),
            s => SourceError::Api(format!("{} returned {}", context, s)),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Network(format!("request timed out: {}", err))
        } else if let Some(status) = err.status() {
            SourceError::from_status(status, "request")
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}
