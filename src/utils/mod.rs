//! Utility modules supporting the acquisition pipeline.
//!
//! - [`HttpClient`]: HTTP client carrying one run's session cookie jar
//! - [`RetryConfig`]: Configuration for retry logic with exponential backoff
//! - [`with_retry`]: Execute an operation with automatic retry on transient errors
//! - [`pause`]: Randomized delay used to pace page fetches
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use book_acquire::sources::SourceError;
//! use book_acquire::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_page() -> Result<String, SourceError> { Ok("page".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let page = with_retry(config, || fetch_page()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod pacing;
mod retry;

pub use http::HttpClient;
pub use pacing::{jittered_delay, pause};
pub use retry::{with_retry, RetryConfig, TransientError};
