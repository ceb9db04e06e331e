//! HTTP client utilities.

use reqwest::cookie::Jar;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Shared HTTP client with sensible defaults.
///
/// All requests of one acquisition run go through the same client, so cookies
/// set by a login land in the jar and ride along on every later page fetch and
/// probe.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    jar: Arc<Jar>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a client honoring the configured timeouts and user agent
    pub fn with_config(config: &HttpConfig) -> Result<Self, SourceError> {
        let user_agent = config.user_agent.clone().unwrap_or_else(|| {
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
        });

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .user_agent(user_agent)
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            jar,
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Cookie jar shared by every request made through this client
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.jar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_shares_jar_across_clones() {
        let client = HttpClient::new().unwrap();
        let clone = client.clone();
        assert!(Arc::ptr_eq(client.cookie_jar(), clone.cookie_jar()));
    }
}
