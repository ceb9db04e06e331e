//! TOML file support for book-acquire.
//!
//! # Configuration File Format
//!
//! ```toml
//! [search]
//! catalog = "archive"
//! page_size = 50
//! max_pages_per_strategy = 20
//! duplicate_page_threshold = 2
//! strategies = ["relevance", "popularity", "recency", "random", "title"]
//! page_delay_min_ms = 250
//! page_delay_max_ms = 1000
//!
//! [query]
//! default_language = "spa"
//! max_limit = 100
//!
//! [formats]
//! priority = ["txt", "pdf", "epub", "djvu"]
//!
//! [verify]
//! probe_concurrency = 4
//! candidate_concurrency = 4
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 500
//! max_delay_ms = 8000
//!
//! [auth]
//! username = "reader@example.org"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use std::path::Path;

use super::Config;

impl Config {
    /// Read a TOML file without environment overrides
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Write this configuration as TOML. The password is never written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
