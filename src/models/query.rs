//! Query normalization.
//!
//! A [`RawQuery`] is whatever the caller handed us; a [`Query`] is the canonical,
//! immutable form that drives every search strategy.

use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;

/// Errors for queries that can never be satisfied
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The requested result quota was zero or negative
    #[error("limit must be a positive integer, got {0}")]
    NonPositiveLimit(i64),

    /// Neither a title nor an author was given
    #[error("query needs at least a title or an author")]
    Unconstrained,
}

/// Unvalidated search request as received from a caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub limit: i64,
}

impl RawQuery {
    /// Create a title query with the given limit
    pub fn new(title: impl Into<String>, limit: i64) -> Self {
        Self {
            title: Some(title.into()),
            limit,
            ..Default::default()
        }
    }

    /// Set the author constraint
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Set the language code
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Canonical query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    title: Option<String>,
    author: Option<String>,
    language: String,
    limit: usize,
}

impl Query {
    /// Normalize a raw request.
    ///
    /// Text fields are trimmed, whitespace-collapsed and title-cased; blank fields
    /// become `None`. The language falls back to the configured default and the
    /// limit is clamped to `max_limit`.
    pub fn normalize(raw: &RawQuery, config: &QueryConfig) -> Result<Self, QueryError> {
        if raw.limit <= 0 {
            return Err(QueryError::NonPositiveLimit(raw.limit));
        }

        let title = raw.title.as_deref().and_then(title_case);
        let author = raw.author.as_deref().and_then(title_case);
        if title.is_none() && author.is_none() {
            return Err(QueryError::Unconstrained);
        }

        let language = raw
            .language
            .as_deref()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| config.default_language.to_lowercase());

        let max_limit = config.max_limit.max(1);
        let limit = usize::try_from(raw.limit).unwrap_or(max_limit).min(max_limit);

        Ok(Self {
            title,
            author,
            language,
            limit,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

fn title_case(input: &str) -> Option<String> {
    let words: Vec<String> = input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}
