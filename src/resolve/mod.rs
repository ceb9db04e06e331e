//! Format/URL resolution.
//!
//! Catalogs rarely hand out direct file links. Instead every catalog has a small
//! set of filename conventions per format, accumulated over the years. A
//! [`FormatTable`] holds those conventions as plain data and expands a
//! candidate's identifier into an ordered list of URLs worth probing.
//!
//! Order matters: the verifier picks the earliest URL that answers, so the
//! order produced here is the selection policy. Formats follow the caller's
//! priority list; within a format, patterns follow the table.

use std::collections::{BTreeSet, HashSet};

/// Filename conventions for one format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    /// Canonical tag used in priority lists, lower case
    pub tag: &'static str,
    /// Declared format names that imply this format, lower case
    pub aliases: &'static [&'static str],
    /// Path templates relative to the table's base URL; `{id}` is the identifier
    pub patterns: &'static [&'static str],
    /// Files are only served to logged-in sessions
    pub auth_only: bool,
}

impl FormatSpec {
    fn matches_declared(&self, declared: &BTreeSet<String>) -> bool {
        declared.iter().any(|d| {
            let d = d.trim();
            d.eq_ignore_ascii_case(self.tag) || self.aliases.iter().any(|a| d.eq_ignore_ascii_case(a))
        })
    }
}

/// One URL to probe, tagged with the format it would deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUrl {
    pub url: String,
    pub format: String,
    pub auth_only: bool,
}

/// Static convention table for one catalog's artifact host
#[derive(Debug, Clone)]
pub struct FormatTable {
    base_url: String,
    specs: &'static [FormatSpec],
    /// Template for formats missing from `specs`; `{ext}` is the format tag
    fallback: Option<&'static str>,
}

impl FormatTable {
    pub fn new(base_url: impl Into<String>, specs: &'static [FormatSpec]) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            specs,
            fallback: None,
        }
    }

    /// Use `template` for priority entries the table does not know
    pub fn with_fallback(mut self, template: &'static str) -> Self {
        self.fallback = Some(template);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Look up the spec for a format tag
    pub fn spec(&self, format: &str) -> Option<&FormatSpec> {
        let format = format.trim();
        self.specs.iter().find(|s| s.tag.eq_ignore_ascii_case(format))
    }

    /// Whether a format is only served to authenticated sessions
    pub fn is_auth_only(&self, format: &str) -> bool {
        self.spec(format).is_some_and(|s| s.auth_only)
    }

    /// Expand a candidate into the ordered URLs worth probing.
    ///
    /// Only formats present in both `priority` and `declared_formats` are
    /// considered. Each URL appears once, at its first position.
    pub fn candidate_urls(
        &self,
        identifier: &str,
        declared_formats: &BTreeSet<String>,
        priority: &[String],
    ) -> Vec<CandidateUrl> {
        let encoded_id = urlencoding::encode(identifier);
        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        for format in priority {
            let (patterns, auth_only): (Vec<String>, bool) = match self.spec(format) {
                Some(spec) if spec.matches_declared(declared_formats) => (
                    spec.patterns.iter().map(|p| p.to_string()).collect(),
                    spec.auth_only,
                ),
                Some(_) => continue,
                None => match self.fallback_pattern(format, declared_formats) {
                    Some(pattern) => (vec![pattern], false),
                    None => continue,
                },
            };

            for pattern in patterns {
                let url = format!(
                    "{}/{}",
                    self.base_url,
                    pattern.replace("{id}", &encoded_id)
                );
                if seen.insert(url.clone()) {
                    urls.push(CandidateUrl {
                        url,
                        format: format.clone(),
                        auth_only,
                    });
                }
            }
        }

        urls
    }

    fn fallback_pattern(&self, format: &str, declared: &BTreeSet<String>) -> Option<String> {
        let template = self.fallback?;
        let ext = format.trim().to_lowercase();
        let plain = !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric());
        let declared_here = declared.iter().any(|d| d.trim().eq_ignore_ascii_case(&ext));

        (plain && declared_here).then(|| template.replace("{ext}", &ext))
    }
}
