//! Book records as they move through the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// A catalog entry that has not yet been confirmed to have a working download URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Catalog-unique identifier; the only deduplication key
    pub identifier: String,

    pub title: String,

    pub author: Option<String>,

    /// Formats the catalog says (or we infer) this book is available in
    pub declared_formats: BTreeSet<String>,

    /// Popularity signal used for ranking
    pub downloads: u64,

    pub year: Option<i32>,

    pub language: Option<String>,
}

impl CandidateRecord {
    /// Create a record with the required fields
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            author: None,
            declared_formats: BTreeSet::new(),
            downloads: 0,
            year: None,
            language: None,
        }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        let author = author.into();
        if !author.trim().is_empty() {
            self.author = Some(author);
        }
        self
    }

    pub fn formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_formats
            .extend(formats.into_iter().map(Into::into).filter(|f| !f.is_empty()));
        self
    }

    pub fn downloads(mut self, downloads: u64) -> Self {
        self.downloads = downloads;
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Whether the record looks worth probing at all.
    ///
    /// Identifiers that advertise a lock or restriction never yield a public
    /// file, and a record with no formats has nothing to resolve.
    pub fn is_downloadable(&self) -> bool {
        static LOCK_PATTERN: OnceLock<Regex> = OnceLock::new();
        let lock = LOCK_PATTERN.get_or_init(|| {
            Regex::new(r"(?i)lock|restricted|copyright|protected").expect("valid lock pattern")
        });

        !lock.is_match(&self.identifier) && !self.declared_formats.is_empty()
    }
}

/// A candidate whose download URL was verified over the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    pub record: CandidateRecord,
    pub chosen_format: String,
    pub verified_url: String,
}

impl ResolvedArtifact {
    pub fn identifier(&self) -> &str {
        &self.record.identifier
    }

    pub fn downloads(&self) -> u64 {
        self.record.downloads
    }
}

/// Caller-facing result row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub identifier: String,
    pub title: String,
    pub author: Option<String>,
    pub downloads: u64,
    pub year: Option<i32>,
    pub chosen_format: String,
    pub verified_url: String,
}

impl From<ResolvedArtifact> for BookRecord {
    fn from(artifact: ResolvedArtifact) -> Self {
        let ResolvedArtifact {
            record,
            chosen_format,
            verified_url,
        } = artifact;

        Self {
            identifier: record.identifier,
            title: record.title,
            author: record.author,
            downloads: record.downloads,
            year: record.year,
            chosen_format,
            verified_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_identifiers_are_not_downloadable() {
        let open = CandidateRecord::new("donquijote00cerv", "Don Quijote").formats(["pdf"]);
        assert!(open.is_downloadable());

        let locked = CandidateRecord::new("donquijote_RESTRICTED", "Don Quijote").formats(["pdf"]);
        assert!(!locked.is_downloadable());
    }

    #[test]
    fn test_record_without_formats_is_not_downloadable() {
        let record = CandidateRecord::new("emma1815", "Emma");
        assert!(!record.is_downloadable());
    }

    #[test]
    fn test_blank_author_is_dropped() {
        let record = CandidateRecord::new("emma1815", "Emma").author("  ");
        assert_eq!(record.author, None);
    }

    #[test]
    fn test_book_record_from_artifact() {
        let artifact = ResolvedArtifact {
            record: CandidateRecord::new("emma1815", "Emma")
                .author("Jane Austen")
                .downloads(42)
                .year(1815),
            chosen_format: "txt".to_string(),
            verified_url: "https://example.org/emma.txt".to_string(),
        };

        let book = BookRecord::from(artifact);
        assert_eq!(book.identifier, "emma1815");
        assert_eq!(book.author.as_deref(), Some("Jane Austen"));
        assert_eq!(book.downloads, 42);
        assert_eq!(book.year, Some(1815));
        assert_eq!(book.chosen_format, "txt");
    }
}
