//! Mock catalog for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::auth::AuthEndpoints;
use crate::models::CandidateRecord;
use crate::resolve::{FormatSpec, FormatTable};
use crate::search::SearchStrategy;
use crate::sources::{CatalogSource, PageRequest, SourceError};

/// Conventions served by the mock artifact host
const MOCK_FORMATS: &[FormatSpec] = &[
    FormatSpec {
        tag: "txt",
        aliases: &[],
        patterns: &["{id}/{id}_a.txt", "{id}/{id}_b.txt"],
        auth_only: false,
    },
    FormatSpec {
        tag: "pdf",
        aliases: &[],
        patterns: &["{id}/{id}.pdf", "{id}/{id}_alt.pdf"],
        auth_only: false,
    },
    FormatSpec {
        tag: "epub",
        aliases: &[],
        patterns: &["{id}/{id}.epub"],
        auth_only: false,
    },
    FormatSpec {
        tag: "lcp pdf",
        aliases: &[],
        patterns: &["{id}/{id}_lcp.pdf"],
        auth_only: true,
    },
];

/// Scripted outcome of one page fetch
#[derive(Debug, Clone)]
pub enum MockPage {
    Records(Vec<CandidateRecord>),
    NetworkError,
    NotFound,
}

/// What a strategy returns once its scripted pages run out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterEnd {
    Empty,
    RepeatLast,
}

#[derive(Debug, Clone)]
struct Script {
    pages: Vec<MockPage>,
    after_end: AfterEnd,
}

/// A catalog that returns predefined pages per strategy and counts fetches.
#[derive(Debug)]
pub struct MockCatalog {
    scripts: HashMap<SearchStrategy, Script>,
    outage: bool,
    formats: FormatTable,
    auth: Option<AuthEndpoints>,
    fetches: Mutex<HashMap<SearchStrategy, usize>>,
}

impl MockCatalog {
    /// Create a mock whose artifacts live under `artifact_base_url`
    pub fn new(artifact_base_url: &str) -> Self {
        Self {
            scripts: HashMap::new(),
            outage: false,
            formats: FormatTable::new(artifact_base_url, MOCK_FORMATS),
            auth: None,
            fetches: Mutex::new(HashMap::new()),
        }
    }

    /// Serve these pages, then empty pages
    pub fn with_pages(mut self, strategy: SearchStrategy, pages: Vec<MockPage>) -> Self {
        self.scripts.insert(
            strategy,
            Script {
                pages,
                after_end: AfterEnd::Empty,
            },
        );
        self
    }

    /// Serve these pages, then the last one forever (a catalog ignoring paging)
    pub fn with_looping_pages(mut self, strategy: SearchStrategy, pages: Vec<MockPage>) -> Self {
        self.scripts.insert(
            strategy,
            Script {
                pages,
                after_end: AfterEnd::RepeatLast,
            },
        );
        self
    }

    /// Fail every page fetch with a network error
    pub fn with_outage(mut self) -> Self {
        self.outage = true;
        self
    }

    pub fn with_auth(mut self, endpoints: AuthEndpoints) -> Self {
        self.auth = Some(endpoints);
        self
    }

    /// Number of pages requested for a strategy so far
    pub fn fetch_count(&self, strategy: SearchStrategy) -> usize {
        let guard = self.fetches.lock().unwrap();
        guard.get(&strategy).copied().unwrap_or(0)
    }

    /// Number of pages requested across all strategies
    pub fn total_fetches(&self) -> usize {
        let guard = self.fetches.lock().unwrap();
        guard.values().sum()
    }

    fn page_for(&self, strategy: SearchStrategy, page: usize) -> MockPage {
        let Some(script) = self.scripts.get(&strategy) else {
            return MockPage::Records(Vec::new());
        };

        match script.pages.get(page.saturating_sub(1)) {
            Some(page) => page.clone(),
            None => match (script.after_end, script.pages.last()) {
                (AfterEnd::RepeatLast, Some(last)) => last.clone(),
                _ => MockPage::Records(Vec::new()),
            },
        }
    }
}

#[async_trait]
impl CatalogSource for MockCatalog {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Catalog"
    }

    fn formats(&self) -> &FormatTable {
        &self.formats
    }

    fn auth_endpoints(&self) -> Option<AuthEndpoints> {
        self.auth.clone()
    }

    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Vec<CandidateRecord>, SourceError> {
        {
            let mut guard = self.fetches.lock().unwrap();
            *guard.entry(request.strategy).or_insert(0) += 1;
        }

        if self.outage {
            return Err(SourceError::Network("connection refused".to_string()));
        }

        match self.page_for(request.strategy, request.page) {
            MockPage::Records(records) => Ok(records),
            MockPage::NetworkError => Err(SourceError::Network("connection reset".to_string())),
            MockPage::NotFound => Err(SourceError::NotFound("page".to_string())),
        }
    }
}

/// Helper to create a candidate for testing
pub fn make_candidate(identifier: &str, downloads: u64, formats: &[&str]) -> CandidateRecord {
    CandidateRecord::new(identifier, format!("Title of {}", identifier))
        .formats(formats.iter().copied())
        .downloads(downloads)
}
