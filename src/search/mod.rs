//! Multi-strategy paginated catalog search.
//!
//! Catalog search endpoints cap how deep a single ordering can be paged, and
//! some of them silently serve the same page over and over once the real
//! results run out. The client therefore walks several orderings of the same
//! query, one after the other, and stops each one as soon as it is exhausted,
//! repeating itself, or failing. Identifiers are deduplicated across the whole
//! run so every record is handed downstream exactly once.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::models::{CandidateRecord, Query};
use crate::sources::{CatalogSource, PageRequest, SourceError};
use crate::utils::{pause, with_retry, HttpClient, RetryConfig};

/// Result orderings a catalog may be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// The catalog's own ranking
    Relevance,
    /// Most downloaded first
    Popularity,
    /// Most recently added first
    Recency,
    /// Random order
    Random,
    /// Alphabetical by title
    Title,
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SearchStrategy::Relevance => "relevance",
            SearchStrategy::Popularity => "popularity",
            SearchStrategy::Recency => "recency",
            SearchStrategy::Random => "random",
            SearchStrategy::Title => "title",
        };
        f.write_str(name)
    }
}

/// Pagination state of one strategy; never shared between strategies
#[derive(Debug, Default)]
pub struct SearchSessionState {
    /// Last page requested (1-based, 0 before the first fetch)
    pub current_page: usize,
    pub last_page_identifiers: HashSet<String>,
    pub consecutive_duplicate_pages: u32,
    /// Retries spent on transient page failures
    pub retry_count: u32,
}

/// Why a strategy stopped producing pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyEnd {
    LimitReached,
    Exhausted,
    Repeating,
    PageCap,
    Abandoned,
}

/// Everything a [`SearchClient::run`] produced
#[derive(Debug)]
pub struct SearchOutcome<T> {
    /// Every distinct record discovered, in discovery order
    pub discovered: Vec<CandidateRecord>,
    /// What the page handler accepted, in discovery order
    pub accepted: Vec<T>,
    pub pages_fetched: usize,
}

impl<T> SearchOutcome<T> {
    fn new() -> Self {
        Self {
            discovered: Vec::new(),
            accepted: Vec::new(),
            pages_fetched: 0,
        }
    }
}

/// Drives the strategy loop against one catalog
#[derive(Debug, Clone)]
pub struct SearchClient {
    catalog: Arc<dyn CatalogSource>,
    client: HttpClient,
    config: SearchConfig,
    retry: RetryConfig,
}

impl SearchClient {
    /// `client` is the run's HTTP client; every page fetch goes through it
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        client: HttpClient,
        config: SearchConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            catalog,
            client,
            config,
            retry,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogSource> {
        &self.catalog
    }

    /// Collect up to `query.limit()` distinct candidates.
    ///
    /// Catalog failures never surface here: a total outage yields an empty list.
    pub async fn search(&self, query: &Query) -> Vec<CandidateRecord> {
        let outcome = self.run(query, |page| std::future::ready(page)).await;
        let mut found = outcome.accepted;
        found.truncate(query.limit());
        found
    }

    /// Run the strategy loop, handing every page of new records to `on_page`.
    ///
    /// Only what `on_page` returns counts against the query limit, so callers
    /// that filter candidates (e.g. by verifying a download) keep paging until
    /// enough of them survive. `accepted` may overshoot the limit by at most
    /// one page.
    pub async fn run<T, F, Fut>(&self, query: &Query, mut on_page: F) -> SearchOutcome<T>
    where
        F: FnMut(Vec<CandidateRecord>) -> Fut,
        Fut: Future<Output = Vec<T>>,
    {
        let mut seen_identifiers = HashSet::new();
        let mut outcome = SearchOutcome::new();

        for &strategy in &self.config.strategies {
            if outcome.accepted.len() >= query.limit() {
                break;
            }
            if !self.catalog.supports(strategy) {
                debug!(catalog = self.catalog.id(), %strategy, "Strategy not supported, skipping");
                continue;
            }

            let before = outcome.accepted.len();
            let end = self
                .run_strategy(query, strategy, &mut seen_identifiers, &mut outcome, &mut on_page)
                .await;

            info!(
                catalog = self.catalog.id(),
                %strategy,
                ?end,
                accepted = outcome.accepted.len() - before,
                "Strategy finished"
            );
        }

        info!(
            catalog = self.catalog.id(),
            discovered = outcome.discovered.len(),
            accepted = outcome.accepted.len(),
            pages = outcome.pages_fetched,
            "Search finished"
        );

        outcome
    }

    async fn run_strategy<T, F, Fut>(
        &self,
        query: &Query,
        strategy: SearchStrategy,
        seen_identifiers: &mut HashSet<String>,
        outcome: &mut SearchOutcome<T>,
        on_page: &mut F,
    ) -> StrategyEnd
    where
        F: FnMut(Vec<CandidateRecord>) -> Fut,
        Fut: Future<Output = Vec<T>>,
    {
        let mut state = SearchSessionState::default();
        let threshold = self.config.duplicate_page_threshold.max(1);
        let (delay_min, delay_max) = self.config.page_delay();

        loop {
            if outcome.accepted.len() >= query.limit() {
                return StrategyEnd::LimitReached;
            }
            if state.current_page >= self.config.max_pages_per_strategy {
                return StrategyEnd::PageCap;
            }
            if state.current_page > 0 {
                pause(delay_min, delay_max).await;
            }
            state.current_page += 1;

            let records = match self.fetch_page(query, strategy, &mut state).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(
                        catalog = self.catalog.id(),
                        %strategy,
                        page = state.current_page,
                        retries = state.retry_count,
                        "Abandoning strategy: {}",
                        e
                    );
                    return StrategyEnd::Abandoned;
                }
            };
            outcome.pages_fetched += 1;

            if records.is_empty() {
                return StrategyEnd::Exhausted;
            }

            let page_identifiers: HashSet<String> =
                records.iter().map(|r| r.identifier.clone()).collect();
            if page_identifiers.is_subset(&state.last_page_identifiers) {
                state.consecutive_duplicate_pages += 1;
                debug!(
                    %strategy,
                    page = state.current_page,
                    repeats = state.consecutive_duplicate_pages,
                    "Catalog repeated a page"
                );
                if state.consecutive_duplicate_pages >= threshold {
                    return StrategyEnd::Repeating;
                }
            } else {
                state.consecutive_duplicate_pages = 0;
            }
            state.last_page_identifiers = page_identifiers;

            let fresh: Vec<CandidateRecord> = records
                .into_iter()
                .filter(|r| seen_identifiers.insert(r.identifier.clone()))
                .collect();

            debug!(%strategy, page = state.current_page, new = fresh.len(), "Page fetched");

            if fresh.is_empty() {
                if state.current_page == 1 {
                    return StrategyEnd::Exhausted;
                }
                continue;
            }

            outcome.discovered.extend(fresh.iter().cloned());
            let accepted = on_page(fresh).await;
            outcome.accepted.extend(accepted);
        }
    }

    async fn fetch_page(
        &self,
        query: &Query,
        strategy: SearchStrategy,
        state: &mut SearchSessionState,
    ) -> Result<Vec<CandidateRecord>, SourceError> {
        let request = PageRequest {
            client: &self.client,
            query,
            strategy,
            page: state.current_page,
            page_size: self.config.page_size,
        };

        let attempts = AtomicU32::new(0);
        let result = with_retry(self.retry, || {
            attempts.fetch_add(1, Ordering::Relaxed);
            self.catalog.fetch_page(request)
        })
        .await;

        state.retry_count += attempts.load(Ordering::Relaxed).saturating_sub(1);
        result
    }
}
