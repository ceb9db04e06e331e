//! End-to-end acquisition: normalize, search, resolve, verify, rank.
//!
//! An [`Acquirer`] owns one catalog. Every call to [`Acquirer::acquire`] is an
//! independent run with its own HTTP client and cookie jar, its own auth
//! session and its own deduplication state.

use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{AuthManager, Credentials};
use crate::config::Config;
use crate::models::{BookRecord, CandidateRecord, Query, QueryError, RawQuery, ResolvedArtifact};
use crate::resolve::FormatTable;
use crate::search::SearchClient;
use crate::sources::{CatalogRegistry, CatalogSource, SourceError};
use crate::utils::HttpClient;
use crate::verify::UrlVerifier;

/// Errors surfaced to callers of the pipeline
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// The request can never be satisfied
    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    /// The pipeline could not be assembled
    #[error("Setup failed: {0}")]
    Setup(#[from] SourceError),
}

/// Turns candidates into verified artifacts
#[derive(Debug, Clone, Copy)]
pub struct ArtifactResolver<'a> {
    formats: &'a FormatTable,
    verifier: &'a UrlVerifier,
    priority: &'a [String],
    candidate_concurrency: usize,
}

impl<'a> ArtifactResolver<'a> {
    pub fn new(
        formats: &'a FormatTable,
        verifier: &'a UrlVerifier,
        priority: &'a [String],
        candidate_concurrency: usize,
    ) -> Self {
        Self {
            formats,
            verifier,
            priority,
            candidate_concurrency: candidate_concurrency.max(1),
        }
    }

    /// Find the most preferred working download for one candidate
    pub async fn resolve_candidate(&self, record: CandidateRecord) -> Option<ResolvedArtifact> {
        if !record.is_downloadable() {
            debug!(identifier = %record.identifier, "Skipping locked or formatless record");
            return None;
        }

        let urls = self
            .formats
            .candidate_urls(&record.identifier, &record.declared_formats, self.priority);
        if urls.is_empty() {
            debug!(identifier = %record.identifier, "No preferred format declared");
            return None;
        }

        let found = self.verifier.resolve_first_working(&urls).await?;
        debug!(identifier = %record.identifier, format = %found.format, url = %found.url, "Verified");

        Some(ResolvedArtifact {
            record,
            chosen_format: found.format,
            verified_url: found.url,
        })
    }

    /// Resolve a page of candidates concurrently, keeping discovery order
    pub async fn resolve_page(&self, records: Vec<CandidateRecord>) -> Vec<ResolvedArtifact> {
        stream::iter(records)
            .map(|record| self.resolve_candidate(record))
            .buffered(self.candidate_concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Rank verified artifacts.
///
/// Candidates without an artifact are dropped, identifiers are deduplicated
/// keeping the first discovered, and the rest is sorted by downloads
/// descending. The sort is stable, so ties keep discovery order.
pub fn aggregate(
    candidates: &[CandidateRecord],
    resolved: Vec<ResolvedArtifact>,
    limit: usize,
) -> Vec<ResolvedArtifact> {
    let mut by_identifier: HashMap<String, ResolvedArtifact> = HashMap::with_capacity(resolved.len());
    for artifact in resolved {
        by_identifier
            .entry(artifact.identifier().to_string())
            .or_insert(artifact);
    }

    let mut ranked: Vec<ResolvedArtifact> = candidates
        .iter()
        .filter_map(|candidate| by_identifier.remove(&candidate.identifier))
        .collect();

    ranked.sort_by(|a, b| b.downloads().cmp(&a.downloads()));
    ranked.truncate(limit);
    ranked
}

/// The caller-facing pipeline
#[derive(Debug, Clone)]
pub struct Acquirer {
    config: Config,
    catalog: Arc<dyn CatalogSource>,
}

impl Acquirer {
    pub fn new(config: Config, catalog: Arc<dyn CatalogSource>) -> Self {
        Self { config, catalog }
    }

    /// Pick the configured catalog
    pub fn from_config(config: Config) -> Result<Self, AcquireError> {
        let registry = CatalogRegistry::new(&config.catalogs);
        let catalog = registry.get_required(&config.search.catalog)?;

        Ok(Self::new(config, catalog))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogSource> {
        &self.catalog
    }

    /// Find up to `limit` books with a verified download URL.
    ///
    /// Catalog outages and failed probes only shrink the result. Errors are
    /// limited to a query that can never be satisfied and an HTTP client that
    /// cannot be built.
    pub async fn acquire(
        &self,
        raw: &RawQuery,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<BookRecord>, AcquireError> {
        let query = Query::normalize(raw, &self.config.query)?;
        info!(
            catalog = self.catalog.id(),
            title = ?query.title(),
            author = ?query.author(),
            language = query.language(),
            limit = query.limit(),
            "Acquisition started"
        );

        // Fresh jar per run: session cookies never outlive the run
        let client = HttpClient::with_config(&self.config.http)?;
        let retry = self.config.retry.retry_config();

        let auth = AuthManager::new(client.clone(), self.catalog.auth_endpoints());
        let session = auth.open(credentials).await;

        let verifier = UrlVerifier::new(
            client.clone(),
            &session,
            self.config.verify.probe_concurrency,
            retry,
        );
        let resolver = ArtifactResolver::new(
            self.catalog.formats(),
            &verifier,
            &self.config.formats.priority,
            self.config.verify.candidate_concurrency,
        );
        let search = SearchClient::new(self.catalog.clone(), client, self.config.search.clone(), retry);

        let outcome = search
            .run(&query, move |page| async move { resolver.resolve_page(page).await })
            .await;
        let ranked = aggregate(&outcome.discovered, outcome.accepted, query.limit());

        auth.close(session).await;

        info!(
            catalog = self.catalog.id(),
            candidates = outcome.discovered.len(),
            verified = ranked.len(),
            pages = outcome.pages_fetched,
            "Acquisition finished"
        );

        Ok(ranked.into_iter().map(BookRecord::from).collect())
    }
}
