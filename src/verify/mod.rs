//! Network verification of inferred artifact URLs.
//!
//! A probe is a `HEAD` request. Some hosts refuse `HEAD` outright or answer it
//! with an access-control status, so those responses are retried once with a
//! minimal ranged `GET`. Transient failures (5xx, 429, transport errors) are
//! retried with backoff; once the retries are spent, the URL counts as "not
//! here". A failed probe never aborts sibling probes or the search.

use futures_util::stream::{self, StreamExt};
use reqwest::header::RANGE;
use reqwest::StatusCode;
use tracing::{debug, trace};

use crate::auth::AuthSession;
use crate::resolve::CandidateUrl;
use crate::sources::SourceError;
use crate::utils::{with_retry, HttpClient, RetryConfig};

/// What a single probe learned about a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The file is served
    Found,
    /// The file exists but requires elevated access
    Gated,
    /// Not found, failed, or timed out
    Missing,
}

/// Probes candidate URLs, concurrently per candidate
#[derive(Debug, Clone)]
pub struct UrlVerifier {
    client: HttpClient,
    authenticated: bool,
    probe_concurrency: usize,
    retry: RetryConfig,
}

impl UrlVerifier {
    pub fn new(
        client: HttpClient,
        session: &AuthSession,
        probe_concurrency: usize,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            authenticated: session.is_authenticated(),
            probe_concurrency: probe_concurrency.max(1),
            retry,
        }
    }

    /// Probe a URL and classify the response, retrying transient failures
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        match with_retry(self.retry, || self.probe_once(url)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(url, "Probe failed: {}", e);
                ProbeOutcome::Missing
            }
        }
    }

    /// One HEAD (plus GET fallback) exchange; transient failures are errors
    async fn probe_once(&self, url: &str) -> Result<ProbeOutcome, SourceError> {
        let status = self.client.client().head(url).send().await?.status();

        if status.is_success() {
            return Ok(ProbeOutcome::Found);
        }
        if !rejects_lightweight_probe(status) {
            return classify_miss(url, status);
        }

        trace!(url, %status, "HEAD rejected, retrying with GET");
        let status = self
            .client
            .client()
            .get(url)
            .header(RANGE, "bytes=0-0")
            .send()
            .await?
            .status();

        if status.is_success() {
            Ok(ProbeOutcome::Found)
        } else if is_access_denied(status) {
            Ok(ProbeOutcome::Gated)
        } else {
            classify_miss(url, status)
        }
    }

    /// Whether a plain URL is publicly downloadable
    pub async fn verify_url(&self, url: &str) -> bool {
        self.probe(url).await == ProbeOutcome::Found
    }

    /// Whether a candidate URL can be downloaded in this session.
    ///
    /// Gated answers count as valid only for auth-only formats while logged
    /// in; the host cannot tell us more without a full download.
    pub async fn verify(&self, candidate: &CandidateUrl) -> bool {
        match self.probe(&candidate.url).await {
            ProbeOutcome::Found => true,
            ProbeOutcome::Gated => self.authenticated && candidate.auth_only,
            ProbeOutcome::Missing => false,
        }
    }

    /// Find the earliest URL in `urls` that verifies.
    ///
    /// Probes run concurrently, at most `probe_concurrency` at a time, but the
    /// winner is always the first working URL in the given order. The race
    /// ends as soon as that URL is known; probes still in flight are dropped.
    pub async fn resolve_first_working(&self, urls: &[CandidateUrl]) -> Option<CandidateUrl> {
        if urls.is_empty() {
            return None;
        }

        let mut probes = stream::iter(urls.iter().enumerate())
            .map(|(index, candidate)| async move { (index, self.verify(candidate).await) })
            .buffer_unordered(self.probe_concurrency);

        let mut outcomes: Vec<Option<bool>> = vec![None; urls.len()];
        let mut next = 0;

        while let Some((index, working)) = probes.next().await {
            outcomes[index] = Some(working);

            while next < outcomes.len() {
                match outcomes[next] {
                    Some(true) => return Some(urls[next].clone()),
                    Some(false) => next += 1,
                    None => break,
                }
            }
        }

        None
    }
}

fn rejects_lightweight_probe(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::METHOD_NOT_ALLOWED
    )
}

fn is_access_denied(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Server errors and rate limits are worth another try; anything else is final
fn classify_miss(url: &str, status: StatusCode) -> Result<ProbeOutcome, SourceError> {
    match SourceError::from_status(status, url) {
        err @ (SourceError::Server(_) | SourceError::RateLimit) => Err(err),
        _ => {
            trace!(url, %status, "Probe miss");
            Ok(ProbeOutcome::Missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use std::time::Duration;

    fn quick_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
        }
    }

    fn verifier(authenticated: bool) -> UrlVerifier {
        let client = HttpClient::with_config(&HttpConfig {
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        UrlVerifier {
            client,
            authenticated,
            probe_concurrency: 4,
            retry: quick_retry(),
        }
    }

    fn candidate(url: String, format: &str, auth_only: bool) -> CandidateUrl {
        CandidateUrl {
            url,
            format: format.to_string(),
            auth_only,
        }
    }

    #[tokio::test]
    async fn test_head_success() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/a.pdf").with_status(200).create_async().await;

        assert!(verifier(false).verify_url(&format!("{}/a.pdf", server.url())).await);
    }

    #[tokio::test]
    async fn test_head_rejected_falls_back_to_get() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/a.pdf").with_status(405).create_async().await;
        let get = server
            .mock("GET", "/a.pdf")
            .match_header("range", "bytes=0-0")
            .with_status(206)
            .with_body("%")
            .create_async()
            .await;

        assert!(verifier(false).verify_url(&format!("{}/a.pdf", server.url())).await);
        get.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_does_not_fall_back() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/a.pdf").with_status(404).create_async().await;
        let get = server.mock("GET", "/a.pdf").expect(0).create_async().await;

        let outcome = verifier(false).probe(&format!("{}/a.pdf", server.url())).await;
        assert_eq!(outcome, ProbeOutcome::Missing);
        get.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let unavailable = server
            .mock("HEAD", "/a.pdf")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let served = server
            .mock("HEAD", "/a.pdf")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        assert!(verifier(false).verify_url(&format!("{}/a.pdf", server.url())).await);
        unavailable.assert_async().await;
        served.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried_through_get_fallback() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/a.pdf").with_status(405).create_async().await;
        let limited = server
            .mock("GET", "/a.pdf")
            .with_status(429)
            .expect(1)
            .create_async()
            .await;
        let _m = server.mock("GET", "/a.pdf").with_status(206).with_body("%").create_async().await;

        assert!(verifier(false).verify_url(&format!("{}/a.pdf", server.url())).await);
        limited.assert_async().await;
    }

    #[tokio::test]
    async fn test_persistent_server_error_is_missing() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("HEAD", "/a.pdf")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let outcome = verifier(false).probe(&format!("{}/a.pdf", server.url())).await;
        assert_eq!(outcome, ProbeOutcome::Missing);
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_and_denied_are_final() {
        let mut server = mockito::Server::new_async().await;
        let missing = server
            .mock("HEAD", "/a.pdf")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let _m = server.mock("HEAD", "/b.pdf").with_status(403).expect(1).create_async().await;
        let denied = server
            .mock("GET", "/b.pdf")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let v = verifier(false);
        assert_eq!(v.probe(&format!("{}/a.pdf", server.url())).await, ProbeOutcome::Missing);
        assert_eq!(v.probe(&format!("{}/b.pdf", server.url())).await, ProbeOutcome::Gated);
        missing.assert_async().await;
        denied.assert_async().await;
    }

    #[tokio::test]
    async fn test_gated_formats_need_session_and_auth_only_flag() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/a_lcp.pdf").with_status(403).create_async().await;
        let _m = server.mock("GET", "/a_lcp.pdf").with_status(403).create_async().await;
        let url = format!("{}/a_lcp.pdf", server.url());

        assert_eq!(verifier(false).probe(&url).await, ProbeOutcome::Gated);
        assert!(!verifier(false).verify(&candidate(url.clone(), "lcp pdf", true)).await);
        assert!(verifier(true).verify(&candidate(url.clone(), "lcp pdf", true)).await);
        assert!(!verifier(true).verify(&candidate(url, "pdf", false)).await);
    }

    #[tokio::test]
    async fn test_network_error_is_missing() {
        let outcome = verifier(false).probe("http://127.0.0.1:1/a.pdf").await;
        assert_eq!(outcome, ProbeOutcome::Missing);
    }

    #[tokio::test]
    async fn test_first_working_respects_order() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/a.txt").with_status(404).create_async().await;
        let _m = server.mock("HEAD", "/b.txt").with_status(200).create_async().await;
        let _m = server.mock("HEAD", "/c.pdf").with_status(200).create_async().await;

        let urls = vec![
            candidate(format!("{}/a.txt", server.url()), "txt", false),
            candidate(format!("{}/b.txt", server.url()), "txt", false),
            candidate(format!("{}/c.pdf", server.url()), "pdf", false),
        ];

        let found = verifier(false).resolve_first_working(&urls).await.unwrap();
        assert_eq!(found, urls[1]);
    }

    #[tokio::test]
    async fn test_failed_probe_does_not_abort_siblings() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/b.pdf").with_status(200).create_async().await;

        let urls = vec![
            candidate("http://127.0.0.1:1/a.pdf".to_string(), "pdf", false),
            candidate(format!("{}/b.pdf", server.url()), "pdf", false),
        ];

        let found = verifier(false).resolve_first_working(&urls).await.unwrap();
        assert_eq!(found.url, urls[1].url);
        assert_eq!(found.format, "pdf");
    }

    /// Accepts connections and never answers
    async fn silent_host() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_timed_out_pattern_falls_through_to_next() {
        let silent = silent_host().await;
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/b/b_text.pdf").with_status(200).create_async().await;

        let client = HttpClient::with_config(&HttpConfig {
            request_timeout_secs: 1,
            connect_timeout_secs: 1,
            ..Default::default()
        })
        .unwrap();
        let verifier = UrlVerifier {
            client,
            authenticated: false,
            probe_concurrency: 4,
            retry: quick_retry(),
        };

        let urls = vec![
            candidate(format!("{}/b/b.pdf", silent), "pdf", false),
            candidate(format!("{}/b/b_text.pdf", server.url()), "pdf", false),
        ];

        let found = verifier.resolve_first_working(&urls).await.unwrap();
        assert_eq!(found.url, urls[1].url);
    }

    #[tokio::test]
    async fn test_nothing_working() {
        let mut server = mockito::Server::new_async().await;
        let _m = server.mock("HEAD", "/a.pdf").with_status(404).create_async().await;

        let urls = vec![candidate(format!("{}/a.pdf", server.url()), "pdf", false)];
        assert!(verifier(false).resolve_first_working(&urls).await.is_none());
        assert!(verifier(false).resolve_first_working(&[]).await.is_none());
    }
}
