//! Catalog account sessions.
//!
//! Gated formats are only served to logged-in users. [`AuthManager::open`]
//! performs a single login exchange; the cookies it earns live in the jar of
//! the run's [`HttpClient`], so every later page fetch and probe of that run is
//! authenticated and nothing carries over to the next run. Any failure
//! degrades to an anonymous session.

use reqwest::cookie::CookieStore;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::sources::SourceError;
use crate::utils::HttpClient;

/// Cookie set by the catalog once a login succeeded
const LOGGED_IN_COOKIE: &str = "logged-in-user";

/// Account credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Where a catalog accepts logins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub login_url: String,
    pub logout_url: Option<String>,
}

/// Credential state for one acquisition run
#[derive(Debug)]
pub struct AuthSession {
    username: Option<String>,
}

impl AuthSession {
    pub fn anonymous() -> Self {
        Self { username: None }
    }

    fn authenticated(username: String) -> Self {
        Self {
            username: Some(username),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        debug!(authenticated = self.is_authenticated(), "Auth session released");
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    status: Option<String>,
}

/// Opens and closes sessions against a catalog's account endpoints
#[derive(Debug, Clone)]
pub struct AuthManager {
    client: HttpClient,
    endpoints: Option<AuthEndpoints>,
}

impl AuthManager {
    pub fn new(client: HttpClient, endpoints: Option<AuthEndpoints>) -> Self {
        Self { client, endpoints }
    }

    /// Log in once; fall back to an anonymous session on any failure
    pub async fn open(&self, credentials: Option<&Credentials>) -> AuthSession {
        let (Some(credentials), Some(endpoints)) = (credentials, self.endpoints.as_ref()) else {
            return AuthSession::anonymous();
        };

        match self.login(credentials, endpoints).await {
            Ok(()) => {
                info!(user = %credentials.username, "Authenticated catalog session opened");
                AuthSession::authenticated(credentials.username.clone())
            }
            Err(e) => {
                warn!(user = %credentials.username, "Login failed, continuing anonymously: {}", e);
                AuthSession::anonymous()
            }
        }
    }

    /// End the session; logout failures are logged and otherwise ignored
    pub async fn close(&self, session: AuthSession) {
        if !session.is_authenticated() {
            return;
        }

        let Some(logout_url) = self.endpoints.as_ref().and_then(|e| e.logout_url.as_deref()) else {
            return;
        };

        match self.client.client().get(logout_url).send().await {
            Ok(response) => debug!(status = %response.status(), "Logged out"),
            Err(e) => warn!("Logout request failed: {}", e),
        }
    }

    async fn login(&self, credentials: &Credentials, endpoints: &AuthEndpoints) -> Result<(), SourceError> {
        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("remember", "true"),
            ("login", "true"),
            ("submit_by_js", "true"),
        ];

        let response = self
            .client
            .client()
            .post(&endpoints.login_url)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::from_status(response.status(), "Login"));
        }

        let body = response.text().await?;
        let status_ok = serde_json::from_str::<LoginResponse>(&body)
            .ok()
            .and_then(|r| r.status)
            .is_some_and(|s| s == "ok");

        if status_ok || self.has_login_cookie(&endpoints.login_url) {
            Ok(())
        } else {
            Err(SourceError::Api("Login rejected".to_string()))
        }
    }

    fn has_login_cookie(&self, login_url: &str) -> bool {
        let Ok(url) = url::Url::parse(login_url) else {
            return false;
        };

        self.client
            .cookie_jar()
            .cookies(&url)
            .and_then(|header| header.to_str().ok().map(|s| s.contains(LOGGED_IN_COOKIE)))
            .unwrap_or(false)
    }
}
