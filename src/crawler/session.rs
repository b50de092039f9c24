//! Login and session credential
//!
//! The vendor site authenticates with a classic form POST and hands back a
//! `PHPSESSID` cookie. That cookie is the only credential the rest of the run
//! needs: listing fetches and waitlist joins send it as a `Cookie` header, and
//! the browser-driven reservation plants it in the WebDriver session.

use async_trait::async_trait;
use reqwest::{redirect, Client, Response};
use std::fmt;

use crate::config::Config;
use crate::crawler::url::SiteUrls;
use crate::utils::error::AuthError;
use crate::utils::truncate_text;

/// Name of the session cookie issued by the site
pub const SESSION_COOKIE: &str = "PHPSESSID";

/// Authenticated session, shared read-only for the whole run
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    token: String,
}

impl SessionCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Raw `PHPSESSID` value
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value for a `Cookie` request header
    pub fn cookie_header(&self) -> String {
        format!("{SESSION_COOKIE}={}", self.token)
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Account credentials used to log in
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.account.email, &config.account.password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Produces a session credential from account credentials
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<SessionCredential, AuthError>;
}

/// Form-based login against the vendor site
pub struct HttpAuthenticator {
    client: Client,
    urls: SiteUrls,
}

impl HttpAuthenticator {
    /// Create an authenticator for the configured site
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Http` if the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        let client = Client::builder()
            .user_agent(&config.crawler.user_agent)
            .timeout(config.request_timeout())
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            urls: SiteUrls::from_config(config),
        })
    }

    /// Point the authenticator at another site root (mock servers in tests)
    #[must_use]
    pub fn with_urls(mut self, urls: SiteUrls) -> Self {
        self.urls = urls;
        self
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn login(&self, credentials: &Credentials) -> Result<SessionCredential, AuthError> {
        let site_root = self.urls.site_root();
        let form = [
            ("login", "1"),
            ("email", credentials.email.as_str()),
            ("password", credentials.password.as_str()),
            ("redirect", site_root.as_str()),
            ("loginchek", "businesspages"),
            ("trid", self.urls.trid()),
        ];

        tracing::info!(email = %credentials.email, "Logging in");

        let response = self
            .client
            .post(self.urls.login_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::Timeout
                } else {
                    AuthError::Http(e)
                }
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body: truncate_text(&body, 200),
            });
        }

        let token = session_cookie(&response).ok_or(AuthError::MissingSession)?;
        tracing::debug!(status = status.as_u16(), "Login accepted");

        Ok(SessionCredential::new(token))
    }
}

/// Value of the session cookie set by a response, if any
fn session_cookie(response: &Response) -> Option<String> {
    response
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}
