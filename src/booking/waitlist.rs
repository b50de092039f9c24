//! Waitlist join over plain HTTP
//!
//! The waitlist button on the listing carries a URL whose `eid` and `bstd` query
//! parameters identify the class occurrence. Joining is a form POST to a fixed
//! route; the status code is the only answer the site gives.

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{redirect, Client};

use crate::config::Config;
use crate::crawler::session::SessionCredential;
use crate::crawler::url::SiteUrls;
use crate::utils::error::AttemptError;
use crate::utils::query_param;

/// Joins the waitlist of a `Waitlistable` slot
#[async_trait]
pub trait WaitlistTransport: Send + Sync {
    /// Submit the join request, returning the HTTP status
    async fn join_waitlist(
        &self,
        session: &SessionCredential,
        waitlist_url: &str,
    ) -> Result<u16, AttemptError>;
}

/// Identifiers of the class occurrence to waitlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitlistTarget {
    pub event_id: String,
    pub start_stamp: String,
}

impl WaitlistTarget {
    /// Read `eid` and `bstd` from the button URL
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidActionUrl` when the URL does not parse or
    /// either parameter is missing
    pub fn from_url(waitlist_url: &str) -> Result<Self, AttemptError> {
        let invalid = |reason: &str| AttemptError::InvalidActionUrl {
            url: waitlist_url.to_string(),
            reason: reason.to_string(),
        };

        let event_id = query_param(waitlist_url, "eid")
            .map_err(|e| invalid(&e.to_string()))?
            .filter(|v| !v.is_empty())
            .ok_or_else(|| invalid("missing eid"))?;
        let start_stamp = query_param(waitlist_url, "bstd")
            .map_err(|e| invalid(&e.to_string()))?
            .filter(|v| !v.is_empty())
            .ok_or_else(|| invalid("missing bstd"))?;

        Ok(Self {
            event_id,
            start_stamp,
        })
    }

    /// Form fields expected by the join route
    pub fn form(&self) -> [(&'static str, &str); 7] {
        [
            ("eid", self.event_id.as_str()),
            ("dirId", ""),
            ("bstd", self.start_stamp.as_str()),
            ("bookingfrom", "widget/directory/"),
            ("joinwailist", "joinwailistYes"),
            ("latecancelwaitlist", "movetowaitlist"),
            ("bid", ""),
        ]
    }
}

/// Waitlist client backed by reqwest
pub struct HttpWaitlistClient {
    client: Client,
    endpoint: String,
}

impl HttpWaitlistClient {
    /// Create a client from the run configuration
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Http` if the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self, AttemptError> {
        Self::with_urls(&SiteUrls::from_config(config), config)
    }

    /// Create a client posting to another site root (mock servers in tests)
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Http` if the HTTP client cannot be created
    pub fn with_urls(urls: &SiteUrls, config: &Config) -> Result<Self, AttemptError> {
        let client = Client::builder()
            .user_agent(&config.crawler.user_agent)
            .timeout(config.request_timeout())
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            endpoint: urls.waitlist_url(),
        })
    }
}

#[async_trait]
impl WaitlistTransport for HttpWaitlistClient {
    async fn join_waitlist(
        &self,
        session: &SessionCredential,
        waitlist_url: &str,
    ) -> Result<u16, AttemptError> {
        let target = WaitlistTarget::from_url(waitlist_url)?;

        tracing::debug!(eid = %target.event_id, bstd = %target.start_stamp, "Joining waitlist");

        let response = self
            .client
            .post(&self.endpoint)
            .header(COOKIE, session.cookie_header())
            .form(&target.form())
            .send()
            .await?;

        Ok(response.status().as_u16())
    }
}
