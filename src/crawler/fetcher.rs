//! HTTP fetcher for class listing pages
//!
//! This module provides the listing transport used by the availability crawler:
//! - Rate limiting with governor across every stream of a run
//! - A per-request timeout, never retried
//! - The session cookie sent on every request
//! - Optional base URL override for mock servers

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE},
    Client,
};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::config::Config;
use crate::crawler::session::SessionCredential;
use crate::crawler::url::SiteUrls;
use crate::models::DateWindow;
use crate::utils::error::FetchError;

/// Source of raw listing pages
#[async_trait]
pub trait ScheduleTransport: Send + Sync {
    /// Fetch listing page `page` (1-based) of `window`
    async fn fetch_page(
        &self,
        session: &SessionCredential,
        page: u32,
        window: &DateWindow,
    ) -> Result<String, FetchError>;
}

/// Listing fetcher backed by reqwest
pub struct ScheduleFetcher {
    /// HTTP client with configured timeout and user agent
    client: Client,

    /// Rate limiter shared by all crawl streams
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Endpoint builder
    urls: SiteUrls,
}

impl ScheduleFetcher {
    /// Create a fetcher from the run configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        Self::with_config(
            SiteUrls::from_config(config),
            config.crawler.rate_limit,
            config.request_timeout(),
            &config.crawler.user_agent,
        )
    }

    /// Create a fetcher with explicit settings
    ///
    /// # Arguments
    ///
    /// * `urls` - Endpoint builder for the target site
    /// * `requests_per_second` - Maximum number of listing requests per second
    /// * `timeout` - Per-request timeout
    /// * `user_agent` - User agent sent with every request
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_config(
        urls: SiteUrls,
        requests_per_second: u32,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            urls,
        })
    }

    /// Create a fetcher against a mock server
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_base_url(base_url: &str, requests_per_second: u32) -> Result<Self, FetchError> {
        Self::with_config(
            SiteUrls::new(base_url, "1", "1"),
            requests_per_second,
            Duration::from_secs(30),
            crate::config::DEFAULT_USER_AGENT,
        )
    }

    fn build_headers(&self, session: &SessionCredential) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        if let Ok(cookie) = HeaderValue::from_str(&session.cookie_header()) {
            headers.insert(COOKIE, cookie);
        }

        headers
    }
}

#[async_trait]
impl ScheduleTransport for ScheduleFetcher {
    async fn fetch_page(
        &self,
        session: &SessionCredential,
        page: u32,
        window: &DateWindow,
    ) -> Result<String, FetchError> {
        let url = self.urls.listing_url(page, window)?;

        // Wait for rate limiter
        self.rate_limiter.until_ready().await;

        tracing::debug!(page, window = %window, "Fetching listing page");

        let response = self
            .client
            .get(&url)
            .headers(self.build_headers(session))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(page)
                } else {
                    FetchError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                page,
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(page)
            } else {
                FetchError::Http(e)
            }
        })
    }
}
