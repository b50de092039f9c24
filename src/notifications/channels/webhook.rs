//! Webhook notification channel
//!
//! This module delivers run outcomes as JSON payloads via HTTP POST requests.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::notifications::Notifier;
use crate::report::{BookingReport, FAILURE_ALERT, REPORT_HEADING};
use crate::utils::error::NotifyError;

/// Webhook channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook URL endpoint
    pub url: String,
    /// Optional authentication token (sent as Bearer token)
    pub auth_token: Option<String>,
    /// Recipient forwarded in the payload for mail-relay webhooks
    pub recipient: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum retry attempts on failure
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// First backoff delay in milliseconds, doubled on every retry
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_timeout() -> u64 {
    10
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

impl WebhookConfig {
    /// Create a new webhook configuration
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            recipient: None,
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }

    /// Set authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set max retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the first backoff delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Webhook URL cannot be empty".to_string());
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err("Webhook URL must start with http:// or https://".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Webhook notifier
///
/// # Payload Format
///
/// ```json
/// {
///   "kind": "report",
///   "subject": "Finished booking classes, here is the result",
///   "recipient": "me@example.com",
///   "text": "Finished booking classes, here is the result\nMonday, March 04 18:00: Booked",
///   "html": "<p>Finished booking classes ...</p>",
///   "entries": [
///     {
///       "key": { "day": "Mon", "time": "18:00" },
///       "date": "2024-03-04",
///       "date_label": "Monday, March 04",
///       "outcome": "booked",
///       "failure_detail": null
///     }
///   ],
///   "sent_at": "2024-03-04T12:00:00Z"
/// }
/// ```
///
/// Failure alerts use `"kind": "failure"` and carry no `entries`.
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: Client,
}

impl WebhookNotifier {
    /// Create a new webhook notifier
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidConfig` when the configuration is unusable
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        config.validate().map_err(NotifyError::InvalidConfig)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::InvalidConfig(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Create a webhook notifier with just a URL
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidConfig` when the URL is unusable
    pub fn from_url(url: impl Into<String>) -> Result<Self, NotifyError> {
        Self::new(WebhookConfig::new(url))
    }

    /// Get the webhook URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn build_report_payload(&self, report: &BookingReport) -> Result<serde_json::Value, NotifyError> {
        Ok(serde_json::json!({
            "kind": "report",
            "subject": REPORT_HEADING,
            "recipient": self.config.recipient,
            "text": report.render_text(),
            "html": report.render_html()?,
            "entries": report.entries,
            "sent_at": chrono::Utc::now().to_rfc3339(),
        }))
    }

    fn build_failure_payload(&self, message: &str) -> serde_json::Value {
        serde_json::json!({
            "kind": "failure",
            "subject": FAILURE_ALERT,
            "recipient": self.config.recipient,
            "text": message,
            "html": format!("<p>{}</p>", html_escape::encode_text(message)),
            "sent_at": chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Send the request with retry logic
    async fn send_with_retry(&self, payload: &serde_json::Value) -> Result<(), NotifyError> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(self.config.retry_delay_ms, attempt)).await;
                tracing::debug!(
                    "Retrying webhook request (attempt {}/{})",
                    attempt + 1,
                    self.config.max_retries + 1
                );
            }

            let mut request = self.client.post(&self.config.url);

            if let Some(token) = &self.config.auth_token {
                request = request.bearer_auth(token);
            }

            match request.json(payload).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        tracing::info!(url = %self.config.url, status = status.as_u16(), "Webhook delivered");
                        return Ok(());
                    }

                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unable to read response body".to_string());
                    last_error = Some(NotifyError::Delivery(format!("HTTP {status}: {body}")));

                    // Don't retry on client errors (4xx)
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(e) => {
                    last_error = Some(NotifyError::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| NotifyError::Delivery("Unknown error".to_string())))
    }
}

/// Delay before retry number `attempt` (1-based): 1x, 2x, 4x... the base delay
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2_u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send_report(&self, report: &BookingReport) -> Result<(), NotifyError> {
        let payload = self.build_report_payload(report)?;
        self.send_with_retry(&payload).await.inspect_err(|e| {
            tracing::error!(url = %self.config.url, error = %e, "Failed to deliver report");
        })
    }

    async fn send_failure_alert(&self, message: &str) -> Result<(), NotifyError> {
        let payload = self.build_failure_payload(message);
        self.send_with_retry(&payload).await.inspect_err(|e| {
            tracing::error!(url = %self.config.url, error = %e, "Failed to deliver failure alert");
        })
    }
}
