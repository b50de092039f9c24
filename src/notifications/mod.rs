//! Report delivery
//!
//! A run ends with exactly one notification: the booking report when the run
//! completed (or hit its deadline), or a failure alert when it aborted.
//!
//! ```text
//!   BookingPipeline ──▶ dyn Notifier ──┬──▶ WebhookNotifier (JSON POST)
//!                                      └──▶ LogNotifier     (tracing)
//! ```

pub mod channels;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NotificationConfig;
use crate::report::BookingReport;
use crate::utils::error::NotifyError;

pub use channels::log::LogNotifier;
pub use channels::webhook::{WebhookConfig, WebhookNotifier};

/// Delivers run outcomes to the user
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name used in logs
    fn name(&self) -> &str;

    /// Deliver the final report of a completed run
    async fn send_report(&self, report: &BookingReport) -> Result<(), NotifyError>;

    /// Deliver an alert for a run that aborted before producing a report
    async fn send_failure_alert(&self, message: &str) -> Result<(), NotifyError>;
}

/// Build the notifier described by the configuration
///
/// Falls back to [`LogNotifier`] when no webhook is configured.
///
/// # Errors
///
/// Returns `NotifyError::InvalidConfig` for an unusable webhook configuration
pub fn from_config(config: &NotificationConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.webhook_url {
        Some(url) => {
            let mut webhook = WebhookConfig::new(url)
                .with_timeout(config.timeout_secs)
                .with_max_retries(config.max_retries)
                .with_retry_delay(Duration::from_millis(config.retry_delay_ms));
            if let Some(token) = &config.auth_token {
                webhook = webhook.with_auth_token(token);
            }
            if let Some(recipient) = &config.recipient {
                webhook = webhook.with_recipient(recipient);
            }
            Ok(Arc::new(WebhookNotifier::new(webhook)?))
        }
        None => Ok(Arc::new(LogNotifier::new())),
    }
}
