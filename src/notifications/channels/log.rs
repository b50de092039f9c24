//! Log-only notifier, used when no delivery channel is configured

use async_trait::async_trait;

use crate::notifications::Notifier;
use crate::report::BookingReport;
use crate::utils::error::NotifyError;

#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_report(&self, report: &BookingReport) -> Result<(), NotifyError> {
        for entry in &report.entries {
            tracing::info!(
                slot = %entry.key,
                date = %entry.date_label,
                outcome = %entry.outcome,
                detail = entry.failure_detail.as_deref().unwrap_or(""),
                "Booking result"
            );
        }
        Ok(())
    }

    async fn send_failure_alert(&self, message: &str) -> Result<(), NotifyError> {
        tracing::error!(alert = %message, "Booking run failed");
        Ok(())
    }
}
