//! Attempt executor
//!
//! Turns one claimed match into a terminal slot state. Only the holder of a
//! [`SlotClaim`] gets here, so every side effect against the site runs at most
//! once per desired slot.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::booking::registry::SlotClaim;
use crate::booking::reservation::ReservationBackend;
use crate::booking::waitlist::WaitlistTransport;
use crate::crawler::session::SessionCredential;
use crate::models::{ScheduleSlot, SlotClassification, SlotState};
use crate::utils::error::AttemptError;

/// Executes booking side effects for claimed slots
pub struct AttemptExecutor {
    session: Arc<SessionCredential>,
    reservations: Arc<dyn ReservationBackend>,
    waitlist: Arc<dyn WaitlistTransport>,
    attempt_timeout: Duration,
}

impl AttemptExecutor {
    pub fn new(
        session: Arc<SessionCredential>,
        reservations: Arc<dyn ReservationBackend>,
        waitlist: Arc<dyn WaitlistTransport>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            session,
            reservations,
            waitlist,
            attempt_timeout,
        }
    }

    /// Resolve a claim according to the slot classification
    ///
    /// Never fails: attempt errors are logged and recorded on the slot.
    pub async fn execute(&self, claim: SlotClaim, slot: &ScheduleSlot) -> SlotState {
        let key = claim.key();

        let outcome = match slot.classification {
            SlotClassification::Open => self.reserve(slot).await.map(|()| SlotState::Booked),
            SlotClassification::Waitlistable => {
                self.join_waitlist(slot).await.map(|()| SlotState::Waitlisted)
            }
            SlotClassification::AlreadyBooked => Ok(SlotState::Booked),
            SlotClassification::Full => Ok(SlotState::Full),
            SlotClassification::AlreadyWaitlisted => Ok(SlotState::Waitlisted),
        };

        match outcome {
            Ok(state) => {
                tracing::info!(
                    slot = %key,
                    date = %slot.date,
                    classification = %slot.classification,
                    state = %state,
                    "Slot resolved"
                );
                claim.resolve(state, None);
                state
            }
            Err(e) => {
                tracing::error!(slot = %key, date = %slot.date, error = %e, "Booking attempt failed");
                claim.resolve(SlotState::Failed, Some(e.to_string()));
                SlotState::Failed
            }
        }
    }

    async fn reserve(&self, slot: &ScheduleSlot) -> Result<(), AttemptError> {
        let url = slot.action_url.clone().ok_or(AttemptError::MissingActionUrl)?;
        let reservations = Arc::clone(&self.reservations);
        let session = Arc::clone(&self.session);

        self.bounded(async move { reservations.confirm_reservation(&session, &url).await })
            .await
    }

    async fn join_waitlist(&self, slot: &ScheduleSlot) -> Result<(), AttemptError> {
        let url = slot.action_url.clone().ok_or(AttemptError::MissingActionUrl)?;
        let waitlist = Arc::clone(&self.waitlist);
        let session = Arc::clone(&self.session);

        let status = self
            .bounded(async move { waitlist.join_waitlist(&session, &url).await })
            .await?;

        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(AttemptError::WaitlistRejected(status))
        }
    }

    /// Wait at most `attempt_timeout` for a side effect
    ///
    /// The side effect runs on its own task. Running out of time marks the
    /// attempt as timed out but leaves the task running, so a request already
    /// sent is never cut short and the backend still cleans up after itself.
    async fn bounded<T, F>(&self, side_effect: F) -> Result<T, AttemptError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, AttemptError>> + Send + 'static,
    {
        let task = tokio::spawn(side_effect);

        match tokio::time::timeout(self.attempt_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(AttemptError::Aborted(e.to_string())),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout_ms(self.attempt_timeout),
                    "Attempt still running after its timeout, leaving it to finish"
                );
                Err(AttemptError::Timeout(timeout_ms(self.attempt_timeout)))
            }
        }
    }
}

fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
