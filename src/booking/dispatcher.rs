//! Booking dispatcher
//!
//! Fans matches out to concurrent attempt tasks. A match is claimed in the
//! registry before its task is spawned, so a slot that appears on several pages
//! or windows gets exactly one attempt; later matches of a claimed slot are
//! dropped here. Concurrency is bounded by a semaphore taken inside each task.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::booking::executor::AttemptExecutor;
use crate::booking::matcher::SlotMatch;
use crate::booking::registry::SlotRegistry;
use crate::models::{SlotKey, SlotState};

/// Spawns and tracks attempt tasks for one run
pub struct BookingDispatcher {
    registry: Arc<SlotRegistry>,
    executor: Arc<AttemptExecutor>,
    semaphore: Arc<Semaphore>,
    // Dropping these handles detaches the tasks; in-flight attempts are never aborted
    tasks: Vec<(SlotKey, JoinHandle<SlotState>)>,
}

impl BookingDispatcher {
    pub fn new(
        registry: Arc<SlotRegistry>,
        executor: Arc<AttemptExecutor>,
        max_concurrent_attempts: usize,
    ) -> Self {
        Self {
            registry,
            executor,
            semaphore: Arc::new(Semaphore::new(max_concurrent_attempts.max(1))),
            tasks: Vec::new(),
        }
    }

    /// Claim and spawn an attempt for every match, returning how many were spawned
    pub fn dispatch(&mut self, matches: Vec<SlotMatch>) -> usize {
        let mut spawned = 0;

        for SlotMatch { key, slot } in matches {
            let Some(claim) = self.registry.try_claim(key, slot.date) else {
                tracing::debug!(slot = %key, date = %slot.date, "Slot already claimed, skipping");
                continue;
            };

            let executor = Arc::clone(&self.executor);
            let semaphore = Arc::clone(&self.semaphore);

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        claim.resolve(SlotState::Failed, Some("attempt pool closed".to_string()));
                        return SlotState::Failed;
                    }
                };

                executor.execute(claim, &slot).await
            });

            tracing::debug!(slot = %key, "Attempt dispatched");
            self.tasks.push((key, handle));
            spawned += 1;
        }

        spawned
    }

    /// Number of attempts dispatched and not yet settled
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every dispatched attempt to finish
    pub async fn settle(&mut self) -> Vec<(SlotKey, SlotState)> {
        let mut outcomes = Vec::with_capacity(self.tasks.len());

        for (key, handle) in self.tasks.drain(..) {
            match handle.await {
                Ok(state) => outcomes.push((key, state)),
                // The claim was dropped unresolved, the slot stays pending
                Err(e) => tracing::error!(slot = %key, error = %e, "Attempt task panicked"),
            }
        }

        outcomes
    }
}
