//! Desired-slot registry
//!
//! Holds one [`DesiredSlot`] per configured target for the lifetime of a run.
//! The registry is the only shared mutable state of the pipeline; every change
//! goes through [`SlotRegistry::try_claim`] followed by [`SlotClaim::resolve`].
//!
//! A claim is exclusive: it succeeds only while the slot is `Pending` and nobody
//! else holds a claim. The slot stays `Pending` until the claim is resolved, so a
//! report taken while an attempt is still in flight shows it as not found.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::models::{SlotKey, SlotState};

#[derive(Debug)]
struct SlotRecord {
    state: SlotState,
    claimed: bool,
    resolved_date: Option<NaiveDate>,
    failure_detail: Option<String>,
}

/// One configured (day, time) target
#[derive(Debug)]
pub struct DesiredSlot {
    key: SlotKey,
    record: Mutex<SlotRecord>,
}

impl DesiredSlot {
    fn new(key: SlotKey) -> Self {
        Self {
            key,
            record: Mutex::new(SlotRecord {
                state: SlotState::Pending,
                claimed: false,
                resolved_date: None,
                failure_detail: None,
            }),
        }
    }

    pub fn key(&self) -> SlotKey {
        self.key
    }

    fn lock(&self) -> MutexGuard<'_, SlotRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> SlotSnapshot {
        let record = self.lock();
        SlotSnapshot {
            key: self.key,
            state: record.state,
            resolved_date: record.resolved_date,
            failure_detail: record.failure_detail.clone(),
        }
    }
}

/// Point-in-time copy of a desired slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub key: SlotKey,
    pub state: SlotState,
    pub resolved_date: Option<NaiveDate>,
    pub failure_detail: Option<String>,
}

/// Registry of desired slots, in configuration order
#[derive(Debug)]
pub struct SlotRegistry {
    slots: Vec<DesiredSlot>,
    index: HashMap<SlotKey, usize>,
}

impl SlotRegistry {
    /// Build the registry from configured targets
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a target is listed twice
    pub fn new(keys: &[SlotKey]) -> Result<Self> {
        let mut slots = Vec::with_capacity(keys.len());
        let mut index = HashMap::with_capacity(keys.len());

        for key in keys {
            if index.insert(*key, slots.len()).is_some() {
                return Err(Error::config(format!("desired slot {key} is listed twice")));
            }
            slots.push(DesiredSlot::new(*key));
        }

        Ok(Self { slots, index })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, key: &SlotKey) -> bool {
        self.index.contains_key(key)
    }

    /// Configured targets in configuration order
    pub fn keys(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.slots.iter().map(DesiredSlot::key)
    }

    /// Current state of one target
    pub fn state(&self, key: &SlotKey) -> Option<SlotState> {
        self.slot(key).map(|slot| slot.lock().state)
    }

    /// Whether the target exists, is still `Pending` and is not claimed
    pub fn is_open(&self, key: &SlotKey) -> bool {
        self.slot(key).is_some_and(|slot| {
            let record = slot.lock();
            record.state == SlotState::Pending && !record.claimed
        })
    }

    /// Whether every target reached a terminal state
    pub fn all_resolved(&self) -> bool {
        self.slots.iter().all(|slot| slot.lock().state.is_terminal())
    }

    /// Copy of every slot, in configuration order
    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.slots.iter().map(DesiredSlot::snapshot).collect()
    }

    /// Atomically take the exclusive right to resolve `key`
    ///
    /// Succeeds only when the slot is `Pending` and unclaimed. The date of the
    /// matched occurrence is recorded on success.
    pub fn try_claim(self: &Arc<Self>, key: SlotKey, date: NaiveDate) -> Option<SlotClaim> {
        let index = *self.index.get(&key)?;
        let mut record = self.slots[index].lock();

        if record.state != SlotState::Pending || record.claimed {
            return None;
        }

        record.claimed = true;
        record.resolved_date = Some(date);

        Some(SlotClaim {
            registry: Arc::clone(self),
            index,
            key,
            date,
        })
    }

    fn slot(&self, key: &SlotKey) -> Option<&DesiredSlot> {
        self.index.get(key).map(|&i| &self.slots[i])
    }
}

/// Exclusive right to move one desired slot out of `Pending`
#[derive(Debug)]
pub struct SlotClaim {
    registry: Arc<SlotRegistry>,
    index: usize,
    key: SlotKey,
    date: NaiveDate,
}

impl SlotClaim {
    pub fn key(&self) -> SlotKey {
        self.key
    }

    /// Date of the matched occurrence
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Record the terminal state of this slot
    pub fn resolve(self, state: SlotState, failure_detail: Option<String>) {
        if !state.is_terminal() {
            tracing::warn!(slot = %self.key, "Ignoring resolution back to pending");
            return;
        }

        let mut record = self.registry.slots[self.index].lock();
        record.state = state;
        record.failure_detail = failure_detail;
    }
}
