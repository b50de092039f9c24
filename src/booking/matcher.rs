//! Slot matcher
//!
//! Intersects one parsed listing page with the desired slots that are still open.

use crate::booking::registry::SlotRegistry;
use crate::models::{PageResult, ScheduleSlot, SlotKey};

/// A desired slot found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMatch {
    pub key: SlotKey,
    pub slot: ScheduleSlot,
}

/// Match a page against the registry, in configuration order
///
/// Reads the registry only. A target matches when it appears on the page and is
/// still `Pending` and unclaimed at the time of the call; losing a later race is
/// settled by the claim, not here.
pub fn match_page(page: &PageResult, registry: &SlotRegistry) -> Vec<SlotMatch> {
    registry
        .keys()
        .filter_map(|key| page.get(&key).map(|slot| (key, slot)))
        .filter(|(key, _)| registry.is_open(key))
        .map(|(key, slot)| SlotMatch {
            key,
            slot: slot.clone(),
        })
        .collect()
}
