//! HTML parsing and data extraction
//!
//! This module handles parsing the vendor's class listing pages into
//! per-day, per-time slot availability.

pub mod schedule;
pub mod selectors;

// Re-export main parser and public helpers
pub use schedule::{extract_quoted_url, parse_listing_date, parse_start_time, SchedulePageParser};
pub use selectors::ScheduleSelectors;
