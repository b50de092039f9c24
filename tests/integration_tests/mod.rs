//! Integration tests module
//!
//! This module provides end-to-end integration tests for slotbot, including:
//! - Complete login → crawl → book → report runs
//! - Exactly-once booking under concurrent matches
//! - Run-level failures and slot-level failures

pub mod error_scenarios;
pub mod pipeline_test;
pub mod race_test;
