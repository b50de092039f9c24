//! Notification channels
//!
//! This module provides the channels a run outcome can be delivered through.

pub mod log;
pub mod webhook;
