//! slotbot - recurring class slot booker
//!
//! Logs in to a OneFitStop business listing, walks the paginated class schedule
//! and reserves (or waitlists) a fixed set of weekly slots, then reports what
//! happened.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Login, listing fetch and paginated availability crawl
//! - [`parser`] - Listing page parsing and slot classification
//! - [`booking`] - Desired-slot registry, matching and concurrent attempts
//! - [`report`] - Final report rendering
//! - [`notifications`] - Report and failure alert delivery
//! - [`pipeline`] - One booking run from login to notification
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use slotbot::config::Config;
//! use slotbot::pipeline::BookingPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let pipeline = BookingPipeline::from_config(config)?;
//!     let report = pipeline.run_and_notify().await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

pub mod booking;
pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod notifications;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::booking::{SlotRegistry, SlotSnapshot};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, SlotbotErrorTrait};
    pub use crate::models::{DayOfWeek, ScheduleSlot, SlotClassification, SlotKey, SlotState, TimeOfDay};
    pub use crate::parser::SchedulePageParser;
    pub use crate::pipeline::{Backends, BookingPipeline};
    pub use crate::report::{BookingReport, ReportOutcome};
}

// Direct re-exports for convenience
pub use models::{SlotKey, SlotState};
