//! Unified error handling for the slotbot crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`SlotbotErrorTrait`] - Common interface for alerting on errors
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use slotbot::error::{Error, SlotbotErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     eprintln!("Run aborted ({}): {}", err.category(), err.summary());
//! }
//! ```

use thiserror::Error;

pub use crate::utils::error::{
    AttemptError, AuthError, CrawlerError, FetchError, NotifyError, ParseError,
};

/// Common trait for all slotbot error types
pub trait SlotbotErrorTrait: std::error::Error {
    /// Get a short human readable description for notifications
    fn summary(&self) -> String;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Login and session errors
    Auth,
    /// Network-related errors (HTTP, timeout)
    Network,
    /// Markup and data extraction errors
    Parsing,
    /// Single booking attempt errors
    Attempt,
    /// Notification delivery errors
    Notification,
    /// Configuration and validation errors
    Config,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Attempt => "attempt",
            Self::Notification => "notification",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for the slotbot crate
#[derive(Error, Debug)]
pub enum Error {
    /// Login errors
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Listing client setup errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Crawler errors (fetch or parse wrapped with page context)
    #[error("Crawler error: {0}")]
    Crawler(#[from] CrawlerError),

    /// Booking attempt errors
    #[error("Attempt error: {0}")]
    Attempt(#[from] AttemptError),

    /// Notification errors
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl SlotbotErrorTrait for Error {
    fn summary(&self) -> String {
        match self {
            Self::Auth(e) => format!("Could not log in: {e}"),
            Self::Fetch(e) => format!("Could not fetch the class schedule: {e}"),
            Self::Crawler(CrawlerError::Parse { page, source }) => {
                format!("The class schedule page {page} changed its layout: {source}")
            }
            Self::Crawler(e) => format!("Could not crawl the class schedule: {e}"),
            Self::Attempt(e) => format!("Booking attempt failed: {e}"),
            Self::Notify(e) => format!("Could not deliver notification: {e}"),
            Self::Config(msg) => format!("Invalid configuration: {msg}"),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth(_) => ErrorCategory::Auth,
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Crawler(CrawlerError::Parse { .. }) => ErrorCategory::Parsing,
            Self::Crawler(_) => ErrorCategory::Network,
            Self::Attempt(_) => ErrorCategory::Attempt,
            Self::Notify(_) => ErrorCategory::Notification,
            Self::Config(_) => ErrorCategory::Config,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
