//! Error types for the slotbot booking pipeline
//!
//! This module defines the domain error enums used throughout the application.
//! Run-level errors (`AuthError`, `FetchError`, `ParseError`) abort a booking run;
//! `AttemptError` is scoped to a single desired slot and never escapes the executor.

use thiserror::Error;

/// Errors that can occur while logging in to the vendor site
#[derive(Error, Debug)]
pub enum AuthError {
    /// HTTP request error
    #[error("Login request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The site answered the login form with an error status
    #[error("Login rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Login succeeded but no session cookie came back
    #[error("Login response did not carry a session cookie")]
    MissingSession,

    /// Login request timed out
    #[error("Login timeout")]
    Timeout,
}

/// Errors that can occur while fetching a schedule listing page
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code for a listing page
    #[error("Listing page {page} returned status {status}")]
    Status { page: u32, status: u16 },

    /// Request timeout
    #[error("Request timeout for listing page {0}")]
    Timeout(u32),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised when a listing page does not have the expected markup
///
/// A parse error always means the vendor markup drifted; it is fatal for the page
/// and is never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Neither the "no classes" marker nor any day block was found
    #[error("Listing page has no schedule list and no 'no classes' marker")]
    NoScheduleList,

    /// Day header missing or not in the expected format
    #[error("Invalid schedule date: {0:?}")]
    InvalidDate(String),

    /// Slot start time missing or not in the expected format
    #[error("Invalid slot time: {0:?}")]
    InvalidTime(String),

    /// A clickable action was present but its URL could not be extracted
    #[error("Missing action URL for {0}")]
    MissingAction(String),

    /// A slot entry carried no marker and no action we know about
    #[error("Unrecognized slot entry at {0}")]
    UnrecognizedSlot(String),
}

/// Errors produced by a single booking attempt
///
/// These are caught at the attempt executor boundary and recorded on the
/// desired slot as `Failed`.
#[derive(Error, Debug)]
pub enum AttemptError {
    /// HTTP transport error while joining a waitlist
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The action URL could not be used
    #[error("Invalid action URL {url}: {reason}")]
    InvalidActionUrl { url: String, reason: String },

    /// The schedule slot advertised an action but no URL came with it
    #[error("Schedule slot has no action URL")]
    MissingActionUrl,

    /// The waitlist endpoint answered with an error status
    #[error("Waitlist join rejected with status {0}")]
    WaitlistRejected(u16),

    /// The browser automation backend failed
    #[error("WebDriver error: {0}")]
    WebDriver(String),

    /// An element the reservation flow waits for never became available
    #[error("Element {selector} not found within {waited_ms} ms")]
    ElementTimeout { selector: String, waited_ms: u64 },

    /// The whole attempt exceeded its time budget
    #[error("Attempt timed out after {0} ms")]
    Timeout(u64),

    /// The task running the side effect panicked
    #[error("Attempt task aborted: {0}")]
    Aborted(String),
}

/// General crawler errors
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse error
    #[error("Parse error on page {page}: {source}")]
    Parse {
        page: u32,
        #[source]
        source: ParseError,
    },

    /// The page consumer went away before the crawl finished
    #[error("Page channel closed")]
    ChannelClosed,
}

/// Errors from notification delivery
#[derive(Error, Debug)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid notifier configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Template rendering failed
    #[error("Template error: {0}")]
    Template(String),

    /// Endpoint rejected the payload
    #[error("Delivery failed: {0}")]
    Delivery(String),
}
