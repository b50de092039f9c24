//! Listing crawl with rate limiting
//!
//! This module logs in to the vendor site and walks its paginated class
//! listing, one stream per date window.

pub mod availability;
pub mod fetcher;
pub mod session;
pub mod url;

pub use availability::{AvailabilityCrawler, CrawledPage, WindowSummary};
pub use fetcher::{ScheduleFetcher, ScheduleTransport};
pub use session::{Authenticator, Credentials, HttpAuthenticator, SessionCredential};
pub use url::SiteUrls;
