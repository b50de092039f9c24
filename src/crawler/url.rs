//! URL construction for the vendor site
//!
//! All endpoints hang off one configurable site root so the whole run can be
//! pointed at a mock server.

use url::Url;

use crate::config::Config;
use crate::models::DateWindow;
use crate::utils::error::FetchError;

/// Listing route of the class widget
const LISTING_ROUTE: &str = "widget/directory/businessclass";

/// Route accepting waitlist join forms
const WAITLIST_ROUTE: &str = "directory/directory/widgetjoinwaitlist";

/// Endpoint builder for one vendor site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrls {
    base_url: String,
    trid: String,
    trainer_id: String,
}

impl SiteUrls {
    pub fn new(
        base_url: impl Into<String>,
        trid: impl Into<String>,
        trainer_id: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            trid: trid.into(),
            trainer_id: trainer_id.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.site.base_url,
            &config.site.trid,
            &config.site.trainer_id,
        )
    }

    /// Site root with a trailing slash, also used as the login redirect
    pub fn site_root(&self) -> String {
        format!("{}/", self.base_url)
    }

    pub fn trid(&self) -> &str {
        &self.trid
    }

    pub fn login_url(&self) -> String {
        format!("{}/login?loginAs=trainer", self.base_url)
    }

    pub fn waitlist_url(&self) -> String {
        format!("{}/index.php?route={WAITLIST_ROUTE}", self.base_url)
    }

    /// Listing page `page` (1-based) of a crawl window
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` if the configured base URL does not parse
    pub fn listing_url(&self, page: u32, window: &DateWindow) -> Result<String, FetchError> {
        let mut url = Url::parse(&format!("{}/index.php", self.base_url))
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", self.base_url)))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("route", LISTING_ROUTE)
                .append_pair("trid", &self.trid)
                .append_pair("mytrainer_id", &self.trainer_id)
                .append_pair("page", &page.to_string());
            if let Some(start) = window.start {
                query.append_pair("start_date", &start.format("%Y-%m-%d").to_string());
            }
        }

        Ok(url.to_string())
    }
}
