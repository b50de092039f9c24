//! Availability crawler with pagination support
//!
//! Walks the paginated class listing of one or more [`DateWindow`]s and forwards
//! every parsed page into an `mpsc` channel as soon as it is known to belong to
//! the schedule. Each window is an independent stream; streams run concurrently
//! and the first stream failure fails the whole crawl.
//!
//! Within a stream the first `eager_pages` pages are fetched in parallel. Their
//! results are released in page order up to the first "no classes" page, and
//! only once the whole batch succeeded: a failure on any eager page means none of
//! that batch reaches the consumer.

use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::ScheduleTransport;
use crate::crawler::session::SessionCredential;
use crate::models::{DateWindow, PageResult, ParsedPage};
use crate::parser::SchedulePageParser;
use crate::utils::error::CrawlerError;

/// One schedule page handed to the booking side of the pipeline
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub window: DateWindow,
    pub page: u32,
    pub result: PageResult,
}

/// Pages forwarded by one finished stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSummary {
    pub window: DateWindow,
    pub pages: u32,
}

/// Paginated listing crawler
pub struct AvailabilityCrawler {
    transport: Arc<dyn ScheduleTransport>,
    parser: SchedulePageParser,
    session: Arc<SessionCredential>,
    eager_pages: u32,
    max_pages: u32,
}

impl AvailabilityCrawler {
    /// Create a crawler using the sequential-only strategy
    #[must_use]
    pub fn new(transport: Arc<dyn ScheduleTransport>, session: Arc<SessionCredential>) -> Self {
        Self {
            transport,
            parser: SchedulePageParser::new(),
            session,
            eager_pages: 0,
            max_pages: 0,
        }
    }

    /// Create a crawler with the configured pagination strategy
    #[must_use]
    pub fn from_config(
        transport: Arc<dyn ScheduleTransport>,
        session: Arc<SessionCredential>,
        config: &CrawlerConfig,
    ) -> Self {
        Self::new(transport, session)
            .with_eager_pages(config.eager_pages)
            .with_max_pages(config.max_pages)
    }

    /// Fetch pages `1..=n` of every window in parallel before going sequential
    #[must_use]
    pub fn with_eager_pages(mut self, eager_pages: u32) -> Self {
        self.eager_pages = eager_pages;
        self
    }

    /// Stop each stream after this many pages (0 = unlimited)
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Crawl every window concurrently, forwarding schedule pages into `sink`
    ///
    /// # Errors
    ///
    /// Returns the first `CrawlerError` of any stream; the remaining streams are
    /// dropped at that point.
    pub async fn crawl(
        &self,
        windows: Vec<DateWindow>,
        sink: mpsc::Sender<CrawledPage>,
    ) -> Result<Vec<WindowSummary>, CrawlerError> {
        let streams = windows
            .into_iter()
            .map(|window| self.crawl_window(window, sink.clone()));

        let summaries = try_join_all(streams).await?;

        tracing::info!(
            windows = summaries.len(),
            pages = summaries.iter().map(|s| s.pages).sum::<u32>(),
            "Crawl finished"
        );

        Ok(summaries)
    }

    async fn crawl_window(
        &self,
        window: DateWindow,
        sink: mpsc::Sender<CrawledPage>,
    ) -> Result<WindowSummary, CrawlerError> {
        let mut forwarded = 0;
        let mut next_page = 1;

        // ====================================================================
        // Eager batch
        // ====================================================================

        let eager_last = self.capped(self.eager_pages);
        if eager_last > 0 {
            tracing::debug!(window = %window, pages = eager_last, "Fetching eager batch");

            let batch = join_all((1..=eager_last).map(|page| self.fetch_and_parse(page, &window))).await;
            let batch = batch.into_iter().collect::<Result<Vec<_>, _>>()?;

            for (page, parsed) in (1..).zip(batch) {
                match parsed {
                    ParsedPage::NoClasses => {
                        tracing::debug!(window = %window, page, "Listing exhausted");
                        return Ok(WindowSummary {
                            window,
                            pages: forwarded,
                        });
                    }
                    ParsedPage::Schedule(result) => {
                        self.forward(&sink, &window, page, result).await?;
                        forwarded += 1;
                    }
                }
            }

            next_page = eager_last + 1;
        }

        // ====================================================================
        // Sequential pagination
        // ====================================================================

        loop {
            if self.max_pages > 0 && next_page > self.max_pages {
                tracing::warn!(
                    window = %window,
                    max_pages = self.max_pages,
                    "Reached page limit before the listing ran out"
                );
                break;
            }

            match self.fetch_and_parse(next_page, &window).await? {
                ParsedPage::NoClasses => {
                    tracing::debug!(window = %window, page = next_page, "Listing exhausted");
                    break;
                }
                ParsedPage::Schedule(result) => {
                    self.forward(&sink, &window, next_page, result).await?;
                    forwarded += 1;
                }
            }

            next_page += 1;
        }

        Ok(WindowSummary {
            window,
            pages: forwarded,
        })
    }

    async fn fetch_and_parse(
        &self,
        page: u32,
        window: &DateWindow,
    ) -> Result<ParsedPage, CrawlerError> {
        let html = self
            .transport
            .fetch_page(&self.session, page, window)
            .await?;

        self.parser
            .parse(&html)
            .map_err(|source| CrawlerError::Parse { page, source })
    }

    async fn forward(
        &self,
        sink: &mpsc::Sender<CrawledPage>,
        window: &DateWindow,
        page: u32,
        result: PageResult,
    ) -> Result<(), CrawlerError> {
        tracing::debug!(window = %window, page, slots = result.len(), "Forwarding schedule page");

        sink.send(CrawledPage {
            window: window.clone(),
            page,
            result,
        })
        .await
        .map_err(|_| CrawlerError::ChannelClosed)
    }

    fn capped(&self, pages: u32) -> u32 {
        if self.max_pages > 0 {
            pages.min(self.max_pages)
        } else {
            pages
        }
    }
}
