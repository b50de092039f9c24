//! Booking run orchestration
//!
//! One run logs in, crawls every configured window, books what it can while the
//! crawl is still going and ends with exactly one notification.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐     ┌──────────────┐
//! │ Authenticator│───▶│ Availability │────▶│ match_page  │────▶│  Booking     │
//! │   (login)    │    │   Crawler    │ mpsc│ (registry)  │     │  Dispatcher  │
//! └─────────────┘     └──────────────┘     └─────────────┘     └──────┬───────┘
//!                                                                     │ settle
//!                          ┌──────────┐      ┌───────────────┐        │
//!                          │ Notifier │◀─────│ BookingReport │◀───────┘
//!                          └──────────┘      └───────────────┘
//! ```
//!
//! The crawl and the attempts share one deadline. When it expires the crawl is
//! dropped, attempts already running are left to finish on their own and the
//! report shows the registry as it was at that moment.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::booking::{
    match_page, AttemptExecutor, BookingDispatcher, HttpWaitlistClient, ReservationBackend,
    SlotRegistry, WaitlistTransport, WebDriverReservation,
};
use crate::config::Config;
use crate::crawler::{
    AvailabilityCrawler, Authenticator, CrawledPage, Credentials, HttpAuthenticator, ScheduleFetcher,
    ScheduleTransport, SessionCredential,
};
use crate::error::{Error, Result, SlotbotErrorTrait};
use crate::models::SlotState;
use crate::notifications::{self, Notifier};
use crate::report::{BookingReport, ReportOutcome, FAILURE_ALERT};

/// Pages buffered between the crawler and the dispatcher
const PAGE_CHANNEL_CAPACITY: usize = 32;

/// External collaborators of a run
pub struct Backends {
    pub authenticator: Arc<dyn Authenticator>,
    pub transport: Arc<dyn ScheduleTransport>,
    pub reservations: Arc<dyn ReservationBackend>,
    pub waitlist: Arc<dyn WaitlistTransport>,
    pub notifier: Arc<dyn Notifier>,
}

impl Backends {
    /// Build the HTTP and WebDriver implementations described by the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any client cannot be constructed
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            authenticator: Arc::new(HttpAuthenticator::new(config)?),
            transport: Arc::new(ScheduleFetcher::new(config)?),
            reservations: Arc::new(WebDriverReservation::new(config)?),
            waitlist: Arc::new(HttpWaitlistClient::new(config)?),
            notifier: notifications::from_config(&config.notifications)?,
        })
    }
}

/// State shared by everything that happens within one run
pub struct RunContext {
    pub config: Arc<Config>,
    pub session: Arc<SessionCredential>,
    pub registry: Arc<SlotRegistry>,
    pub run_id: Uuid,
}

/// Login, crawl, book and report
pub struct BookingPipeline {
    config: Arc<Config>,
    backends: Backends,
    today: NaiveDate,
}

impl BookingPipeline {
    pub fn new(config: Config, backends: Backends) -> Self {
        Self {
            config: Arc::new(config),
            backends,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Validate the configuration and build the production backends
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an invalid configuration, or the error of the
    /// client that could not be built
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate().map_err(|e| Error::config(e.to_string()))?;
        let backends = Backends::from_config(&config)?;
        Ok(Self::new(config, backends))
    }

    /// Compute window start dates relative to `today` instead of the local date
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run once and deliver the outcome
    ///
    /// A completed run sends its report; a run that aborted sends a failure
    /// alert and returns the error. Delivery problems are logged only.
    ///
    /// # Errors
    ///
    /// Returns the run-level error that aborted the run
    pub async fn run_and_notify(&self) -> Result<BookingReport> {
        let notifier = &self.backends.notifier;

        match self.run().await {
            Ok(report) => {
                if let Err(e) = notifier.send_report(&report).await {
                    tracing::warn!(notifier = notifier.name(), error = %e, "Report delivery failed");
                }
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, category = %e.category(), "Booking run failed");

                let message = format!("{FAILURE_ALERT}\n\n{}", e.summary());
                if let Err(notify_err) = notifier.send_failure_alert(&message).await {
                    tracing::warn!(
                        notifier = notifier.name(),
                        error = %notify_err,
                        "Failure alert delivery failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Run once and return the report without notifying
    ///
    /// # Errors
    ///
    /// Returns login, crawl and registry setup errors; attempt errors are
    /// recorded on their slot instead.
    pub async fn run(&self) -> Result<BookingReport> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("booking_run", run_id = %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<BookingReport> {
        let registry = Arc::new(SlotRegistry::new(&self.config.booking.desired_slots)?);

        tracing::info!(slots = registry.len(), "Logging in");
        let credentials = Credentials::from_config(&self.config);
        let session = self.backends.authenticator.login(&credentials).await?;

        let ctx = RunContext {
            config: Arc::clone(&self.config),
            session: Arc::new(session),
            registry,
            run_id,
        };

        let deadline = ctx.config.run_deadline();
        match tokio::time::timeout(deadline, self.crawl_and_book(&ctx)).await {
            Ok(result) => result?,
            Err(_) => tracing::warn!(
                deadline_secs = deadline.as_secs(),
                "Run deadline reached, reporting current state"
            ),
        }

        let report = BookingReport::from_registry(&ctx.registry);
        tracing::info!(
            run_id = %ctx.run_id,
            booked = report.count(ReportOutcome::Booked),
            waitlisted = report.count(ReportOutcome::Waitlisted),
            full = report.count(ReportOutcome::Full),
            failed = report.count(ReportOutcome::Failed),
            not_found = report.count(ReportOutcome::NotFound),
            "Run finished"
        );

        Ok(report)
    }

    async fn crawl_and_book(&self, ctx: &RunContext) -> Result<()> {
        let crawler = AvailabilityCrawler::from_config(
            Arc::clone(&self.backends.transport),
            Arc::clone(&ctx.session),
            &ctx.config.crawler,
        );
        let executor = Arc::new(AttemptExecutor::new(
            Arc::clone(&ctx.session),
            Arc::clone(&self.backends.reservations),
            Arc::clone(&self.backends.waitlist),
            ctx.config.attempt_timeout(),
        ));
        let mut dispatcher = BookingDispatcher::new(
            Arc::clone(&ctx.registry),
            executor,
            ctx.config.booking.max_concurrent_attempts,
        );

        let windows = ctx.config.date_windows(self.today);
        let (tx, mut rx) = mpsc::channel::<CrawledPage>(PAGE_CHANNEL_CAPACITY);

        let consume = async {
            while let Some(crawled) = rx.recv().await {
                if ctx.registry.all_resolved() {
                    continue;
                }
                let matches = match_page(&crawled.result, &ctx.registry);
                if matches.is_empty() {
                    continue;
                }

                let spawned = dispatcher.dispatch(matches);
                tracing::debug!(
                    window = %crawled.window,
                    page = crawled.page,
                    spawned,
                    "Dispatched matches"
                );
            }
        };

        let (crawl_result, ()) = tokio::join!(crawler.crawl(windows, tx), consume);
        crawl_result?;

        let outcomes = dispatcher.settle().await;
        let failed = outcomes
            .iter()
            .filter(|(_, state)| *state == SlotState::Failed)
            .count();
        tracing::debug!(attempts = outcomes.len(), failed, "Attempts settled");

        Ok(())
    }
}
