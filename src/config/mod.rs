//! Configuration management for the slotbot booking run
//!
//! This module handles loading and validating configuration from a TOML file and
//! environment variables. Secrets are usually kept out of the file and supplied
//! through `SLOTBOT_EMAIL` / `SLOTBOT_PASSWORD`.

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::models::{DateWindow, DayOfWeek, SlotKey};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vendor site coordinates
    pub site: SiteConfig,

    /// Login credentials
    pub account: AccountConfig,

    /// What to book and how hard to try
    pub booking: BookingConfig,

    /// Listing crawler configuration
    pub crawler: CrawlerConfig,

    /// Browser automation endpoint for reservations
    pub webdriver: WebDriverConfig,

    /// Report delivery
    pub notifications: NotificationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Vendor site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site root, e.g. `https://clients.onefitstop.com`
    pub base_url: String,

    /// Domain the session cookie is scoped to
    pub cookie_domain: String,

    /// Business identifier (`trid` query parameter)
    pub trid: String,

    /// Trainer identifier (`mytrainer_id` query parameter)
    pub trainer_id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://clients.onefitstop.com"),
            cookie_domain: String::from("onefitstop.com"),
            trid: String::new(),
            trainer_id: String::new(),
        }
    }
}

/// Login credentials
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One crawl window relative to the day of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Name used in logs
    pub label: String,

    /// Days after today the window starts; absent means the site default
    #[serde(default)]
    pub offset_days: Option<i64>,
}

/// Booking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// Desired (day, time) targets, in report order
    pub desired_slots: Vec<SlotKey>,

    /// Crawl windows pursued concurrently
    pub windows: Vec<WindowConfig>,

    /// Maximum number of booking attempts running at once
    pub max_concurrent_attempts: usize,

    /// Time budget for a single attempt in seconds
    pub attempt_timeout_secs: u64,

    /// Overall run deadline in seconds
    pub run_deadline_secs: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            desired_slots: Vec::new(),
            windows: vec![WindowConfig {
                label: String::from("current"),
                offset_days: None,
            }],
            max_concurrent_attempts: 2,
            attempt_timeout_secs: 60,
            run_deadline_secs: 300,
        }
    }
}

/// Listing crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Request timeout in seconds, per page
    pub request_timeout_secs: u64,

    /// Rate limit (requests per second) across all listing fetches
    pub rate_limit: u32,

    /// User agent string
    pub user_agent: String,

    /// Pages fetched in parallel at the start of each window (0 = sequential only)
    pub eager_pages: u32,

    /// Upper bound on pages per window (0 = unlimited)
    pub max_pages: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            rate_limit: 5,
            user_agent: String::from(DEFAULT_USER_AGENT),
            eager_pages: 0,
            max_pages: 20,
        }
    }
}

/// Largest distance in days a crawl window may start from the day of the run
pub const MAX_WINDOW_OFFSET_DAYS: i64 = 366;

/// Browser user agent; the site shows a warning to unknown agents
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// WebDriver endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// Remote end URL, e.g. a local chromedriver
    pub url: String,

    /// Run the browser headless
    pub headless: bool,

    /// Maximum wait for each element in the reservation flow, seconds
    pub step_wait_secs: u64,

    /// Browser window size as `width,height`
    pub window_size: String,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:9515"),
            headless: true,
            step_wait_secs: 10,
            window_size: String::from("1280,800"),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Webhook receiving the report; reports are only logged when absent
    pub webhook_url: Option<String>,

    /// Optional bearer token for the webhook
    pub auth_token: Option<String>,

    /// Who the report is addressed to (forwarded in the payload)
    pub recipient: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retry attempts on failure
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds, doubled on each retry
    pub retry_delay_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            auth_token: None,
            recipient: None,
            timeout_secs: 10,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from an optional file, then let environment variables override it
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `SLOTBOT_*` environment variables that are set
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_string("SLOTBOT_BASE_URL") {
            self.site.base_url = v;
        }
        if let Some(v) = env_string("SLOTBOT_TRID") {
            self.site.trid = v;
        }
        if let Some(v) = env_string("SLOTBOT_TRAINER_ID") {
            self.site.trainer_id = v;
        }
        if let Some(v) = env_string("SLOTBOT_EMAIL") {
            self.account.email = v;
        }
        if let Some(v) = env_string("SLOTBOT_PASSWORD") {
            self.account.password = v;
        }
        if let Some(v) = env_string("SLOTBOT_DESIRED_SLOTS") {
            self.booking.desired_slots =
                parse_slot_list(&v).context("Invalid SLOTBOT_DESIRED_SLOTS")?;
        }
        if let Some(v) = env_parsed("SLOTBOT_MAX_CONCURRENT_ATTEMPTS")? {
            self.booking.max_concurrent_attempts = v;
        }
        if let Some(v) = env_parsed("SLOTBOT_ATTEMPT_TIMEOUT")? {
            self.booking.attempt_timeout_secs = v;
        }
        if let Some(v) = env_parsed("SLOTBOT_RUN_DEADLINE")? {
            self.booking.run_deadline_secs = v;
        }
        if let Some(v) = env_parsed("SLOTBOT_REQUEST_TIMEOUT")? {
            self.crawler.request_timeout_secs = v;
        }
        if let Some(v) = env_parsed("SLOTBOT_EAGER_PAGES")? {
            self.crawler.eager_pages = v;
        }
        if let Some(v) = env_string("SLOTBOT_WEBDRIVER_URL") {
            self.webdriver.url = v;
        }
        if let Some(v) = env_string("SLOTBOT_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(v);
        }
        if let Some(v) = env_string("SLOTBOT_WEBHOOK_TOKEN") {
            self.notifications.auth_token = Some(v);
        }
        if let Some(v) = env_string("SLOTBOT_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env_string("SLOTBOT_LOG_FORMAT") {
            self.logging.format = v;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.site.base_url.starts_with("http://") && !self.site.base_url.starts_with("https://")
        {
            anyhow::bail!("site.base_url must start with http:// or https://");
        }

        if self.site.trid.is_empty() {
            anyhow::bail!("site.trid must be set");
        }

        if self.account.email.is_empty() || self.account.password.is_empty() {
            anyhow::bail!("account email and password must be set");
        }

        if self.booking.desired_slots.is_empty() {
            anyhow::bail!("booking.desired_slots must list at least one slot");
        }

        let mut seen = HashSet::new();
        for slot in &self.booking.desired_slots {
            if !seen.insert(*slot) {
                anyhow::bail!("booking.desired_slots lists {slot} more than once");
            }
        }

        if self.booking.windows.is_empty() {
            anyhow::bail!("booking.windows must list at least one window");
        }

        let mut labels = HashSet::new();
        for window in &self.booking.windows {
            if !labels.insert(window.label.as_str()) {
                anyhow::bail!("booking.windows label {:?} is used twice", window.label);
            }
            if let Some(days) = window.offset_days {
                if !(-MAX_WINDOW_OFFSET_DAYS..=MAX_WINDOW_OFFSET_DAYS).contains(&days) {
                    anyhow::bail!(
                        "booking.windows {:?} offset_days must be within ±{MAX_WINDOW_OFFSET_DAYS}",
                        window.label
                    );
                }
            }
        }

        if self.booking.max_concurrent_attempts == 0 {
            anyhow::bail!("max_concurrent_attempts must be greater than 0");
        }

        if self.booking.run_deadline_secs == 0 || self.booking.attempt_timeout_secs == 0 {
            anyhow::bail!("run_deadline_secs and attempt_timeout_secs must be greater than 0");
        }

        if self.crawler.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.crawler.rate_limit == 0 {
            anyhow::bail!("rate_limit must be positive");
        }

        Ok(())
    }

    /// Crawl windows for a run starting on `today`
    #[must_use]
    pub fn date_windows(&self, today: NaiveDate) -> Vec<DateWindow> {
        self.booking
            .windows
            .iter()
            .map(|w| match w.offset_days.and_then(|days| offset_date(today, days)) {
                Some(start) => DateWindow::starting(&w.label, start),
                None => {
                    if w.offset_days.is_some() {
                        tracing::warn!(window = %w.label, "Window offset out of range, using the site default");
                    }
                    DateWindow {
                        label: w.label.clone(),
                        start: None,
                    }
                }
            })
            .collect()
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.request_timeout_secs)
    }

    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.booking.attempt_timeout_secs)
    }

    #[must_use]
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.booking.run_deadline_secs)
    }
}

fn offset_date(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    let span = Days::new(days.unsigned_abs());
    if days >= 0 {
        today.checked_add_days(span)
    } else {
        today.checked_sub_days(span)
    }
}

/// Parse `"Mon 18:00, Wed 07:00"` into slot keys
pub fn parse_slot_list(s: &str) -> Result<Vec<SlotKey>> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (day, time) = item
                .split_once(char::is_whitespace)
                .with_context(|| format!("Expected '<day> <HH:MM>', got {item:?}"))?;
            let day = DayOfWeek::parse(day).with_context(|| format!("Unknown day {day:?}"))?;
            let time = time.trim().parse().map_err(anyhow::Error::msg)?;
            Ok(SlotKey::new(day, time))
        })
        .collect()
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {e}")),
        None => Ok(None),
    }
}
