//! Reservation through a real browser
//!
//! The reservation page only confirms a booking after client-side scripts have
//! run, so reserving an `Open` slot drives a browser through a W3C WebDriver
//! remote end (chromedriver, geckodriver) using its JSON-over-HTTP protocol:
//!
//! 1. create a session
//! 2. open the site root and plant the `PHPSESSID` cookie
//! 3. open the reservation URL
//! 4. click `#singleeventpayment`, then `#btn_payment_bycredits`
//! 5. delete the session, whatever happened before
//!
//! <https://www.w3.org/TR/webdriver2/>

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::crawler::session::{SessionCredential, SESSION_COOKIE};
use crate::utils::error::AttemptError;

/// Button choosing the single-class payment option
pub const SINGLE_EVENT_BUTTON: &str = "#singleeventpayment";

/// Button paying with account credits
pub const PAY_BY_CREDITS_BUTTON: &str = "#btn_payment_bycredits";

/// Key of a web element reference in WebDriver responses
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Confirms a reservation for an `Open` slot
#[async_trait]
pub trait ReservationBackend: Send + Sync {
    async fn confirm_reservation(
        &self,
        session: &SessionCredential,
        reservation_url: &str,
    ) -> Result<(), AttemptError>;
}

// ============================================================================
// Wire types
// ============================================================================

/// Every WebDriver response wraps its payload in `value`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSession {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Cookie<'a> {
    name: &'a str,
    value: &'a str,
    domain: &'a str,
    path: &'a str,
    http_only: bool,
}

#[derive(Debug, Serialize)]
struct FindElement<'a> {
    using: &'a str,
    value: &'a str,
}

/// Failure of one WebDriver command
#[derive(Debug)]
enum CommandError {
    Transport(reqwest::Error),
    Remote { error: String, message: String },
    Decode(String),
}

impl CommandError {
    /// Errors that may clear up while the page is still loading
    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Remote { error, .. } if matches!(
                error.as_str(),
                "no such element" | "element not interactable" | "element click intercepted" | "stale element reference"
            )
        )
    }
}

impl From<CommandError> for AttemptError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Transport(e) => AttemptError::Http(e),
            CommandError::Remote { error, message } => {
                AttemptError::WebDriver(format!("{error}: {message}"))
            }
            CommandError::Decode(msg) => AttemptError::WebDriver(msg),
        }
    }
}

// ============================================================================
// WebDriver backend
// ============================================================================

/// Reservation backend driving a WebDriver remote end
pub struct WebDriverReservation {
    client: Client,
    endpoint: String,
    site_root: String,
    cookie_domain: String,
    capabilities: Value,
    step_wait: Duration,
    poll_interval: Duration,
}

impl WebDriverReservation {
    /// Create a backend from the run configuration
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Http` if the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self, AttemptError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.webdriver.step_wait_secs.max(1) * 3))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.webdriver.url.trim_end_matches('/').to_string(),
            site_root: format!("{}/", config.site.base_url.trim_end_matches('/')),
            cookie_domain: config.site.cookie_domain.clone(),
            capabilities: chrome_capabilities(
                config.webdriver.headless,
                &config.webdriver.window_size,
                &config.crawler.user_agent,
            ),
            step_wait: Duration::from_secs(config.webdriver.step_wait_secs),
            poll_interval: Duration::from_millis(250),
        })
    }

    /// Override the per-element wait
    #[must_use]
    pub fn with_step_wait(mut self, step_wait: Duration, poll_interval: Duration) -> Self {
        self.step_wait = step_wait;
        self.poll_interval = poll_interval;
        self
    }

    async fn command<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, CommandError> {
        let url = format!("{}{path}", self.endpoint);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(CommandError::Transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(CommandError::Transport)?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<Envelope<WireError>>(&bytes) {
                Ok(envelope) => CommandError::Remote {
                    error: envelope.value.error,
                    message: envelope.value.message,
                },
                Err(_) => CommandError::Decode(format!("{path} returned status {status}")),
            });
        }

        serde_json::from_slice::<Envelope<T>>(&bytes)
            .map(|envelope| envelope.value)
            .map_err(|e| CommandError::Decode(format!("unexpected response to {path}: {e}")))
    }

    async fn new_session(&self) -> Result<String, CommandError> {
        let body = json!({ "capabilities": { "alwaysMatch": self.capabilities } });
        let session: NewSession = self.command(Method::POST, "/session", Some(body)).await?;
        Ok(session.session_id)
    }

    async fn navigate(&self, session_id: &str, url: &str) -> Result<(), CommandError> {
        self.command::<Value>(
            Method::POST,
            &format!("/session/{session_id}/url"),
            Some(json!({ "url": url })),
        )
        .await
        .map(|_| ())
    }

    async fn add_session_cookie(
        &self,
        session_id: &str,
        credential: &SessionCredential,
    ) -> Result<(), CommandError> {
        let cookie = Cookie {
            name: SESSION_COOKIE,
            value: credential.token(),
            domain: &self.cookie_domain,
            path: "/",
            http_only: true,
        };

        self.command::<Value>(
            Method::POST,
            &format!("/session/{session_id}/cookie"),
            Some(json!({ "cookie": cookie })),
        )
        .await
        .map(|_| ())
    }

    async fn find_and_click(&self, session_id: &str, selector: &str) -> Result<(), CommandError> {
        let find = FindElement {
            using: "css selector",
            value: selector,
        };
        let element: Value = self
            .command(
                Method::POST,
                &format!("/session/{session_id}/element"),
                Some(json!(find)),
            )
            .await?;

        let element_id = element
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| CommandError::Decode(format!("no element reference for {selector}")))?;

        self.command::<Value>(
            Method::POST,
            &format!("/session/{session_id}/element/{element_id}/click"),
            Some(json!({})),
        )
        .await
        .map(|_| ())
    }

    /// Click `selector` once it is present and interactable, polling up to `step_wait`
    async fn click_when_ready(&self, session_id: &str, selector: &str) -> Result<(), AttemptError> {
        let started = Instant::now();

        loop {
            match self.find_and_click(session_id, selector).await {
                Ok(()) => {
                    tracing::debug!(selector, "Clicked");
                    return Ok(());
                }
                Err(e) if e.is_transient() && started.elapsed() < self.step_wait => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(AttemptError::ElementTimeout {
                        selector: selector.to_string(),
                        waited_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn reserve_in_session(
        &self,
        session_id: &str,
        credential: &SessionCredential,
        reservation_url: &str,
    ) -> Result<(), AttemptError> {
        // Cookies can only be set for the domain currently loaded
        self.navigate(session_id, &self.site_root).await?;
        self.add_session_cookie(session_id, credential).await?;
        self.navigate(session_id, reservation_url).await?;

        self.click_when_ready(session_id, SINGLE_EVENT_BUTTON).await?;
        self.click_when_ready(session_id, PAY_BY_CREDITS_BUTTON).await?;

        Ok(())
    }
}

#[async_trait]
impl ReservationBackend for WebDriverReservation {
    async fn confirm_reservation(
        &self,
        session: &SessionCredential,
        reservation_url: &str,
    ) -> Result<(), AttemptError> {
        url::Url::parse(reservation_url).map_err(|e| AttemptError::InvalidActionUrl {
            url: reservation_url.to_string(),
            reason: e.to_string(),
        })?;

        let session_id = self.new_session().await?;
        tracing::debug!(session_id = %session_id, "WebDriver session started");

        let result = self
            .reserve_in_session(&session_id, session, reservation_url)
            .await;

        if let Err(e) = self
            .command::<Value>(Method::DELETE, &format!("/session/{session_id}"), None)
            .await
        {
            tracing::warn!(session_id = %session_id, error = ?e, "Failed to close WebDriver session");
        }

        result
    }
}

/// Capabilities for a Chrome session
pub fn chrome_capabilities(headless: bool, window_size: &str, user_agent: &str) -> Value {
    let mut args = vec![
        format!("--window-size={window_size}"),
        format!("--user-agent={user_agent}"),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }

    json!({
        "browserName": "chrome",
        "goog:chromeOptions": { "args": args },
    })
}
