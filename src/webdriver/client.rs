use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use tokio::time::Instant;

use super::error::WebDriverError;
use super::types::{BrowserOptions, Locator, NewSession, WireError, WireResponse};
use super::types::{element_arg, element_id};
use crate::session::{Session, SessionError, SessionProvider};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const IDLE_QUIET_PERIOD: Duration = Duration::from_millis(500);
const READY_STATE: &str = "return document.readyState";
const RESOURCE_COUNT: &str = "return performance.getEntriesByType('resource').length";
const TEXT_CONTENT: &str = "return arguments[0].textContent";

/// Driver errors worth retrying while an element animates into place.
const RETRYABLE_ACTION_ERRORS: [&str; 3] = [
    "element click intercepted",
    "element not interactable",
    "stale element reference",
];

/// Opens browser sessions on a W3C WebDriver server (chromedriver).
pub struct WebDriver {
    client: Client,
    base_url: String,
    options: BrowserOptions,
    action_timeout: Duration,
}

impl WebDriver {
    /// Create a provider for the driver listening at `base_url`.
    pub fn with_base_url(base_url: String, options: BrowserOptions, action_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            options,
            action_timeout,
        }
    }

    async fn new_session(&self) -> Result<WebDriverSession, WebDriverError> {
        let url = format!("{}/session", self.base_url);
        let value = send(&self.client, Method::POST, &url, Some(self.options.capabilities())).await?;
        let created: NewSession = serde_json::from_value(value)
            .map_err(|e| WebDriverError::Protocol(format!("unexpected new session reply: {e}")))?;
        tracing::debug!(session_id = %created.session_id, "browser session opened");
        Ok(WebDriverSession {
            client: self.client.clone(),
            url: format!("{}/session/{}", self.base_url, created.session_id),
            action_timeout: self.action_timeout,
        })
    }
}

impl SessionProvider for WebDriver {
    type Session = WebDriverSession;

    async fn open(&self) -> Result<WebDriverSession, SessionError> {
        Ok(self.new_session().await?)
    }
}

/// One browser window driven over the W3C protocol.
pub struct WebDriverSession {
    client: Client,
    url: String,
    action_timeout: Duration,
}

impl WebDriverSession {
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, WebDriverError> {
        let url = format!("{}{}", self.url, path);
        send(&self.client, method, &url, body).await
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<String>, WebDriverError> {
        let locator = Locator::parse(selector);
        let value = self
            .command(Method::POST, "/elements", Some(json!(locator)))
            .await?;
        let elements = value
            .as_array()
            .ok_or_else(|| WebDriverError::Protocol("find elements did not return a list".into()))?;
        Ok(elements.iter().filter_map(element_id).collect())
    }

    async fn displayed(&self, element: &str) -> Result<bool, WebDriverError> {
        match self
            .command(Method::GET, &format!("/element/{element}/displayed"), None)
            .await
        {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(WebDriverError::Command { error, .. }) if error == "stale element reference" => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// First element matching `selector` that is displayed, sampled once.
    async fn first_displayed(&self, selector: &str) -> Result<Option<String>, WebDriverError> {
        for element in self.find_all(selector).await? {
            if self.displayed(&element).await? {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    /// Poll until an element matching `selector` shows up, displayed if
    /// `visible` is set.
    async fn wait_for_element(&self, selector: &str, visible: bool) -> Result<String, SessionError> {
        let deadline = Instant::now() + self.action_timeout;
        loop {
            let found = if visible {
                self.first_displayed(selector).await?
            } else {
                self.find_all(selector).await?.into_iter().next()
            };
            if let Some(element) = found {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Timeout(format!(
                    "waiting for `{selector}` after {}ms",
                    self.action_timeout.as_millis()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Run `action` on a visible element, retrying while something covers it.
    async fn act(&self, selector: &str, action: &str, body: Value) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.action_timeout;
        loop {
            let element = self.wait_for_element(selector, true).await?;
            match self
                .command(
                    Method::POST,
                    &format!("/element/{element}/{action}"),
                    Some(body.clone()),
                )
                .await
            {
                Ok(_) => return Ok(()),
                Err(WebDriverError::Command { error, .. })
                    if RETRYABLE_ACTION_ERRORS.contains(&error.as_str())
                        && Instant::now() < deadline =>
                {
                    tracing::debug!(selector, action, %error, "retrying element action");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, WebDriverError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }
}

impl Session for WebDriverSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), SessionError> {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.command(Method::POST, "/timeouts", Some(json!({ "pageLoad": millis })))
            .await?;
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, SessionError> {
        Ok(self.first_displayed(selector).await?.is_some())
    }

    async fn is_checked(&self, selector: &str) -> Result<bool, SessionError> {
        let element = self.wait_for_element(selector, false).await?;
        let value = self
            .command(Method::GET, &format!("/element/{element}/selected"), None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), SessionError> {
        self.act(selector, "clear", json!({})).await?;
        self.act(selector, "value", json!({ "text": text })).await
    }

    async fn click(&self, selector: &str) -> Result<(), SessionError> {
        self.act(selector, "click", json!({})).await
    }

    async fn click_role(&self, role: &str, name: &str) -> Result<(), SessionError> {
        self.click(&Locator::role(role, name).value).await
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> Result<Value, SessionError> {
        Ok(self.execute(script, args).await?)
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>, SessionError> {
        let element = match self.wait_for_element(selector, false).await {
            Ok(element) => element,
            Err(SessionError::Timeout(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let value = self.execute(TEXT_CONTENT, vec![element_arg(&element)]).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        let value = self.command(Method::GET, "/screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| WebDriverError::Protocol("screenshot is not a string".into()))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| SessionError::Backend(format!("invalid screenshot encoding: {e}")))
    }

    async fn wait_for_load(&self) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.action_timeout;
        loop {
            let state = self.execute(READY_STATE, Vec::new()).await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Timeout("document never finished loading".into()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_idle(&self) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.action_timeout;
        let mut last = self.execute(RESOURCE_COUNT, Vec::new()).await?;
        let mut quiet_since = Instant::now();
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            let count = self.execute(RESOURCE_COUNT, Vec::new()).await?;
            if count != last {
                last = count;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= IDLE_QUIET_PERIOD {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SessionError::Timeout("network never went idle".into()));
            }
        }
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.command(Method::DELETE, "", None).await?;
        tracing::debug!("browser session closed");
        Ok(())
    }
}

/// Send one command and unwrap the `value` envelope.
async fn send(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, WebDriverError> {
    let mut request = client.request(method.clone(), url);
    if method == Method::POST {
        request = request.json(&body.unwrap_or_else(|| json!({})));
    }
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    let envelope: WireResponse = serde_json::from_str(&text).map_err(|e| {
        WebDriverError::Protocol(format!("status {}: {e}: {text}", status.as_u16()))
    })?;

    if !status.is_success() {
        let wire: WireError = serde_json::from_value(envelope.value).map_err(|_| {
            WebDriverError::Protocol(format!("status {} without error body", status.as_u16()))
        })?;
        return Err(WebDriverError::Command {
            status: status.as_u16(),
            error: wire.error,
            message: wire.message,
        });
    }
    Ok(envelope.value)
}
