//! The UI automation capability the provisioning workflow drives.
//!
//! [`Session`] is the only thing the workflow knows about the browser: a
//! handful of queries and actions against the router's web UI. The shipped
//! implementation lives in [`crate::webdriver`]; tests use [`fake`].

#[cfg(test)]
pub mod fake;

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Failures reported by an automation session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The target address could not be reached (no route, link down).
    #[error("address unreachable: {0}")]
    AddressUnreachable(String),

    /// A navigation or wait ran past its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// No element matched the selector.
    #[error("no element matches `{0}`")]
    NoSuchElement(String),

    /// The automation backend rejected a command.
    #[error("{code}: {message}")]
    Command { code: String, message: String },

    /// The automation backend itself could not be talked to.
    #[error("automation backend unavailable: {0}")]
    Backend(String),
}

impl SessionError {
    /// Whether a failed navigation is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::AddressUnreachable(_) | SessionError::Timeout(_)
        )
    }
}

/// A live handle on the router's web UI.
///
/// Selectors that start with `//` or `(` are XPath expressions; anything
/// else is a CSS selector.
pub trait Session: Send + Sync {
    /// Load `url`, giving up after `timeout`.
    fn navigate(
        &self,
        url: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Whether an element matching `selector` exists and is displayed.
    /// Samples once, never waits.
    fn is_visible(&self, selector: &str) -> impl Future<Output = Result<bool, SessionError>> + Send;

    fn is_hidden(&self, selector: &str) -> impl Future<Output = Result<bool, SessionError>> + Send {
        async move { Ok(!self.is_visible(selector).await?) }
    }

    /// Whether the checkbox/radio matching `selector` is checked.
    fn is_checked(&self, selector: &str) -> impl Future<Output = Result<bool, SessionError>> + Send;

    /// Replace the value of an input.
    fn fill(&self, selector: &str, text: &str)
    -> impl Future<Output = Result<(), SessionError>> + Send;

    fn click(&self, selector: &str) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Click the element exposing the accessible `role` with the given name,
    /// e.g. `("button", "Yes")`.
    fn click_role(
        &self,
        role: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Run `script` in the page with positional `args` and return its result.
    fn evaluate(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<Value, SessionError>> + Send;

    /// Text content of the first element matching `selector`, if any.
    fn text_content(
        &self,
        selector: &str,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;

    /// PNG bytes of the current viewport.
    fn screenshot(&self) -> impl Future<Output = Result<Vec<u8>, SessionError>> + Send;

    /// Wait until the current document has finished loading.
    fn wait_for_load(&self) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Wait until the page stops issuing network requests.
    fn wait_for_idle(&self) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Release the session. Called exactly once per job.
    fn close(&self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Opens fresh [`Session`]s, one per job.
pub trait SessionProvider: Send + Sync + 'static {
    type Session: Session + 'static;

    fn open(&self) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;
}
