//! Bring the router's UI up in a fresh session.
//!
//! Right after a factory reset or a cable swap the router is often not
//! answering yet, so unreachable/timeout navigations are retried on a fixed
//! backoff. Anything else fails the job at once.

use std::time::Duration;

use crate::cancel::Pacer;
use crate::config::Timings;
use crate::error::ProvisionError;
use crate::session::Session;

/// Bounded retry schedule for the first navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self::from(&Timings::default())
    }
}

impl From<&Timings> for ConnectPolicy {
    fn from(timings: &Timings) -> Self {
        Self {
            max_attempts: timings.connect_attempts.max(1),
            attempt_timeout: timings.navigation_timeout(),
            backoff: timings.connect_backoff(),
        }
    }
}

/// Navigate `session` to `url`, returning the attempt that succeeded.
pub async fn connect<S: Session>(
    session: &S,
    url: &str,
    policy: ConnectPolicy,
    pacer: &Pacer,
) -> Result<u32, ProvisionError> {
    let mut attempt = 0;
    loop {
        pacer.checkpoint()?;
        attempt += 1;
        match session.navigate(url, policy.attempt_timeout).await {
            Ok(()) => {
                tracing::info!(url, attempt, "router reachable");
                return Ok(attempt);
            }
            Err(e) if e.is_transient() => {
                if attempt >= policy.max_attempts {
                    tracing::error!(url, attempt, error = %e, "giving up on router");
                    return Err(ProvisionError::Connectivity(format!(
                        "no answer from {url} after {attempt} attempts ({e})"
                    )));
                }
                tracing::debug!(url, attempt, error = %e, "router not answering yet");
                pacer.sleep(policy.backoff).await?;
            }
            Err(e) => {
                tracing::error!(url, attempt, error = %e, "navigation failed");
                return Err(ProvisionError::Connectivity(e.to_string()));
            }
        }
    }
}
