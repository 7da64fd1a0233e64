use std::time::Duration;

use reqwest::{Client, Url};

use super::StatusEvent;

/// Best-effort side channel that POSTs status events to a caller-supplied URL.
///
/// Deliveries are not retried, not ordered, and never block the job.
#[derive(Clone)]
pub struct Notifier {
    client: Client,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }

    /// Send `event` in the background. Failures are only logged.
    pub fn deliver(&self, target: Url, event: StatusEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(%target, "no runtime, notification dropped");
            return;
        };
        let notifier = self.clone();
        runtime.spawn(async move {
            if let Err(e) = notifier.send(&target, &event).await {
                tracing::warn!(%target, error = %e, "status notification failed");
            }
        });
    }

    pub async fn send(&self, target: &Url, event: &StatusEvent) -> Result<(), reqwest::Error> {
        self.client
            .post(target.clone())
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
