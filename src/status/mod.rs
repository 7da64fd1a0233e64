//! Push channel for job progress.
//!
//! [`StatusPublisher`] fans every [`StatusEvent`] out to in-process
//! subscribers over a `tokio` broadcast channel, remembers the latest event
//! for late joiners, and mirrors events to the job's notification target
//! through the best-effort [`Notifier`].

mod notify;

pub use notify::Notifier;

use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use serde::{Serialize, Serializer};
use tokio::sync::broadcast;

use crate::error::ErrorKind;

const CHANNEL_CAPACITY: usize = 64;

/// PNG captured when a job failed. Serialized as base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot(pub Vec<u8>);

impl Screenshot {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl Serialize for Screenshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

/// One update on the status channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// `percent` orders stages; it may repeat within a stage.
    Progress { label: String, percent: u8 },
    Error {
        message: String,
        kind: ErrorKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        diagnostic_image: Option<Screenshot>,
    },
    /// Terminal success, always at 100%.
    Success,
}

/// What a new subscriber starts from.
pub struct Subscription {
    /// Latest event published before subscribing, if any.
    pub snapshot: Option<StatusEvent>,
    pub receiver: broadcast::Receiver<StatusEvent>,
}

struct Shared {
    latest: Option<StatusEvent>,
    percent: u8,
    target: Option<Url>,
}

pub struct StatusPublisher {
    shared: Mutex<Shared>,
    sender: broadcast::Sender<StatusEvent>,
    notifier: Notifier,
}

impl StatusPublisher {
    pub fn new(notifier: Notifier) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            shared: Mutex::new(Shared {
                latest: None,
                percent: 0,
                target: None,
            }),
            sender,
            notifier,
        }
    }

    /// Start a new job: reset the percent and set (or clear) its
    /// notification target.
    pub fn begin(&self, target: Option<Url>) {
        let mut shared = self.lock();
        shared.percent = 0;
        shared.target = target;
    }

    /// Drop the job's notification target.
    pub fn end(&self) {
        self.lock().target = None;
    }

    #[cfg(test)]
    pub fn target(&self) -> Option<Url> {
        self.lock().target.clone()
    }

    /// Publish a progress step at `percent`.
    pub fn progress(&self, label: &str, percent: u8) {
        let percent = percent.min(100);
        self.lock().percent = percent;
        self.publish(StatusEvent::Progress {
            label: label.to_string(),
            percent,
        });
    }

    /// Publish a progress step at the last reported percent.
    pub fn step(&self, label: &str) {
        let percent = self.lock().percent;
        self.progress(label, percent);
    }

    pub fn publish(&self, event: StatusEvent) {
        let target = {
            let mut shared = self.lock();
            shared.latest = Some(event.clone());
            // No receivers is fine; late joiners read `latest`.
            let _ = self.sender.send(event.clone());
            shared.target.clone()
        };
        if let Some(target) = target {
            self.notifier.deliver(target, event);
        }
    }

    pub fn latest(&self) -> Option<StatusEvent> {
        self.lock().latest.clone()
    }

    pub fn subscribe(&self) -> Subscription {
        let shared = self.lock();
        Subscription {
            snapshot: shared.latest.clone(),
            receiver: self.sender.subscribe(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        // The guarded data stays consistent even if a holder panicked.
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn publisher() -> StatusPublisher {
        StatusPublisher::new(Notifier::new())
    }

    #[test]
    fn late_subscriber_gets_latest_snapshot_only() {
        let status = publisher();
        status.progress("Connecting to router", 1);
        status.progress("Log in", 10);

        let mut sub = status.subscribe();
        assert_eq!(
            sub.snapshot,
            Some(StatusEvent::Progress {
                label: "Log in".into(),
                percent: 10
            })
        );
        assert!(sub.receiver.try_recv().is_err());

        status.step("Logged in");
        assert_eq!(
            sub.receiver.try_recv().unwrap(),
            StatusEvent::Progress {
                label: "Logged in".into(),
                percent: 10
            }
        );
    }

    #[test]
    fn all_subscribers_receive_events() {
        let status = publisher();
        let mut first = status.subscribe();
        let mut second = status.subscribe();
        assert!(first.snapshot.is_none());

        status.publish(StatusEvent::Success);
        assert_eq!(first.receiver.try_recv().unwrap(), StatusEvent::Success);
        assert_eq!(second.receiver.try_recv().unwrap(), StatusEvent::Success);
    }

    #[test]
    fn begin_resets_percent() {
        let status = publisher();
        status.progress("Go to admin", 80);
        status.begin(None);
        status.step("Opening browser");
        assert_eq!(
            status.latest(),
            Some(StatusEvent::Progress {
                label: "Opening browser".into(),
                percent: 0
            })
        );
    }

    #[test]
    fn percent_is_capped() {
        let status = publisher();
        status.progress("Skip quick setup", 130);
        assert!(matches!(
            status.latest(),
            Some(StatusEvent::Progress { percent: 100, .. })
        ));
    }

    #[test]
    fn event_wire_format() {
        let progress = StatusEvent::Progress {
            label: "Set hostname".into(),
            percent: 40,
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({"type": "progress", "label": "Set hostname", "percent": 40})
        );

        let error = StatusEvent::Error {
            message: "Invalid password".into(),
            kind: ErrorKind::Authentication,
            diagnostic_image: Some(Screenshot(b"png".to_vec())),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({
                "type": "error",
                "message": "Invalid password",
                "kind": "authentication",
                "diagnostic_image": "cG5n"
            })
        );

        assert_eq!(
            serde_json::to_value(StatusEvent::Success).unwrap(),
            json!({"type": "success"})
        );
    }
}
