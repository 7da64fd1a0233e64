use thiserror::Error;

use crate::session::SessionError;

/// Everything that can end a provisioning job early.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Navigation failed for good, or transient failures exhausted the retry bound.
    #[error("Cannot connect to router: {0}")]
    Connectivity(String),

    /// Every configured password was rejected by the login screen.
    #[error("Invalid password")]
    Authentication,

    /// None of the known page markers matched.
    #[error("Unknown page while trying to log in")]
    UnrecognizedPage,

    /// Cooperative cancellation was observed at a suspension point.
    #[error("Provisioning cancelled")]
    Cancelled,

    #[error("Busy overlay still shown after {waited_ms}ms")]
    OverlayTimeout { waited_ms: u64 },

    /// A stage was queued without the settings it needs.
    #[error("{0} stage requires device settings")]
    MissingSettings(crate::state_machine::Stage),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// A panic escaped the workflow.
    #[error("Unexpected fault: {0}")]
    Fault(String),
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvisionError::Connectivity(_) => ErrorKind::Connectivity,
            ProvisionError::Authentication => ErrorKind::Authentication,
            ProvisionError::UnrecognizedPage => ErrorKind::UnrecognizedPage,
            ProvisionError::Cancelled => ErrorKind::Cancelled,
            ProvisionError::OverlayTimeout { .. }
            | ProvisionError::MissingSettings(_)
            | ProvisionError::Session(_)
            | ProvisionError::Fault(_) => ErrorKind::Unclassified,
        }
    }

    /// Whether a diagnostic screenshot is worth capturing for this failure.
    pub fn wants_screenshot(&self) -> bool {
        !matches!(
            self,
            ProvisionError::Cancelled | ProvisionError::Connectivity(_)
        )
    }
}

/// Classifies a terminal failure for status consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connectivity,
    Authentication,
    UnrecognizedPage,
    /// Not a failure of the device; kept apart in diagnostics.
    Cancelled,
    Unclassified,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Connectivity => write!(f, "connectivity"),
            ErrorKind::Authentication => write!(f, "authentication"),
            ErrorKind::UnrecognizedPage => write!(f, "unrecognized page"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::Unclassified => write!(f, "unclassified"),
        }
    }
}
