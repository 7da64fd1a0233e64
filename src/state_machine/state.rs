use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::job::JobOutcome;

/// Lifecycle of the process-wide provisioning slot.
///
/// `Idle --accept--> Running --finish--> Terminal`
/// `Running --cancel--> CancelRequested --finish--> Terminal(Cancelled)`
///
/// `Terminal` behaves like `Idle` for new requests; it only remembers how the
/// last job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "outcome", rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    CancelRequested,
    Terminal(JobOutcome),
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "IDLE"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::CancelRequested => write!(f, "CANCEL_REQUESTED"),
            JobState::Terminal(outcome) => write!(f, "TERMINAL({outcome})"),
        }
    }
}

/// Inputs to the job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Accept,
    RequestCancel,
    Finish(JobOutcome),
}

/// Why the job state machine refused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("already provisioning")]
    AlreadyProvisioning,
    #[error("not provisioning")]
    NotProvisioning,
    #[error("cancel already requested")]
    CancelAlreadyRequested,
}

impl JobState {
    /// A job currently holds the session.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Running | JobState::CancelRequested)
    }

    /// Compute the state after `event`, or why it is not allowed.
    pub fn next(self, event: JobEvent) -> Result<JobState, Rejection> {
        match (self, event) {
            (JobState::Idle | JobState::Terminal(_), JobEvent::Accept) => Ok(JobState::Running),
            (JobState::Running | JobState::CancelRequested, JobEvent::Accept) => {
                Err(Rejection::AlreadyProvisioning)
            }

            (JobState::Running, JobEvent::RequestCancel) => Ok(JobState::CancelRequested),
            (JobState::CancelRequested, JobEvent::RequestCancel) => {
                Err(Rejection::CancelAlreadyRequested)
            }
            (JobState::Idle | JobState::Terminal(_), JobEvent::RequestCancel) => {
                Err(Rejection::NotProvisioning)
            }

            (JobState::Running | JobState::CancelRequested, JobEvent::Finish(outcome)) => {
                Ok(JobState::Terminal(outcome))
            }
            (JobState::Idle | JobState::Terminal(_), JobEvent::Finish(_)) => {
                Err(Rejection::NotProvisioning)
            }
        }
    }
}
