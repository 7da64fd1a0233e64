use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::{Stage, StageQueue};
use crate::error::ErrorKind;
use crate::request::{Credentials, ProvisioningRequest};

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Success,
    Failed(ErrorKind),
    Cancelled,
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOutcome::Success => write!(f, "success"),
            JobOutcome::Failed(kind) => write!(f, "failed ({kind})"),
            JobOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<ErrorKind> for JobOutcome {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Cancelled => JobOutcome::Cancelled,
            other => JobOutcome::Failed(other),
        }
    }
}

/// What a job is asked to do.
#[derive(Debug, Clone)]
pub enum JobPlan {
    /// The default first-run configuration.
    Provision(ProvisioningRequest),
    /// Log in and restore factory defaults.
    FactoryReset(Credentials),
}

impl JobPlan {
    pub fn stages(&self) -> StageQueue {
        match self {
            JobPlan::Provision(_) => StageQueue::default(),
            JobPlan::FactoryReset(_) => StageQueue::factory_reset(),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        match self {
            JobPlan::Provision(request) => &request.credentials,
            JobPlan::FactoryReset(credentials) => credentials,
        }
    }

    pub fn request(&self) -> Option<&ProvisioningRequest> {
        match self {
            JobPlan::Provision(request) => Some(request),
            JobPlan::FactoryReset(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobPlan::Provision(_) => "provision",
            JobPlan::FactoryReset(_) => "factory_reset",
        }
    }
}

/// Summary produced when a job reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub kind: String,
    pub outcome: JobOutcome,
    pub completed_stages: Vec<Stage>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobReport {
    pub fn new(
        job_id: Uuid,
        plan: &JobPlan,
        started_at: DateTime<Utc>,
        outcome: JobOutcome,
        completed_stages: Vec<Stage>,
        error: Option<String>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            job_id,
            kind: plan.name().to_string(),
            outcome,
            completed_stages,
            error,
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        }
    }
}
