//! Single-flight job coordinator.
//!
//! At most one job owns a browser session at a time. [`JobCoordinator`]
//! guards the [`JobState`] slot, hands the shared [`CancelSignal`] to the
//! running job and publishes its progress through one [`StatusPublisher`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::FutureExt;
use reqwest::Url;
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use crate::cancel::{CancelSignal, Pacer};
use crate::config::Timings;
use crate::error::{ErrorKind, ProvisionError};
use crate::establish::{self, ConnectPolicy};
use crate::session::{Session, SessionProvider};
use crate::state_machine::{
    JobEvent, JobOutcome, JobPlan, JobReport, JobState, Rejection, Stage, StageQueue,
};
use crate::status::{Notifier, Screenshot, StatusEvent, StatusPublisher, Subscription};
use crate::workflow::Workflow;

/// A job accepted by [`JobCoordinator::submit`].
pub struct JobHandle {
    pub id: Uuid,
    task: JoinHandle<JobReport>,
}

impl JobHandle {
    /// Wait for the job to reach a terminal state.
    pub async fn wait(self) -> Result<JobReport, JoinError> {
        self.task.await
    }
}

pub struct JobCoordinator<P: SessionProvider> {
    provider: P,
    router_url: String,
    timings: Timings,
    state: Mutex<JobState>,
    cancel: CancelSignal,
    status: StatusPublisher,
}

impl<P: SessionProvider> JobCoordinator<P> {
    pub fn new(provider: P, router_url: impl Into<String>, timings: Timings, notifier: Notifier) -> Self {
        Self {
            provider,
            router_url: router_url.into(),
            timings,
            state: Mutex::new(JobState::Idle),
            cancel: CancelSignal::new(),
            status: StatusPublisher::new(notifier),
        }
    }

    /// Accept `plan` if no job is active and start it in the background.
    /// Progress is also POSTed to `notify` when given.
    pub fn submit(self: &Arc<Self>, plan: JobPlan, notify: Option<Url>) -> Result<JobHandle, Rejection> {
        {
            let mut state = self.lock_state();
            *state = state.next(JobEvent::Accept)?;
            self.cancel.clear();
            self.status.begin(notify);
        }

        let id = Uuid::new_v4();
        tracing::info!(job_id = %id, kind = plan.name(), "job accepted");
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.run(id, plan).await });
        Ok(JobHandle { id, task })
    }

    /// Ask the running job to stop at its next suspension point.
    pub fn cancel(&self) -> Result<(), Rejection> {
        let mut state = self.lock_state();
        *state = state.next(JobEvent::RequestCancel)?;
        self.cancel.request();
        tracing::info!("cancellation requested");
        Ok(())
    }

    pub fn state(&self) -> JobState {
        *self.lock_state()
    }

    pub fn current_status(&self) -> Option<StatusEvent> {
        self.status.latest()
    }

    pub fn subscribe(&self) -> Subscription {
        self.status.subscribe()
    }

    async fn run(&self, id: Uuid, plan: JobPlan) -> JobReport {
        let started_at = Utc::now();
        let mut finish = Finish::new(&self.state, &self.cancel);

        let planned = plan.stages();
        let mut queue = planned.clone();
        let (result, screenshot) = self.drive(&plan, &mut queue).await;

        let (outcome, completed, error) = match result {
            Ok(completed) => {
                self.status.progress("Success", 100);
                self.status.publish(StatusEvent::Success);
                tracing::info!(job_id = %id, "job succeeded");
                (JobOutcome::Success, completed, None)
            }
            Err(e) => {
                let kind = e.kind();
                let done = planned.len().saturating_sub(queue.len());
                let completed: Vec<Stage> = planned.iter().take(done).collect();
                if matches!(e, ProvisionError::Cancelled) {
                    tracing::warn!(job_id = %id, "job cancelled");
                } else {
                    tracing::error!(job_id = %id, %kind, error = %e, "job failed");
                }
                self.status.publish(StatusEvent::Error {
                    message: e.to_string(),
                    kind,
                    diagnostic_image: screenshot,
                });
                (JobOutcome::from(kind), completed, Some(e.to_string()))
            }
        };

        // Drop the target before the slot opens for the next job.
        self.status.end();
        finish.outcome = outcome;
        drop(finish);
        JobReport::new(id, &plan, started_at, outcome, completed, error)
    }

    /// Open a session, run the plan in it and always close it again.
    async fn drive(
        &self,
        plan: &JobPlan,
        queue: &mut StageQueue,
    ) -> (Result<Vec<Stage>, ProvisionError>, Option<Screenshot>) {
        let pacer = Pacer::new(self.cancel.clone());
        self.status.progress("Opening browser", 0);
        let session = match self.provider.open().await {
            Ok(session) => session,
            Err(e) => return (Err(e.into()), None),
        };

        let result = AssertUnwindSafe(self.steps(&session, &pacer, plan, queue))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ProvisionError::Fault(panic_message(panic.as_ref()))));

        let screenshot = match &result {
            Err(e) if e.wants_screenshot() => match session.screenshot().await {
                Ok(bytes) => Some(Screenshot(bytes)),
                Err(err) => {
                    tracing::warn!(error = %err, "could not capture diagnostic screenshot");
                    None
                }
            },
            _ => None,
        };

        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "failed to close session");
        }
        (result, screenshot)
    }

    async fn steps<S: Session>(
        &self,
        session: &S,
        pacer: &Pacer,
        plan: &JobPlan,
        queue: &mut StageQueue,
    ) -> Result<Vec<Stage>, ProvisionError> {
        self.status.progress("Connecting to router", 1);
        let policy = ConnectPolicy::from(&self.timings);
        let attempts = establish::connect(session, &self.router_url, policy, pacer).await?;
        tracing::debug!(attempts, "session established");

        Workflow::new(
            session,
            pacer,
            &self.status,
            &self.timings,
            plan.credentials(),
            plan.request(),
        )
        .run(queue)
        .await
    }

    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Returns the slot to a terminal state on every exit path, including an
/// aborted task.
struct Finish<'a> {
    state: &'a Mutex<JobState>,
    cancel: &'a CancelSignal,
    outcome: JobOutcome,
}

impl<'a> Finish<'a> {
    /// Until the run sets a real outcome, an early exit counts as an
    /// unclassified failure.
    fn new(state: &'a Mutex<JobState>, cancel: &'a CancelSignal) -> Self {
        Self {
            state,
            cancel,
            outcome: JobOutcome::Failed(ErrorKind::Unclassified),
        }
    }
}

impl Drop for Finish<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = state
            .next(JobEvent::Finish(self.outcome))
            .unwrap_or(JobState::Terminal(self.outcome));
        self.cancel.clear();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "workflow panicked".to_string()
    }
}
