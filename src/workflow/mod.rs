//! Page-state workflow engine.
//!
//! [`Workflow::run`] pops stages off a [`StageQueue`]: before every pass it
//! lets the UI settle and samples cancellation, then hands the head stage to
//! its handler. A handler answers `true` when the stage is finished and
//! `false` when it moved the UI forward but more screens of the same stage
//! remain (the login wizard).

mod login;
mod management;
mod network;
pub mod widgets;

use crate::cancel::Pacer;
use crate::config::Timings;
use crate::error::ProvisionError;
use crate::request::{Credentials, ProvisioningRequest};
use crate::session::Session;
use crate::state_machine::{Stage, StageQueue};
use crate::status::StatusPublisher;
use widgets::OverlayPolling;

pub struct Workflow<'a, S: Session> {
    session: &'a S,
    pacer: &'a Pacer,
    status: &'a StatusPublisher,
    timings: &'a Timings,
    credentials: &'a Credentials,
    /// Absent for jobs that only log in and reset.
    request: Option<&'a ProvisioningRequest>,
}

impl<'a, S: Session> Workflow<'a, S> {
    pub fn new(
        session: &'a S,
        pacer: &'a Pacer,
        status: &'a StatusPublisher,
        timings: &'a Timings,
        credentials: &'a Credentials,
        request: Option<&'a ProvisioningRequest>,
    ) -> Self {
        Self {
            session,
            pacer,
            status,
            timings,
            credentials,
            request,
        }
    }

    /// Drive `queue` until it is empty. On success returns the stages in the
    /// order they completed; on error `queue` still holds the failed stage.
    pub async fn run(&self, queue: &mut StageQueue) -> Result<Vec<Stage>, ProvisionError> {
        let mut completed = Vec::with_capacity(queue.len());
        while let Some(stage) = queue.head() {
            self.pacer.settle(self.session).await?;
            let done = self.run_stage(stage).await?;
            if let Some(finished) = queue.advance(done) {
                tracing::info!(stage = %finished, "stage complete");
                completed.push(finished);
            } else {
                tracing::debug!(%stage, "stage needs another pass");
            }
        }
        Ok(completed)
    }

    async fn run_stage(&self, stage: Stage) -> Result<bool, ProvisionError> {
        match stage {
            Stage::Login => self.login().await,
            Stage::Hostname => self.set_hostname().await,
            Stage::WiFi => self.set_wifi().await,
            Stage::Admin => self.set_admin().await,
            Stage::Reset => self.factory_reset().await,
        }
    }

    fn overlay(&self) -> OverlayPolling {
        OverlayPolling::from(self.timings)
    }
}
