//! Cooperative cancellation.
//!
//! The workflow never gets preempted; instead every suspension point goes
//! through a [`Pacer`], which samples the shared [`CancelSignal`] before
//! and after waiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::ProvisionError;
use crate::session::Session;

/// Process-wide cancellation flag shared between the coordinator and the
/// running job.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

/// Suspension points of a running job.
#[derive(Debug, Clone)]
pub struct Pacer {
    signal: CancelSignal,
}

impl Pacer {
    pub fn new(signal: CancelSignal) -> Self {
        Self { signal }
    }

    /// Fail with [`ProvisionError::Cancelled`] if cancellation was requested.
    /// A positive sample consumes the request.
    pub fn checkpoint(&self) -> Result<(), ProvisionError> {
        if self.signal.take() {
            tracing::info!("cancellation observed");
            return Err(ProvisionError::Cancelled);
        }
        Ok(())
    }

    pub async fn sleep(&self, duration: Duration) -> Result<(), ProvisionError> {
        self.checkpoint()?;
        tokio::time::sleep(duration).await;
        self.checkpoint()
    }

    /// Wait for navigation to finish and the network to go quiet.
    pub async fn settle<S: Session>(&self, session: &S) -> Result<(), ProvisionError> {
        self.checkpoint()?;
        session.wait_for_load().await?;
        self.checkpoint()?;
        session.wait_for_idle().await?;
        self.checkpoint()
    }
}
