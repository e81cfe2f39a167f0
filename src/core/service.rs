//! Lock-guarded entry points for the pipeline.
//!
//! Every trigger source (cron cadences, manual HTTP/CLI) funnels through
//! here. The lock is released on every exit path of a pass; a pass that
//! never reaches release (process-level fault, hung task) is recovered by
//! the staleness override in the lock itself.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::domain::PassOutcome;

use super::lock::{LockStatus, PassLock};
use super::orchestrator::Orchestrator;

/// Owner id used for on-demand triggers.
pub const MANUAL_OWNER: &str = "manual";

/// Result of an on-demand trigger request. Pass outcomes are not reported
/// here; they surface later through the store's read side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Lock acquired, pass started in the background
    Accepted,

    /// A pass is already in progress
    AlreadyRunning,
}

/// The single-flight pipeline service.
pub struct PipelineService {
    orchestrator: Orchestrator,
    lock: PassLock,
}

impl PipelineService {
    pub fn new(orchestrator: Orchestrator, max_hold: Duration) -> Self {
        Self {
            orchestrator,
            lock: PassLock::new(max_hold),
        }
    }

    /// Lock snapshot for the control surface.
    pub fn lock_status(&self) -> LockStatus {
        self.lock.status()
    }

    /// Entry point for scheduled trigger firings.
    ///
    /// Returns None when the lock is held (an expected, harmless no-op:
    /// the next firing picks up whatever this one would have) or when the
    /// pass itself failed before producing an outcome.
    pub async fn scheduled_pass(&self, owner: &str) -> Option<PassOutcome> {
        if !self.lock.try_acquire(owner) {
            info!(owner, "Previous pass still running, skipping this firing");
            return None;
        }

        self.run_and_release(owner).await
    }

    /// Entry point for the on-demand trigger: acquire-or-reject, then run
    /// the pass in a background task.
    pub fn trigger_now(self: Arc<Self>) -> TriggerDecision {
        if !self.lock.try_acquire(MANUAL_OWNER) {
            return TriggerDecision::AlreadyRunning;
        }

        tokio::spawn(async move {
            self.run_and_release(MANUAL_OWNER).await;
        });

        TriggerDecision::Accepted
    }

    /// Run one pass and release the lock on every exit path.
    async fn run_and_release(&self, owner: &str) -> Option<PassOutcome> {
        let result = self.orchestrator.run_pass().await;
        self.lock.release(owner);

        match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(owner, error = format!("{:#}", e), "Pass failed");
                None
            }
        }
    }
}
