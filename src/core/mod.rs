//! Orchestration core: single-flight locking, the batch pipeline, trigger
//! wiring, the durable ticket store, and the retention sweep.

pub mod cleanup;
pub mod lock;
pub mod orchestrator;
pub mod scheduler;
pub mod service;
pub mod store;

pub use cleanup::{FileCleanup, SweepStats};
pub use lock::{LockStatus, PassLock, DEFAULT_MAX_HOLD};
pub use orchestrator::Orchestrator;
pub use scheduler::{
    is_valid_cron, Schedules, TriggerSet, TriggerSummary, DEFAULT_OFF_HOURS, DEFAULT_WORK_HOURS,
};
pub use service::{PipelineService, TriggerDecision, MANUAL_OWNER};
pub use store::{ArtifactRow, SeenTicket, StoreError, TicketStore};
