//! testsmith - ticket-driven AI test generation service
//!
//! Periodically discovers QA tickets from the tracker, derives the pull
//! request each one references, and generates unit tests for the changed
//! files via an AI model. Progress is recorded durably so every ticket is
//! handled at most once across repeated passes.
//!
//! # Architecture
//!
//! Trigger sources (cron cadences plus a manual endpoint) funnel into a
//! single-flight lock; the lock admits one pipeline pass at a time and
//! force-clears a holder that exceeds the maximum hold duration. The pass
//! itself walks the candidate batch with per-ticket failure isolation and
//! writes its durable record before any notification goes out.
//!
//! # Modules
//!
//! - `adapters`: External system clients (Jira, GitHub, Anthropic, webhook)
//! - `core`: Orchestration (lock, orchestrator, service, scheduler, store,
//!   cleanup)
//! - `domain`: Data structures (Ticket, ChangeRef, artifacts, outcomes)
//! - `server`: HTTP front end over the control surface
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the service
//! testsmith serve
//!
//! # Process the current batch once
//! testsmith run
//!
//! # Inspect processed tickets
//! testsmith tickets --limit 20
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;

// Re-export main types at crate root for convenience
pub use crate::config::Config;
pub use crate::core::{Orchestrator, PassLock, PipelineService, TicketStore, TriggerDecision};
pub use crate::domain::{ChangeRef, PassOutcome, Ticket, TicketDisposition};
