//! Clients for the external systems the pipeline talks to.
//!
//! Each collaborator sits behind a small async trait so the orchestrator
//! can be exercised against in-memory fakes. The concrete clients are
//! thin request/response wrappers over reqwest.

pub mod anthropic;
pub mod github;
pub mod jira;
pub mod notifier;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{ChangeRef, ChangedFile, GeneratedArtifact, SourceFile, Ticket};

pub use anthropic::AnthropicClient;
pub use github::GitHubClient;
pub use jira::JiraClient;
pub use notifier::{TestRunnerPayload, WebhookNotifier};

/// Tracker queries and best-effort write-back.
#[async_trait]
pub trait TrackerApi: Send + Sync {
    /// Fetch the current candidate batch (bounded page size).
    async fn fetch_candidates(&self) -> Result<Vec<Ticket>>;

    /// Append a comment to a ticket. Best-effort; callers swallow errors.
    async fn append_comment(&self, key: &str, body: &str) -> Result<()>;
}

/// Code-host lookups for a change reference.
#[async_trait]
pub trait CodeHostApi: Send + Sync {
    /// List the files touched by a pull request.
    async fn list_changed_files(&self, change: &ChangeRef) -> Result<Vec<ChangedFile>>;

    /// Fetch current file content; Ok(None) when the file no longer
    /// exists (a normal skip, not an error).
    async fn fetch_file_content(&self, path: &str) -> Result<Option<String>>;
}

/// Test generation for one source file.
#[async_trait]
pub trait GeneratorApi: Send + Sync {
    /// Generate zero or more test artifacts for `file`, with the owning
    /// ticket's text as context.
    async fn generate(&self, file: &SourceFile, ticket_context: &str)
        -> Result<Vec<GeneratedArtifact>>;
}

/// Downstream notification sink. No delivery guarantee: callers log and
/// swallow failures.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn notify(&self, payload: &TestRunnerPayload) -> Result<()>;
}
