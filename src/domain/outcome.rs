//! Terminal per-ticket dispositions and the per-pass aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal disposition of a processed ticket.
///
/// Every disposition is recorded durably; a ticket that reached any of
/// these is never reprocessed. A ticket whose workflow failed before the
/// record write has no disposition and stays eligible for the next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketDisposition {
    /// No usable change reference (no PR link, or wrong repository)
    NotActionable,

    /// A PR was found but no testable files survived filtering, or
    /// generation produced nothing
    NoChanges,

    /// At least one test artifact was generated and persisted
    Actioned,
}

impl TicketDisposition {
    /// Stable string form used in the durable store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotActionable => "not_actionable",
            Self::NoChanges => "no_changes",
            Self::Actioned => "actioned",
        }
    }

    /// Parse the stored string form; unknown values map to NoChanges.
    pub fn parse(s: &str) -> Self {
        match s {
            "not_actionable" => Self::NotActionable,
            "actioned" => Self::Actioned,
            _ => Self::NoChanges,
        }
    }

    /// Disposition implied by a final artifact count.
    pub fn from_artifact_count(count: usize) -> Self {
        if count > 0 {
            Self::Actioned
        } else {
            Self::NoChanges
        }
    }
}

impl std::fmt::Display for TicketDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single ticket inside one pass.
#[derive(Debug, Clone)]
pub enum ItemResult {
    /// An idempotency record already existed; nothing was done
    AlreadySeen,

    /// A record was written this pass
    Recorded {
        disposition: TicketDisposition,
        artifacts: usize,
    },
}

/// Aggregate outcome of one orchestrator pass.
///
/// Ephemeral: returned to the triggering caller and logged, never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
    /// Identifier for this pass (logging/output-path correlation)
    pub pass_id: Uuid,

    /// Number of candidate tickets fetched
    pub candidates: usize,

    /// Tickets skipped by the dedupe check
    pub skipped: usize,

    /// Tickets newly recorded this pass (any disposition)
    pub advanced: usize,

    /// Total artifacts generated across the batch
    pub artifacts: usize,

    /// Tickets whose workflow raised an error (no record written)
    pub failed: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PassOutcome {
    pub fn new(pass_id: Uuid) -> Self {
        Self {
            pass_id,
            candidates: 0,
            skipped: 0,
            advanced: 0,
            artifacts: 0,
            failed: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Fold one item result into the aggregate.
    pub fn record(&mut self, result: &ItemResult) {
        match result {
            ItemResult::AlreadySeen => self.skipped += 1,
            ItemResult::Recorded { artifacts, .. } => {
                self.advanced += 1;
                self.artifacts += artifacts;
            }
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
