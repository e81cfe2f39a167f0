//! Batch pipeline orchestrator.
//!
//! One pass fetches the current candidate tickets and walks each through
//! the per-ticket workflow: dedupe check, change-reference extraction,
//! changed-file lookup, per-file generation, artifact persistence, durable
//! outcome recording, best-effort notification. A ticket's failure is
//! contained to that ticket; the batch always continues.
//!
//! Attempt policy is at-most-once per ticket: any written record (even
//! with zero artifacts) is terminal. A ticket that errored before its
//! record write stays eligible for the next pass. Reprocessing a recorded
//! ticket requires deleting its row out of band.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{CodeHostApi, GeneratorApi, NotifySink, TestRunnerPayload, TrackerApi};
use crate::domain::outcome::ItemResult;
use crate::domain::{FileFilter, PassOutcome, SourceFile, Ticket, TicketDisposition};

use super::store::TicketStore;

/// Pipeline orchestrator: owns the collaborator handles and the per-pass
/// control flow. Locking lives a level up, in the service.
pub struct Orchestrator {
    store: Arc<TicketStore>,
    tracker: Arc<dyn TrackerApi>,
    codehost: Arc<dyn CodeHostApi>,
    generator: Arc<dyn GeneratorApi>,
    notifier: Arc<dyn NotifySink>,
    target_repo: String,
    output_dir: PathBuf,
    filter: FileFilter,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<TicketStore>,
        tracker: Arc<dyn TrackerApi>,
        codehost: Arc<dyn CodeHostApi>,
        generator: Arc<dyn GeneratorApi>,
        notifier: Arc<dyn NotifySink>,
        target_repo: String,
        output_dir: PathBuf,
        filter: FileFilter,
    ) -> Self {
        Self {
            store,
            tracker,
            codehost,
            generator,
            notifier,
            target_repo,
            output_dir,
            filter,
        }
    }

    /// Run one full pass over the current candidate batch.
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        let pass_id = Uuid::new_v4();
        let run_stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();

        let tickets = self
            .tracker
            .fetch_candidates()
            .await
            .context("Failed to fetch candidate tickets")?;

        let mut outcome = PassOutcome::new(pass_id);
        outcome.candidates = tickets.len();
        info!(%pass_id, candidates = tickets.len(), "Starting ticket processing pass");

        for ticket in &tickets {
            match self.process_ticket(ticket, &run_stamp).await {
                Ok(result) => outcome.record(&result),
                Err(e) => {
                    // No record was written; the ticket stays eligible.
                    error!(
                        key = %ticket.key,
                        error = format!("{:#}", e),
                        "Ticket workflow failed, continuing with batch"
                    );
                    outcome.failed += 1;
                }
            }
        }

        outcome.finish();
        info!(
            %pass_id,
            candidates = outcome.candidates,
            advanced = outcome.advanced,
            skipped = outcome.skipped,
            failed = outcome.failed,
            artifacts = outcome.artifacts,
            "Pass complete"
        );
        Ok(outcome)
    }

    /// Per-ticket workflow. Terminal states only: every exit either wrote
    /// an idempotency record or (on error) left no trace.
    #[instrument(skip(self, ticket, run_stamp), fields(key = %ticket.key))]
    async fn process_ticket(&self, ticket: &Ticket, run_stamp: &str) -> Result<ItemResult> {
        // 1. Dedupe check
        if self.store.has_seen(&ticket.key)? {
            debug!("Ticket already processed, skipping");
            return Ok(ItemResult::AlreadySeen);
        }

        info!(summary = %ticket.summary, "Processing ticket");

        // 2. Change-reference extraction
        let Some(change) = ticket.change_ref() else {
            info!("No pull request reference found, recording as not actionable");
            return self.record(&ticket.key, None, TicketDisposition::NotActionable, 0);
        };

        if !change.targets(&self.target_repo) {
            info!(%change, target = %self.target_repo, "Reference targets another repository");
            return self.record(&ticket.key, None, TicketDisposition::NotActionable, 0);
        }

        info!(%change, "Found pull request reference");

        // 3. Changed-file lookup and filtering
        let changed = self.codehost.list_changed_files(&change).await?;
        let testable = self.filter.filter(changed);

        if testable.is_empty() {
            info!(%change, "No testable files in pull request");
            return self.record(
                &ticket.key,
                Some(change.number),
                TicketDisposition::NoChanges,
                0,
            );
        }

        debug!(count = testable.len(), "Testable files selected");

        // 4. Content retrieval; individual fetch failures skip the file
        let mut sources = Vec::new();
        for file in &testable {
            match self.codehost.fetch_file_content(&file.path).await {
                Ok(Some(content)) => sources.push(SourceFile {
                    path: file.path.clone(),
                    content,
                    patch: file.patch.clone(),
                }),
                Ok(None) => debug!(path = %file.path, "File missing on code host, skipping"),
                Err(e) => warn!(
                    path = %file.path,
                    error = format!("{:#}", e),
                    "Content fetch failed, skipping file"
                ),
            }
        }

        // 5 + 6. Generation and persistence, per file
        let context = ticket.text();
        let item_dir = self
            .output_dir
            .join("generated")
            .join(run_stamp)
            .join(&ticket.key);
        let mut generated = 0usize;

        for source in &sources {
            let artifacts = match self.generator.generate(source, &context).await {
                Ok(artifacts) => artifacts,
                Err(e) => {
                    warn!(
                        path = %source.path,
                        error = format!("{:#}", e),
                        "Generation failed, continuing with remaining files"
                    );
                    continue;
                }
            };

            if artifacts.is_empty() {
                continue;
            }

            tokio::fs::create_dir_all(&item_dir)
                .await
                .with_context(|| format!("Failed to create {}", item_dir.display()))?;

            for artifact in &artifacts {
                let path = item_dir.join(&artifact.filename);
                match tokio::fs::write(&path, &artifact.code).await {
                    Ok(()) => {
                        self.store.append_artifact_log(
                            &ticket.key,
                            &source.path,
                            &path.to_string_lossy(),
                        )?;
                        generated += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to write artifact");
                    }
                }
            }

            debug!(path = %source.path, count = artifacts.len(), "Generated tests for file");
        }

        // 7. Durable outcome recording (always before notification)
        let disposition = TicketDisposition::from_artifact_count(generated);
        let recorded = self.record(&ticket.key, Some(change.number), disposition, generated)?;

        // 8. Best-effort notification; the record above already committed
        if generated > 0 {
            let payload = TestRunnerPayload {
                ticket_key: ticket.key.clone(),
                pr_number: Some(change.number),
                tests_generated: generated,
                timestamp: Utc::now(),
                output_path: item_dir.display().to_string(),
            };
            if let Err(e) = self.notifier.notify(&payload).await {
                warn!(error = format!("{:#}", e), "Test runner notification failed");
            }

            let comment = format!(
                "Automated tests generated: {} test files created for PR #{}",
                generated, change.number
            );
            if let Err(e) = self.tracker.append_comment(&ticket.key, &comment).await {
                warn!(error = format!("{:#}", e), "Could not comment on ticket");
            }
        }

        info!(artifacts = generated, %disposition, "Ticket processed");
        Ok(recorded)
    }

    fn record(
        &self,
        key: &str,
        pr_number: Option<u64>,
        disposition: TicketDisposition,
        artifacts: usize,
    ) -> Result<ItemResult> {
        self.store
            .upsert_seen(key, pr_number, disposition, artifacts)?;
        Ok(ItemResult::Recorded {
            disposition,
            artifacts,
        })
    }
}
