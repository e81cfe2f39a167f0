//! Trigger sources: cron-cadence validation and wiring.
//!
//! Two cadences fire the pipeline: a dense one during work hours and a
//! sparse one otherwise. Expressions are validated at startup against a
//! restricted cron grammar; an invalid expression falls back to its
//! hardcoded default with a warning instead of failing startup.

use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};
use uuid::Uuid;

use super::service::PipelineService;

/// Default dense cadence: every 15 minutes, 8:00-14:59, Monday-Friday.
pub const DEFAULT_WORK_HOURS: &str = "*/15 8-14 * * 1-5";

/// Default sparse cadence: every two hours.
pub const DEFAULT_OFF_HOURS: &str = "0 */2 * * *";

fn cron_field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\d,\-*/]+$").unwrap())
}

/// Validate a cron expression against the recognized grammar: five or six
/// whitespace-separated fields, each built from digits, commas, dashes,
/// slashes and wildcards.
pub fn is_valid_cron(expression: &str) -> bool {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != 5 && parts.len() != 6 {
        return false;
    }
    parts.iter().all(|part| cron_field_pattern().is_match(part))
}

/// The two validated cadence expressions.
#[derive(Debug, Clone)]
pub struct Schedules {
    pub work_hours: String,
    pub off_hours: String,
}

impl Schedules {
    /// Validate configured expressions, falling back per-expression to the
    /// hardcoded defaults.
    pub fn validated(work_hours: &str, off_hours: &str) -> Self {
        let work_hours = if is_valid_cron(work_hours) {
            work_hours.to_string()
        } else {
            warn!(
                expression = work_hours,
                default = DEFAULT_WORK_HOURS,
                "Invalid work hours cron expression, using default"
            );
            DEFAULT_WORK_HOURS.to_string()
        };

        let off_hours = if is_valid_cron(off_hours) {
            off_hours.to_string()
        } else {
            warn!(
                expression = off_hours,
                default = DEFAULT_OFF_HOURS,
                "Invalid off hours cron expression, using default"
            );
            DEFAULT_OFF_HOURS.to_string()
        };

        Self {
            work_hours,
            off_hours,
        }
    }
}

impl Default for Schedules {
    fn default() -> Self {
        Self {
            work_hours: DEFAULT_WORK_HOURS.to_string(),
            off_hours: DEFAULT_OFF_HOURS.to_string(),
        }
    }
}

/// Per-trigger status for the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerSummary {
    pub name: String,
    pub expression: String,
    pub next_fire: Option<DateTime<Utc>>,
}

/// The running trigger jobs.
pub struct TriggerSet {
    scheduler: JobScheduler,
    jobs: Vec<(String, Uuid, String)>,
}

impl TriggerSet {
    /// Register and start both cadence jobs. Each firing calls the
    /// service's scheduled entry point with its own owner id; firings that
    /// find the lock held no-op inside the service.
    pub async fn start(service: Arc<PipelineService>, schedules: &Schedules) -> Result<Self> {
        let mut scheduler = JobScheduler::new()
            .await
            .context("Failed to create trigger scheduler")?;

        let mut jobs = Vec::new();
        for (name, expression) in [
            ("workHours", schedules.work_hours.clone()),
            ("offHours", schedules.off_hours.clone()),
        ] {
            let svc = Arc::clone(&service);
            let owner = name.to_string();
            let job = Job::new_async(expression.as_str(), move |_id, _sched| {
                let svc = Arc::clone(&svc);
                let owner = owner.clone();
                Box::pin(async move {
                    svc.scheduled_pass(&owner).await;
                })
            })
            .with_context(|| format!("Failed to create {} trigger ({})", name, expression))?;

            let id = scheduler
                .add(job)
                .await
                .with_context(|| format!("Failed to register {} trigger", name))?;

            info!(trigger = name, %expression, "Registered trigger");
            jobs.push((name.to_string(), id, expression));
        }

        scheduler
            .start()
            .await
            .context("Failed to start trigger scheduler")?;

        Ok(Self { scheduler, jobs })
    }

    /// Next-fire estimate per trigger.
    pub async fn summary(&self) -> Vec<TriggerSummary> {
        let mut out = Vec::new();
        for (name, id, expression) in &self.jobs {
            let mut scheduler = self.scheduler.clone();
            let next_fire = scheduler.next_tick_for_job(*id).await.ok().flatten();
            out.push(TriggerSummary {
                name: name.clone(),
                expression: expression.clone(),
                next_fire,
            });
        }
        out
    }

    /// Stop firing. Running passes are not interrupted.
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .context("Failed to shut down trigger scheduler")
    }
}
