//! Command-line interface for testsmith.
//!
//! `serve` runs the full service (triggers + HTTP front end + cleanup);
//! the remaining commands are one-shot operational tools over the same
//! wiring.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::adapters::{AnthropicClient, GitHubClient, JiraClient, WebhookNotifier};
use crate::config::Config;
use crate::core::{
    FileCleanup, Orchestrator, PipelineService, TicketStore, TriggerSet, MANUAL_OWNER,
};
use crate::domain::FileFilter;
use crate::server::{self, AppState};

/// testsmith - ticket-driven AI test generation service
#[derive(Parser, Debug)]
#[command(name = "testsmith")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the service: scheduled triggers, HTTP front end, cleanup sweeps
    Serve {
        /// Port for the HTTP front end (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a single processing pass now and exit
    Run,

    /// List processed tickets
    Tickets {
        /// Maximum number of tickets to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Run one retention cleanup sweep over generated output
    Cleanup,

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let config = Config::load();

        match self.command {
            Commands::Serve { port } => serve(config, port).await,
            Commands::Run => run_once(config).await,
            Commands::Tickets { limit } => list_tickets(config, limit),
            Commands::Cleanup => cleanup_once(config).await,
            Commands::Config => show_config(config),
        }
    }
}

/// Build the store, adapters and pipeline service from config.
fn build_service(config: &Config) -> Result<(Arc<PipelineService>, Arc<TicketStore>)> {
    let store = Arc::new(
        TicketStore::open(&config.database_path).with_context(|| {
            format!("Failed to open ticket store at {}", config.database_path.display())
        })?,
    );

    let tracker = Arc::new(JiraClient::new(
        config.jira.base_url.clone(),
        config.jira.email.clone(),
        config.jira.token.clone().unwrap_or_default(),
        config.jira.projects.clone(),
        config.jira.page_size,
    ));

    let codehost = Arc::new(GitHubClient::new(
        config.github.api_url.clone(),
        config.github.token.clone().unwrap_or_default(),
        config.github.owner.clone(),
        config.github.repo.clone(),
        config.github.branch.clone(),
    ));

    let generator = Arc::new(
        AnthropicClient::new(
            config.anthropic.api_key.clone().unwrap_or_default(),
            config.anthropic.model.clone(),
            config.anthropic.max_tokens,
        )
        .with_patterns_file(config.anthropic.test_patterns.as_deref()),
    );

    let notifier = Arc::new(WebhookNotifier::new(config.webhook_url.as_deref()));

    let filter = FileFilter::new(&config.filter_extensions, &config.filter_excludes);

    let orchestrator = Orchestrator::new(
        store.clone(),
        tracker,
        codehost,
        generator,
        notifier,
        config.github.repo.clone(),
        config.output_dir.clone(),
        filter,
    );

    let service = Arc::new(PipelineService::new(orchestrator, config.max_hold));
    Ok((service, store))
}

async fn serve(config: Config, port_override: Option<u16>) -> Result<()> {
    for warning in config.startup_warnings() {
        warn!("{}", warning);
    }

    let (service, store) = build_service(&config)?;

    // Retention sweep: run at startup, then on its own timer
    let cleanup = FileCleanup::new(
        config.output_dir.join("generated"),
        config.retention_days,
    );
    let cleanup_task =
        cleanup.spawn_periodic(Duration::from_secs(config.cleanup_interval_hours * 3600));

    let triggers = Arc::new(TriggerSet::start(Arc::clone(&service), &config.schedules).await?);
    for summary in triggers.summary().await {
        info!(
            trigger = %summary.name,
            expression = %summary.expression,
            next_fire = ?summary.next_fire,
            "Trigger scheduled"
        );
    }

    let state = AppState {
        service,
        store,
        triggers: Arc::clone(&triggers),
        started_at: Instant::now(),
    };

    let port = port_override.unwrap_or(config.port);
    let result = server::serve(state, port).await;

    // Graceful teardown: stop firing triggers, cancel the sweep timer
    triggers.shutdown().await.ok();
    cleanup_task.abort();
    info!("Shutdown complete");

    result
}

async fn run_once(config: Config) -> Result<()> {
    for warning in config.startup_warnings() {
        warn!("{}", warning);
    }

    let (service, _store) = build_service(&config)?;

    match service.scheduled_pass(MANUAL_OWNER).await {
        Some(outcome) => {
            println!(
                "Pass {}: {} candidates, {} advanced, {} skipped, {} failed, {} artifacts",
                outcome.pass_id,
                outcome.candidates,
                outcome.advanced,
                outcome.skipped,
                outcome.failed,
                outcome.artifacts
            );
            Ok(())
        }
        None => anyhow::bail!("Pass did not complete (already running or failed; see logs)"),
    }
}

fn list_tickets(config: Config, limit: usize) -> Result<()> {
    let store = TicketStore::open(&config.database_path)?;
    let rows = store.list_recent(limit.clamp(1, 1000))?;

    if rows.is_empty() {
        println!("No processed tickets.");
        return Ok(());
    }

    println!(
        "{:<12} {:<8} {:<16} {:>9}  {}",
        "KEY", "PR", "OUTCOME", "ARTIFACTS", "SEEN AT"
    );
    for row in rows {
        println!(
            "{:<12} {:<8} {:<16} {:>9}  {}",
            row.ticket_key,
            row.pr_number
                .map(|n| format!("#{}", n))
                .unwrap_or_else(|| "-".to_string()),
            row.outcome.as_str(),
            row.artifact_count,
            row.seen_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

async fn cleanup_once(config: Config) -> Result<()> {
    let cleanup = FileCleanup::new(
        config.output_dir.join("generated"),
        config.retention_days,
    );
    let stats = cleanup.sweep().await?;
    println!(
        "Cleanup complete: removed {} files and {} directories",
        stats.files_removed, stats.dirs_removed
    );
    Ok(())
}

fn show_config(config: Config) -> Result<()> {
    println!("home:          {}", config.home.display());
    println!("database:      {}", config.database_path.display());
    println!("output:        {}", config.output_dir.display());
    println!("port:          {}", config.port);
    println!("tracker:       {} ({})", config.jira.base_url, config.jira.projects.join(","));
    println!(
        "code host:     {}/{} @ {}",
        config.github.owner, config.github.repo, config.github.branch
    );
    println!("model:         {}", config.anthropic.model);
    println!("work hours:    {}", config.schedules.work_hours);
    println!("off hours:     {}", config.schedules.off_hours);
    println!("max hold:      {}s", config.max_hold.as_secs());
    println!("retention:     {} days", config.retention_days);
    println!(
        "webhook:       {}",
        config.webhook_url.as_deref().unwrap_or("(disabled)")
    );
    for warning in config.startup_warnings() {
        println!("warning:       {}", warning);
    }
    Ok(())
}
