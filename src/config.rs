//! Configuration for the testsmith service.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (JIRA_TOKEN, GITHUB_PAT, CRON_WORK_HOURS, ...)
//! 2. Config file (.testsmith/config.yaml)
//! 3. Defaults (~/.testsmith, ./output, hardcoded cadences)
//!
//! Config file discovery walks the current directory and its parents.
//! Configuration problems degrade: an invalid cron expression falls back
//! to its default, a missing credential disables the affected feature
//! with a warning. Only an unusable store path aborts startup, later,
//! when the store is opened.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::core::scheduler::Schedules;
use crate::core::lock::DEFAULT_MAX_HOLD;
use crate::domain::files::{DEFAULT_EXCLUDES, DEFAULT_EXTENSIONS};

const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
const DEFAULT_MAX_TOKENS: u32 = 4000;
const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RETENTION_DAYS: u64 = 7;
const DEFAULT_CLEANUP_INTERVAL_HOURS: u64 = 24;

/// Raw config file schema (matches YAML structure).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub home: Option<String>,
    pub output_dir: Option<String>,
    pub database_path: Option<String>,
    pub port: Option<u16>,
    pub jira: JiraSection,
    pub github: GitHubSection,
    pub anthropic: AnthropicSection,
    pub cron: CronSection,
    pub webhook: WebhookSection,
    pub cleanup: CleanupSection,
    pub lock: LockSection,
    pub filter: FilterSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JiraSection {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
    /// Comma-separated project keys
    pub project: Option<String>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitHubSection {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnthropicSection {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    /// Path to a test-patterns guidance document
    pub test_patterns: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CronSection {
    pub work_hours: Option<String>,
    pub off_hours: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookSection {
    pub test_runner_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CleanupSection {
    pub retention_days: Option<u64>,
    pub interval_hours: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LockSection {
    pub max_hold_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    pub extensions: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service state directory
    pub home: PathBuf,
    /// SQLite store path
    pub database_path: PathBuf,
    /// Root for generated artifacts
    pub output_dir: PathBuf,
    /// HTTP front end port
    pub port: u16,

    pub jira: JiraConfig,
    pub github: GitHubConfig,
    pub anthropic: AnthropicConfig,

    /// Validated cadence expressions
    pub schedules: Schedules,
    /// Maximum legitimate pass duration before the lock is stale
    pub max_hold: Duration,
    /// Test runner webhook URL, if configured
    pub webhook_url: Option<String>,

    pub retention_days: u64,
    pub cleanup_interval_hours: u64,

    pub filter_extensions: Vec<String>,
    pub filter_excludes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub email: String,
    pub token: Option<String>,
    pub projects: Vec<String>,
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub test_patterns: Option<PathBuf>,
}

/// Find config file by searching current directory and parents.
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".testsmith").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse a config file.
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Self {
        let file = match find_config_file() {
            Some(path) => match load_config_file(&path) {
                Ok(file) => file,
                Err(e) => {
                    warn!(error = format!("{:#}", e), "Ignoring unreadable config file");
                    ConfigFile::default()
                }
            },
            None => ConfigFile::default(),
        };

        Self::resolve(file)
    }

    /// Resolve a raw config file plus environment overrides.
    pub fn resolve(file: ConfigFile) -> Self {
        let home = env_var("TESTSMITH_HOME")
            .or(file.home)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".testsmith")
            });

        let database_path = env_var("DB_PATH")
            .or(file.database_path)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("tickets.db"));

        let output_dir = env_var("TESTSMITH_OUTPUT")
            .or(file.output_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        let port = env_var("PORT")
            .and_then(|v| v.parse().ok())
            .or(file.port)
            .unwrap_or(DEFAULT_PORT);

        let projects: Vec<String> = env_var("JIRA_PROJECT")
            .or(file.jira.project)
            .unwrap_or_else(|| "QA".to_string())
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        let jira = JiraConfig {
            base_url: env_var("JIRA_BASE_URL")
                .or(file.jira.base_url)
                .unwrap_or_else(|| "https://your-domain.atlassian.net".to_string()),
            email: env_var("JIRA_EMAIL").or(file.jira.email).unwrap_or_default(),
            token: env_var("JIRA_TOKEN").or(file.jira.token),
            projects,
            page_size: file.jira.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        };

        let github = GitHubConfig {
            api_url: file
                .github
                .api_url
                .unwrap_or_else(|| "https://api.github.com".to_string()),
            token: env_var("GITHUB_PAT").or(file.github.token),
            owner: env_var("GITHUB_OWNER")
                .or(file.github.owner)
                .unwrap_or_default(),
            repo: env_var("GITHUB_REPO")
                .or(file.github.repo)
                .unwrap_or_default(),
            branch: file.github.branch.unwrap_or_else(|| "main".to_string()),
        };

        let anthropic = AnthropicConfig {
            api_key: env_var("ANTHROPIC_KEY").or(file.anthropic.api_key),
            model: file
                .anthropic
                .model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: file.anthropic.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            test_patterns: file.anthropic.test_patterns.map(PathBuf::from),
        };

        let schedules = Schedules::validated(
            &env_var("CRON_WORK_HOURS")
                .or(file.cron.work_hours)
                .unwrap_or_else(|| crate::core::scheduler::DEFAULT_WORK_HOURS.to_string()),
            &env_var("CRON_OFF_HOURS")
                .or(file.cron.off_hours)
                .unwrap_or_else(|| crate::core::scheduler::DEFAULT_OFF_HOURS.to_string()),
        );

        let max_hold = file
            .lock
            .max_hold_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_MAX_HOLD);

        let webhook_url = env_var("TEST_RUNNER_WEBHOOK_URL").or(file.webhook.test_runner_url);

        Self {
            home,
            database_path,
            output_dir,
            port,
            jira,
            github,
            anthropic,
            schedules,
            max_hold,
            webhook_url,
            retention_days: file.cleanup.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
            cleanup_interval_hours: file
                .cleanup
                .interval_hours
                .unwrap_or(DEFAULT_CLEANUP_INTERVAL_HOURS),
            filter_extensions: file.filter.extensions.unwrap_or_else(|| {
                DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
            }),
            filter_excludes: file.filter.exclude.unwrap_or_else(|| {
                DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
            }),
        }
    }

    /// Degraded-feature warnings for startup. None of these abort.
    pub fn startup_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.jira.token.is_none() || self.jira.email.is_empty() {
            warnings.push("Tracker credentials missing: candidate search will fail".to_string());
        }
        if self.github.token.is_none() {
            warnings.push("Code host token missing: file lookups will fail".to_string());
        }
        if self.github.owner.is_empty() || self.github.repo.is_empty() {
            warnings
                .push("Code host owner/repo not configured: no ticket will be actionable".to_string());
        }
        if self.anthropic.api_key.is_none() {
            warnings.push("Generation API key missing: no tests will be generated".to_string());
        }
        if self.webhook_url.is_none() {
            warnings.push("No test runner webhook URL configured".to_string());
        }

        warnings
    }
}
