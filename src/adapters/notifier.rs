//! Best-effort webhook notification to the downstream test runner.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::NotifySink;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Payload posted after a ticket produced artifacts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunnerPayload {
    pub ticket_key: String,
    pub pr_number: Option<u64>,
    pub tests_generated: usize,
    pub timestamp: DateTime<Utc>,
    pub output_path: String,
}

/// Fire-and-forget HTTP notifier.
///
/// Constructed disabled when no URL is configured or the URL is not
/// http(s); every send is bounded by a short timeout and failures are the
/// caller's to swallow.
pub struct WebhookNotifier {
    url: Option<reqwest::Url>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: Option<&str>) -> Self {
        let url = url.and_then(|raw| match reqwest::Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(parsed),
            Ok(parsed) => {
                warn!(url = %parsed, "Webhook URL scheme not supported, notifications disabled");
                None
            }
            Err(e) => {
                warn!(url = raw, error = %e, "Invalid webhook URL, notifications disabled");
                None
            }
        });

        Self {
            url,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

#[async_trait]
impl NotifySink for WebhookNotifier {
    async fn notify(&self, payload: &TestRunnerPayload) -> Result<()> {
        let Some(url) = &self.url else {
            debug!("No test runner webhook configured, skipping notification");
            return Ok(());
        };

        let response = self
            .client
            .post(url.clone())
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .context("Failed to reach test runner webhook")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Test runner webhook returned {}", status);
        }

        debug!(key = %payload.ticket_key, "Notified test runner");
        Ok(())
    }
}
