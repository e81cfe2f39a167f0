//! Jira REST client: candidate search and comment write-back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::Ticket;

use super::TrackerApi;

/// Jira Cloud REST API v3 client.
pub struct JiraClient {
    base_url: String,
    email: String,
    token: String,
    projects: Vec<String>,
    page_size: u32,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
    /// Atlassian document format; flattened to plain text
    description: Option<Value>,
}

impl JiraClient {
    pub fn new(
        base_url: String,
        email: String,
        token: String,
        projects: Vec<String>,
        page_size: u32,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            token,
            projects,
            page_size,
            client: reqwest::Client::new(),
        }
    }

    /// JQL for tickets sitting in QA across the configured projects.
    fn candidate_jql(&self) -> String {
        let project_clause = if self.projects.len() > 1 {
            format!("project IN ({})", self.projects.join(","))
        } else {
            format!("project={}", self.projects.first().map(String::as_str).unwrap_or(""))
        };
        format!("{} AND status=\"QA\"", project_clause)
    }
}

#[async_trait]
impl TrackerApi for JiraClient {
    async fn fetch_candidates(&self) -> Result<Vec<Ticket>> {
        let url = format!("{}/rest/api/3/search", self.base_url);
        let jql = self.candidate_jql();
        let max_results = self.page_size.to_string();
        debug!(%jql, "Searching tracker for candidates");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.email, Some(&self.token))
            .query(&[
                ("jql", jql.as_str()),
                ("fields", "key,summary,description,status,updated"),
                ("maxResults", max_results.as_str()),
            ])
            .send()
            .await
            .context("Failed to query tracker")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Tracker search failed ({}): {}", status, body);
        }

        let search: SearchResponse = response
            .json()
            .await
            .context("Failed to parse tracker search response")?;

        Ok(search
            .issues
            .into_iter()
            .map(|issue| {
                let mut ticket = Ticket::new(issue.key, issue.fields.summary);
                if let Some(description) = issue.fields.description {
                    let text = adf_text(&description);
                    if !text.is_empty() {
                        ticket = ticket.with_description(text);
                    }
                }
                ticket
            })
            .collect())
    }

    async fn append_comment(&self, key: &str, body: &str) -> Result<()> {
        let url = format!("{}/rest/api/3/issue/{}/comment", self.base_url, key);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.email, Some(&self.token))
            .json(&json!({
                "body": {
                    "type": "doc",
                    "version": 1,
                    "content": [{
                        "type": "paragraph",
                        "content": [{ "type": "text", "text": body }]
                    }]
                }
            }))
            .send()
            .await
            .context("Failed to post tracker comment")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Tracker comment failed ({}): {}", status, text);
        }

        Ok(())
    }
}

/// Flatten an Atlassian-document-format value to its text content.
fn adf_text(value: &Value) -> String {
    fn collect(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.push(s.clone()),
            Value::Object(map) => {
                if let Some(Value::String(text)) = map.get("text") {
                    out.push(text.clone());
                }
                if let Some(content) = map.get("content") {
                    collect(content, out);
                }
            }
            Value::Array(items) => {
                for item in items {
                    collect(item, out);
                }
            }
            _ => {}
        }
    }

    let mut parts = Vec::new();
    collect(value, &mut parts);
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(projects: &[&str]) -> JiraClient {
        JiraClient::new(
            "https://example.atlassian.net/".to_string(),
            "bot@example.com".to_string(),
            "token".to_string(),
            projects.iter().map(|p| p.to_string()).collect(),
            50,
        )
    }

    #[test]
    fn test_jql_single_project() {
        assert_eq!(client(&["QA"]).candidate_jql(), "project=QA AND status=\"QA\"");
    }

    #[test]
    fn test_jql_multiple_projects() {
        assert_eq!(
            client(&["QA", "APP"]).candidate_jql(),
            "project IN (QA,APP) AND status=\"QA\""
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let c = client(&["QA"]);
        assert_eq!(c.base_url, "https://example.atlassian.net");
    }

    #[test]
    fn test_adf_text_flattening() {
        let doc = json!({
            "type": "doc",
            "version": 1,
            "content": [{
                "type": "paragraph",
                "content": [
                    { "type": "text", "text": "see" },
                    { "type": "text", "text": "github.com/acme/widget-app/pull/42" }
                ]
            }]
        });
        assert_eq!(adf_text(&doc), "see github.com/acme/widget-app/pull/42");
    }

    #[test]
    fn test_adf_text_plain_string() {
        assert_eq!(adf_text(&json!("plain description")), "plain description");
    }
}
