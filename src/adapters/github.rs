//! GitHub REST client: PR file listing and content retrieval.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{ChangeRef, ChangedFile};

use super::CodeHostApi;

const USER_AGENT: &str = "testsmith";

/// GitHub v3 API client, pinned to one repository.
pub struct GitHubClient {
    api_url: String,
    token: String,
    owner: String,
    repo: String,
    branch: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PullFile {
    filename: String,
    status: String,
    patch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    content: String,
    #[serde(default)]
    encoding: String,
}

impl GitHubClient {
    pub fn new(api_url: String, token: String, owner: String, repo: String, branch: String) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            owner,
            repo,
            branch,
            client: reqwest::Client::new(),
        }
    }

    fn repo_url(&self, tail: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, tail)
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))
    }
}

#[async_trait]
impl CodeHostApi for GitHubClient {
    async fn list_changed_files(&self, change: &ChangeRef) -> Result<Vec<ChangedFile>> {
        let url = self.repo_url(&format!("pulls/{}/files", change.number));
        debug!(%change, "Listing changed files");

        let response = self.get(&url, &[]).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("PR file listing failed ({}): {}", status, body);
        }

        let files: Vec<PullFile> = response
            .json()
            .await
            .context("Failed to parse PR file listing")?;

        Ok(files
            .into_iter()
            .map(|f| ChangedFile {
                path: f.filename,
                status: f.status,
                patch: f.patch,
            })
            .collect())
    }

    async fn fetch_file_content(&self, path: &str) -> Result<Option<String>> {
        let url = self.repo_url(&format!("contents/{}", path));

        let response = self.get(&url, &[("ref", self.branch.as_str())]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(path, "File not found on code host, skipping");
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Content fetch for {} failed ({}): {}", path, status, body);
        }

        let content: ContentResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse content response for {}", path))?;

        if content.encoding == "base64" {
            let cleaned: String = content
                .content
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(cleaned)
                .with_context(|| format!("Invalid base64 content for {}", path))?;
            let text = String::from_utf8(bytes)
                .with_context(|| format!("Non-UTF-8 content for {}", path))?;
            return Ok(Some(text));
        }

        Ok(Some(content.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_url() {
        let client = GitHubClient::new(
            "https://api.github.com/".to_string(),
            "PAT".to_string(),
            "acme".to_string(),
            "widget-app".to_string(),
            "main".to_string(),
        );
        assert_eq!(
            client.repo_url("pulls/42/files"),
            "https://api.github.com/repos/acme/widget-app/pulls/42/files"
        );
    }
}
