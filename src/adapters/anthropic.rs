//! Anthropic messages API client and response parsing.
//!
//! One call per source file. The model's reply is scanned for fenced code
//! blocks; each block becomes one generated artifact with a derived test
//! filename. A reply with no fences is treated as a single artifact.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::{detect_language, test_filename, GeneratedArtifact, SourceFile};

use super::GeneratorApi;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Built-in guidance used when no test-patterns document is configured.
const DEFAULT_TEST_PATTERNS: &str = "\
# Test Generation Patterns

## C# Test Patterns
- Use xUnit framework
- Follow AAA pattern (Arrange, Act, Assert)
- Mock dependencies using Moq
- Test both success and failure scenarios
- Include edge cases and boundary conditions

## JavaScript/TypeScript Test Patterns
- Use Jest framework
- Mock external dependencies
- Test async functions properly
- Include integration tests for API endpoints
- Test error handling

## General Guidelines
- Write clear, descriptive test names
- One assertion per test when possible
- Use meaningful test data
- Clean up resources in teardown
";

/// Messages API client.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    test_patterns: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            api_key,
            model,
            max_tokens,
            test_patterns: DEFAULT_TEST_PATTERNS.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Load the test-patterns guidance document, falling back to the
    /// built-in default when the file is missing.
    pub fn with_patterns_file(mut self, path: Option<&Path>) -> Self {
        if let Some(path) = path {
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    debug!(path = %path.display(), "Loaded test patterns document");
                    self.test_patterns = text;
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Test patterns document not readable, using defaults"
                    );
                }
            }
        }
        self
    }

    fn build_prompt(&self, file: &SourceFile, ticket_context: &str) -> String {
        format!(
            "You are a senior software engineer writing comprehensive unit tests.\n\n\
             CONTEXT:\n\
             Ticket context: {context}\n\
             File: {path}\n\
             Recent changes (git patch):\n{patch}\n\n\
             TEST DOCUMENTATION:\n{patterns}\n\n\
             SOURCE CODE:\n```\n{content}\n```\n\n\
             TASK:\n\
             Generate comprehensive unit tests for the above code, focusing on:\n\
             1. The recent changes highlighted in the patch\n\
             2. Critical business logic and edge cases\n\
             3. Error handling and validation\n\
             4. Integration points and dependencies\n\n\
             REQUIREMENTS:\n\
             - Follow the test patterns from the documentation\n\
             - Generate complete, runnable test files\n\
             - Include proper setup/teardown\n\
             - Test both positive and negative scenarios\n\
             - Use appropriate mocking for dependencies\n\
             - Write clear, descriptive test names\n\n\
             OUTPUT FORMAT:\n\
             Provide the complete test file content wrapped in code blocks with \
             appropriate language tags. Include any necessary imports and setup code.\n\n\
             Generate the tests now:",
            context = ticket_context,
            path = file.path,
            patch = file.patch.as_deref().unwrap_or("No patch available"),
            patterns = self.test_patterns,
            content = file.content,
        )
    }
}

#[async_trait]
impl GeneratorApi for AnthropicClient {
    async fn generate(
        &self,
        file: &SourceFile,
        ticket_context: &str,
    ) -> Result<Vec<GeneratedArtifact>> {
        let prompt = self.build_prompt(file, ticket_context);

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await
            .context("Generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Generation failed ({}): {}", status, body);
        }

        let message: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse generation response")?;

        let text = message
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .unwrap_or_default();

        Ok(parse_artifacts(text, &file.path))
    }
}

fn code_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```(\w+)?\n(.*?)```").unwrap())
}

/// Extract generated artifacts from a model reply.
pub fn parse_artifacts(response: &str, source_filename: &str) -> Vec<GeneratedArtifact> {
    let mut artifacts = Vec::new();

    for caps in code_block_pattern().captures_iter(response) {
        let language = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| detect_language(source_filename).to_string());
        let code = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

        if !code.is_empty() {
            let filename = test_filename(source_filename, &language);
            artifacts.push(GeneratedArtifact::new(language, code, filename));
        }
    }

    // No fences: treat the whole reply as one artifact
    if artifacts.is_empty() && !response.trim().is_empty() {
        let language = detect_language(source_filename).to_string();
        let filename = test_filename(source_filename, &language);
        artifacts.push(GeneratedArtifact::new(language, response.trim(), filename));
    }

    artifacts
}
