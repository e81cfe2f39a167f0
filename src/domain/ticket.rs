//! Tracker work items and change-reference extraction.
//!
//! A ticket is fetched fresh each pass; the only durable trace of it is
//! the idempotency record written after processing.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A work item fetched from the tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Tracker key, e.g. "QA-123"
    pub key: String,

    /// Summary line
    pub summary: String,

    /// Description body (may be absent)
    pub description: Option<String>,
}

impl Ticket {
    pub fn new(key: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            summary: summary.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Combined searchable text (summary + description).
    pub fn text(&self) -> String {
        match &self.description {
            Some(desc) => format!("{} {}", self.summary, desc),
            None => self.summary.clone(),
        }
    }

    /// Extract the first pull-request reference from the ticket text.
    pub fn change_ref(&self) -> Option<ChangeRef> {
        ChangeRef::extract(&self.text())
    }
}

/// A (repository, pull-request number) pair extracted from ticket text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRef {
    /// Repository name (without owner)
    pub repo: String,

    /// Pull request number
    pub number: u64,
}

fn pr_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)github\.com/[^/\s]+/([^/\s]+)/pull/(\d+)").unwrap()
    })
}

impl ChangeRef {
    /// Find the first PR URL in `text` and parse it into a reference.
    ///
    /// Returns None when no recognizable URL is present; the caller treats
    /// that as a not-actionable ticket, not an error.
    pub fn extract(text: &str) -> Option<Self> {
        let caps = pr_url_pattern().captures(text)?;
        let repo = caps.get(1)?.as_str().to_string();
        let number = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { repo, number })
    }

    /// Whether this reference points at the configured target repository.
    pub fn targets(&self, repo: &str) -> bool {
        self.repo.eq_ignore_ascii_case(repo)
    }
}

impl std::fmt::Display for ChangeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_pr_reference() {
        let r = ChangeRef::extract("fixes https://github.com/acme/widget-app/pull/42").unwrap();
        assert_eq!(r.repo, "widget-app");
        assert_eq!(r.number, 42);
    }

    #[test]
    fn test_extract_case_insensitive() {
        let r = ChangeRef::extract("see GitHub.com/Acme/Widget-App/PULL/7 please").unwrap();
        assert_eq!(r.repo, "Widget-App");
        assert_eq!(r.number, 7);
    }

    #[test]
    fn test_extract_first_of_many() {
        let text = "github.com/a/one/pull/1 and github.com/a/two/pull/2";
        let r = ChangeRef::extract(text).unwrap();
        assert_eq!(r.repo, "one");
        assert_eq!(r.number, 1);
    }

    #[test]
    fn test_extract_none_without_link() {
        assert!(ChangeRef::extract("no links here").is_none());
        assert!(ChangeRef::extract("github.com/acme/widget-app/issues/9").is_none());
    }

    #[test]
    fn test_targets_ignores_case() {
        let r = ChangeRef {
            repo: "Widget-App".to_string(),
            number: 1,
        };
        assert!(r.targets("widget-app"));
        assert!(!r.targets("other-repo"));
    }

    #[test]
    fn test_ticket_text_includes_description() {
        let ticket = Ticket::new("QA-1", "summary")
            .with_description("body with github.com/acme/widget-app/pull/3");
        assert!(ticket.change_ref().is_some());

        let bare = Ticket::new("QA-2", "summary only");
        assert_eq!(bare.text(), "summary only");
    }
}
