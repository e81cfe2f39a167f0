//! Shared in-memory fakes for the adapter seams.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use testsmith::adapters::{CodeHostApi, GeneratorApi, NotifySink, TestRunnerPayload, TrackerApi};
use testsmith::core::{Orchestrator, TicketStore};
use testsmith::domain::{
    detect_language, test_filename, ChangeRef, ChangedFile, FileFilter, GeneratedArtifact,
    SourceFile, Ticket,
};

/// Tracker fake returning a fixed batch; optionally slow, to hold the
/// lock long enough for concurrency tests.
pub struct FakeTracker {
    pub tickets: Vec<Ticket>,
    pub delay: Option<Duration>,
    pub comments: Mutex<Vec<(String, String)>>,
}

impl FakeTracker {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        Self {
            tickets,
            delay: None,
            comments: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TrackerApi for FakeTracker {
    async fn fetch_candidates(&self) -> Result<Vec<Ticket>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.tickets.clone())
    }

    async fn append_comment(&self, key: &str, body: &str) -> Result<()> {
        self.comments
            .lock()
            .unwrap()
            .push((key.to_string(), body.to_string()));
        Ok(())
    }
}

/// Code host fake: canned PR file listings and file contents.
#[derive(Default)]
pub struct FakeCodeHost {
    files: HashMap<u64, Vec<ChangedFile>>,
    contents: HashMap<String, String>,
    broken_prs: Vec<u64>,
}

impl FakeCodeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pr(mut self, number: u64, files: Vec<ChangedFile>) -> Self {
        self.files.insert(number, files);
        self
    }

    pub fn with_content(mut self, path: &str, content: &str) -> Self {
        self.contents.insert(path.to_string(), content.to_string());
        self
    }

    /// PRs whose file listing fails with a transport error.
    pub fn with_broken_pr(mut self, number: u64) -> Self {
        self.broken_prs.push(number);
        self
    }
}

#[async_trait]
impl CodeHostApi for FakeCodeHost {
    async fn list_changed_files(&self, change: &ChangeRef) -> Result<Vec<ChangedFile>> {
        if self.broken_prs.contains(&change.number) {
            anyhow::bail!("code host unavailable");
        }
        Ok(self.files.get(&change.number).cloned().unwrap_or_default())
    }

    async fn fetch_file_content(&self, path: &str) -> Result<Option<String>> {
        Ok(self.contents.get(path).cloned())
    }
}

/// Generator fake producing a fixed number of artifacts per file.
pub struct FakeGenerator {
    artifacts_per_file: usize,
    failing: Vec<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(artifacts_per_file: usize) -> Self {
        Self {
            artifacts_per_file,
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Paths whose generation call fails.
    pub fn with_failing(mut self, path: &str) -> Self {
        self.failing.push(path.to_string());
        self
    }
}

#[async_trait]
impl GeneratorApi for FakeGenerator {
    async fn generate(
        &self,
        file: &SourceFile,
        _ticket_context: &str,
    ) -> Result<Vec<GeneratedArtifact>> {
        self.calls.lock().unwrap().push(file.path.clone());

        if self.failing.contains(&file.path) {
            anyhow::bail!("model overloaded");
        }

        Ok((0..self.artifacts_per_file)
            .map(|i| {
                let language = detect_language(&file.path).to_string();
                let base = test_filename(&file.path, &language);
                let filename = if i == 0 { base } else { format!("{}_{}", i, base) };
                GeneratedArtifact::new(language, "// generated test", filename)
            })
            .collect())
    }
}

/// Notifier fake that records, at call time, whether the idempotency
/// record for the key was already visible (the ordering guarantee).
pub struct RecordingNotifier {
    store: Arc<TicketStore>,
    pub calls: Mutex<Vec<(String, bool)>>,
}

#[async_trait]
impl NotifySink for RecordingNotifier {
    async fn notify(&self, payload: &TestRunnerPayload) -> Result<()> {
        let record_visible = self.store.has_seen(&payload.ticket_key).unwrap_or(false);
        self.calls
            .lock()
            .unwrap()
            .push((payload.ticket_key.clone(), record_visible));
        Ok(())
    }
}

/// Assembled orchestrator plus handles to everything a test asserts on.
pub struct Harness {
    pub store: Arc<TicketStore>,
    pub tracker: Arc<FakeTracker>,
    pub notifier: Arc<RecordingNotifier>,
    pub orchestrator: Orchestrator,
    pub output_dir: PathBuf,
    // Held so the output directory outlives the test body
    _output: TempDir,
}

/// Target repository used by all harness tickets.
pub const TARGET_REPO: &str = "widget-app";

pub fn harness(tracker: FakeTracker, codehost: FakeCodeHost, generator: FakeGenerator) -> Harness {
    let store = Arc::new(TicketStore::in_memory().unwrap());
    let tracker = Arc::new(tracker);
    let notifier = Arc::new(RecordingNotifier {
        store: store.clone(),
        calls: Mutex::new(Vec::new()),
    });
    let output = TempDir::new().unwrap();

    let orchestrator = Orchestrator::new(
        store.clone(),
        tracker.clone(),
        Arc::new(codehost),
        Arc::new(generator),
        notifier.clone(),
        TARGET_REPO.to_string(),
        output.path().to_path_buf(),
        FileFilter::default(),
    );

    Harness {
        store,
        tracker,
        notifier,
        orchestrator,
        output_dir: output.path().to_path_buf(),
        _output: output,
    }
}

/// A modified (non-test) source file entry.
pub fn modified(path: &str) -> ChangedFile {
    ChangedFile {
        path: path.to_string(),
        status: "modified".to_string(),
        patch: Some(format!("+++ {}", path)),
    }
}
