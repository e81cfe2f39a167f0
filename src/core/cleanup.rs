//! Retention-based cleanup of generated output.
//!
//! An independent periodic sweep with no coordination with the pipeline
//! lock: it only ever removes files past the retention window, which the
//! pipeline never touches again.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use tracing::{debug, error, info, warn};

/// Result of one sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
    pub files_removed: usize,
    pub dirs_removed: usize,
}

/// Removes generated files older than the retention window.
pub struct FileCleanup {
    root: PathBuf,
    retention: Duration,
}

impl FileCleanup {
    pub fn new(root: PathBuf, retention_days: u64) -> Self {
        Self {
            root,
            retention: Duration::from_secs(retention_days * 24 * 60 * 60),
        }
    }

    /// Walk the output tree once, removing files whose mtime is past the
    /// retention cutoff, then pruning stale directories left empty.
    /// Per-entry errors are logged and never abort the sweep.
    pub async fn sweep(&self) -> Result<SweepStats> {
        let mut stats = SweepStats::default();

        if !self.root.exists() {
            return Ok(stats);
        }

        let cutoff = SystemTime::now()
            .checked_sub(self.retention)
            .unwrap_or(UNIX_EPOCH);

        let mut stack = vec![self.root.clone()];
        let mut dirs: Vec<(PathBuf, SystemTime)> = Vec::new();

        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Cannot read directory");
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "Directory walk error");
                        break;
                    }
                };

                let path = entry.path();
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Cannot stat entry");
                        continue;
                    }
                };
                let mtime = metadata.modified().unwrap_or_else(|_| SystemTime::now());

                if metadata.is_dir() {
                    dirs.push((path.clone(), mtime));
                    stack.push(path);
                } else if mtime < cutoff {
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => {
                            debug!(path = %path.display(), "Removed old file");
                            stats.files_removed += 1;
                        }
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Failed to remove file")
                        }
                    }
                }
            }
        }

        // Prune stale directories, deepest first; non-empty ones just fail
        // the remove and stay.
        dirs.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
        for (dir, mtime) in dirs {
            if mtime < cutoff && tokio::fs::remove_dir(&dir).await.is_ok() {
                debug!(dir = %dir.display(), "Removed empty directory");
                stats.dirs_removed += 1;
            }
        }

        Ok(stats)
    }

    /// Run a sweep now, then repeat on the given interval.
    pub fn spawn_periodic(self, every: Duration) -> tokio::task::JoinHandle<()> {
        info!(
            root = %self.root.display(),
            retention_secs = self.retention.as_secs(),
            interval_secs = every.as_secs(),
            "Scheduling cleanup sweeps"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok(stats) => info!(
                        files = stats.files_removed,
                        dirs = stats.dirs_removed,
                        "Cleanup sweep complete"
                    ),
                    Err(e) => error!(error = format!("{:#}", e), "Cleanup sweep failed"),
                }
            }
        })
    }
}
