//! Single-flight lock serializing pipeline passes.
//!
//! Independent trigger sources (cron cadences, the manual endpoint) all
//! funnel through this lock; a firing that finds it held no-ops. A holder
//! that exceeds the maximum hold duration is considered wedged and is
//! force-cleared by the next acquisition attempt. That trade is
//! deliberate: never stay stuck forever, at the cost of a rare overlapping
//! run whose writes are idempotent anyway.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Default maximum legitimate hold: well above the expected worst-case
/// pass duration for a full candidate page.
pub const DEFAULT_MAX_HOLD: Duration = Duration::from_secs(30 * 60);

#[derive(Debug)]
struct Holder {
    owner: String,
    acquired: Instant,
    acquired_at: DateTime<Utc>,
}

/// Process-wide mutual exclusion with ownership tagging and staleness
/// recovery.
#[derive(Debug)]
pub struct PassLock {
    holder: Mutex<Option<Holder>>,
    max_hold: Duration,
}

/// Read-only snapshot of the lock for observability.
#[derive(Debug, Clone, Serialize)]
pub struct LockStatus {
    /// Owner of the run in progress, if any
    pub holder: Option<String>,

    /// When the current holder acquired the lock
    pub acquired_at: Option<DateTime<Utc>>,

    /// Seconds the current holder has held the lock
    pub elapsed_secs: Option<u64>,
}

impl PassLock {
    pub fn new(max_hold: Duration) -> Self {
        Self {
            holder: Mutex::new(None),
            max_hold,
        }
    }

    /// Attempt to acquire the lock for `owner`.
    ///
    /// Succeeds when the lock is unheld, or when the current holder has
    /// exceeded the maximum hold duration (logged as a forced unlock).
    /// Returns false, with no state change, while a run is legitimately in
    /// progress.
    pub fn try_acquire(&self, owner: &str) -> bool {
        let mut holder = self.holder.lock().unwrap();

        if let Some(current) = holder.as_ref() {
            let held_for = current.acquired.elapsed();
            if held_for <= self.max_hold {
                debug!(
                    owner,
                    holder = %current.owner,
                    held_secs = held_for.as_secs(),
                    "Pass already running, not acquiring"
                );
                return false;
            }

            warn!(
                stale_holder = %current.owner,
                held_secs = held_for.as_secs(),
                max_hold_secs = self.max_hold.as_secs(),
                new_owner = owner,
                "Forced unlock of stale pass lock"
            );
        }

        *holder = Some(Holder {
            owner: owner.to_string(),
            acquired: Instant::now(),
            acquired_at: Utc::now(),
        });
        info!(owner, "Pass lock acquired");
        true
    }

    /// Release the lock.
    ///
    /// Clears the holder unconditionally; callers release on every exit
    /// path of a pass, so a mismatched owner here means a stale run
    /// finished after being overridden.
    pub fn release(&self, owner: &str) {
        let mut holder = self.holder.lock().unwrap();

        if let Some(current) = holder.as_ref() {
            if current.owner != owner {
                warn!(
                    owner,
                    holder = %current.owner,
                    "Releasing lock held by a different owner (overridden stale run finished)"
                );
            }
        }

        *holder = None;
        debug!(owner, "Pass lock released");
    }

    /// Snapshot the current lock state without mutating it.
    pub fn status(&self) -> LockStatus {
        let holder = self.holder.lock().unwrap();

        match holder.as_ref() {
            Some(current) => LockStatus {
                holder: Some(current.owner.clone()),
                acquired_at: Some(current.acquired_at),
                elapsed_secs: Some(current.acquired.elapsed().as_secs()),
            },
            None => LockStatus {
                holder: None,
                acquired_at: None,
                elapsed_secs: None,
            },
        }
    }

    /// Whether a run is currently in progress (stale holders count as
    /// running until overridden).
    pub fn is_held(&self) -> bool {
        self.holder.lock().unwrap().is_some()
    }
}

impl Default for PassLock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let lock = PassLock::default();

        assert!(lock.try_acquire("workHours"));
        assert!(lock.is_held());
        assert_eq!(lock.status().holder.as_deref(), Some("workHours"));

        lock.release("workHours");
        assert!(!lock.is_held());
        assert!(lock.status().holder.is_none());
    }

    #[test]
    fn test_second_acquire_rejected_while_held() {
        let lock = PassLock::default();

        assert!(lock.try_acquire("workHours"));
        assert!(!lock.try_acquire("offHours"));
        assert!(!lock.try_acquire("manual"));

        // Holder unchanged
        assert_eq!(lock.status().holder.as_deref(), Some("workHours"));
    }

    #[test]
    fn test_stale_holder_is_overridden() {
        let lock = PassLock::new(Duration::from_millis(10));

        assert!(lock.try_acquire("workHours"));
        std::thread::sleep(Duration::from_millis(20));

        assert!(lock.try_acquire("offHours"));
        assert_eq!(lock.status().holder.as_deref(), Some("offHours"));
    }

    #[test]
    fn test_fresh_holder_is_not_overridden() {
        let lock = PassLock::new(Duration::from_secs(60));

        assert!(lock.try_acquire("workHours"));
        assert!(!lock.try_acquire("offHours"));
    }

    #[test]
    fn test_release_clears_unconditionally() {
        let lock = PassLock::default();

        assert!(lock.try_acquire("workHours"));
        lock.release("offHours");
        assert!(!lock.is_held());
    }

    #[test]
    fn test_status_is_read_only() {
        let lock = PassLock::default();
        assert!(lock.try_acquire("manual"));

        let before = lock.status();
        let after = lock.status();
        assert_eq!(before.holder, after.holder);
        assert!(lock.is_held());
    }
}
