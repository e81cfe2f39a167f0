//! Durable idempotency store over SQLite.
//!
//! Two tables: `tickets_seen` holds one upserted row per ticket key (the
//! proof a ticket was considered), `generated_tests` holds one appended
//! row per persisted artifact. Reprocessing a key overwrites its seen row;
//! artifact rows are never mutated.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

use crate::domain::TicketDisposition;

/// Errors from the ticket store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One row of `tickets_seen`.
#[derive(Debug, Clone, Serialize)]
pub struct SeenTicket {
    pub ticket_key: String,
    pub pr_number: Option<u64>,
    pub seen_at: DateTime<Utc>,
    pub outcome: TicketDisposition,
    pub artifact_count: u64,
}

/// One row of `generated_tests`.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRow {
    pub ticket_key: String,
    pub source_path: String,
    pub output_path: String,
    pub generated_at: DateTime<Utc>,
}

/// SQLite-backed idempotency store.
///
/// All operations are short keyed reads/writes; the connection is guarded
/// by a mutex and called inline from async contexts.
pub struct TicketStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tickets_seen (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_key     TEXT UNIQUE NOT NULL,
    pr_number      INTEGER,
    seen_at        TEXT NOT NULL,
    outcome        TEXT NOT NULL DEFAULT 'no_changes',
    artifact_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS generated_tests (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_key   TEXT NOT NULL,
    source_path  TEXT NOT NULL,
    output_path  TEXT NOT NULL,
    generated_at TEXT NOT NULL
);
";

impl TicketStore {
    /// Open (creating if needed) the store at `path`.
    ///
    /// This is the one startup step allowed to be fatal: a store path that
    /// cannot be created leaves the whole service without its dedupe
    /// contract.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Whether an idempotency record exists for `key`.
    pub fn has_seen(&self, key: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row: Option<i64> = conn
            .query_row(
                "SELECT id FROM tickets_seen WHERE ticket_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    /// Write or overwrite the idempotency record for `key`.
    pub fn upsert_seen(
        &self,
        key: &str,
        pr_number: Option<u64>,
        outcome: TicketDisposition,
        artifact_count: usize,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tickets_seen (ticket_key, pr_number, seen_at, outcome, artifact_count)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(ticket_key) DO UPDATE SET
                 pr_number = excluded.pr_number,
                 seen_at = excluded.seen_at,
                 outcome = excluded.outcome,
                 artifact_count = excluded.artifact_count",
            params![
                key,
                pr_number.map(|n| n as i64),
                Utc::now().to_rfc3339(),
                outcome.as_str(),
                artifact_count as i64,
            ],
        )?;
        Ok(())
    }

    /// Append one artifact-log row.
    pub fn append_artifact_log(
        &self,
        key: &str,
        source_path: &str,
        output_path: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO generated_tests (ticket_key, source_path, output_path, generated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, source_path, output_path, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Fetch the most recent seen records, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<SeenTicket>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT ticket_key, pr_number, seen_at, outcome, artifact_count
             FROM tickets_seen
             ORDER BY seen_at DESC, id DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SeenTicket {
                ticket_key: row.get(0)?,
                pr_number: row.get::<_, Option<i64>>(1)?.map(|n| n as u64),
                seen_at: parse_timestamp(&row.get::<_, String>(2)?),
                outcome: TicketDisposition::parse(&row.get::<_, String>(3)?),
                artifact_count: row.get::<_, i64>(4)? as u64,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fetch one seen record by key.
    pub fn get_seen(&self, key: &str) -> Result<Option<SeenTicket>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT ticket_key, pr_number, seen_at, outcome, artifact_count
                 FROM tickets_seen WHERE ticket_key = ?1",
                params![key],
                |row| {
                    Ok(SeenTicket {
                        ticket_key: row.get(0)?,
                        pr_number: row.get::<_, Option<i64>>(1)?.map(|n| n as u64),
                        seen_at: parse_timestamp(&row.get::<_, String>(2)?),
                        outcome: TicketDisposition::parse(&row.get::<_, String>(3)?),
                        artifact_count: row.get::<_, i64>(4)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// All artifact-log rows for a key, oldest first.
    pub fn artifact_log(&self, key: &str) -> Result<Vec<ArtifactRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT ticket_key, source_path, output_path, generated_at
             FROM generated_tests
             WHERE ticket_key = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![key], |row| {
            Ok(ArtifactRow {
                ticket_key: row.get(0)?,
                source_path: row.get(1)?,
                output_path: row.get(2)?,
                generated_at: parse_timestamp(&row.get::<_, String>(3)?),
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_seen_after_upsert() {
        let store = TicketStore::in_memory().unwrap();

        assert!(!store.has_seen("QA-1").unwrap());
        store
            .upsert_seen("QA-1", Some(42), TicketDisposition::Actioned, 2)
            .unwrap();
        assert!(store.has_seen("QA-1").unwrap());
    }

    #[test]
    fn test_upsert_overwrites_not_duplicates() {
        let store = TicketStore::in_memory().unwrap();

        store
            .upsert_seen("QA-1", None, TicketDisposition::NotActionable, 0)
            .unwrap();
        store
            .upsert_seen("QA-1", Some(42), TicketDisposition::Actioned, 3)
            .unwrap();

        let all = store.list_recent(10).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].pr_number, Some(42));
        assert_eq!(all[0].outcome, TicketDisposition::Actioned);
        assert_eq!(all[0].artifact_count, 3);
    }

    #[test]
    fn test_artifact_log_appends() {
        let store = TicketStore::in_memory().unwrap();

        store
            .append_artifact_log("QA-1", "src/a.ts", "output/a.test.ts")
            .unwrap();
        store
            .append_artifact_log("QA-1", "src/b.ts", "output/b.test.ts")
            .unwrap();

        let rows = store.artifact_log("QA-1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source_path, "src/a.ts");
        assert_eq!(rows[1].source_path, "src/b.ts");
        assert!(store.artifact_log("QA-2").unwrap().is_empty());
    }

    #[test]
    fn test_list_recent_orders_and_limits() {
        let store = TicketStore::in_memory().unwrap();

        for i in 0..5 {
            store
                .upsert_seen(
                    &format!("QA-{}", i),
                    None,
                    TicketDisposition::NoChanges,
                    0,
                )
                .unwrap();
        }

        let recent = store.list_recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        // Same-second inserts fall back to id ordering: newest first
        assert_eq!(recent[0].ticket_key, "QA-4");
        assert_eq!(recent[2].ticket_key, "QA-2");
    }

    #[test]
    fn test_get_seen_round_trip() {
        let store = TicketStore::in_memory().unwrap();

        assert!(store.get_seen("QA-9").unwrap().is_none());
        store
            .upsert_seen("QA-9", Some(7), TicketDisposition::NoChanges, 0)
            .unwrap();

        let seen = store.get_seen("QA-9").unwrap().unwrap();
        assert_eq!(seen.ticket_key, "QA-9");
        assert_eq!(seen.pr_number, Some(7));
        assert_eq!(seen.artifact_count, 0);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested").join("tickets.db");

        let store = TicketStore::open(&path).unwrap();
        store
            .upsert_seen("QA-1", None, TicketDisposition::NoChanges, 0)
            .unwrap();
        assert!(path.exists());
    }
}
