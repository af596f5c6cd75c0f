//! SQLite-backed persistence.
//!
//! Provides:
//! - Key-value store (the contact list lives here)
//! - Escalation history, one row per finished cycle

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::data_dir;
use crate::contacts::KeyValueStore;
use crate::error::{CoreError, DatabaseError};
use crate::escalation::{CycleOutcome, CycleRecord};

/// A stored escalation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    #[serde(flatten)]
    pub record: CycleRecord,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data dir>/jolt.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("jolt.db");
        Self::open_at(&path)
    }

    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS escalations (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id   TEXT NOT NULL,
                outcome      TEXT NOT NULL,
                magnitude    REAL NOT NULL,
                confidence   REAL NOT NULL,
                triggered_at TEXT NOT NULL,
                finished_at  TEXT NOT NULL,
                delivered    INTEGER NOT NULL DEFAULT 0,
                failed       INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_escalations_finished_at ON escalations(finished_at);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Store a finished escalation cycle.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_cycle(&self, record: &CycleRecord) -> Result<i64, CoreError> {
        self.conn.execute(
            "INSERT INTO escalations
                (session_id, outcome, magnitude, confidence, triggered_at, finished_at, delivered, failed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.session_id.to_string(),
                record.outcome.as_str(),
                f64::from(record.magnitude),
                f64::from(record.confidence),
                record.triggered_at.to_rfc3339(),
                record.finished_at.to_rfc3339(),
                record.delivered as i64,
                record.failed as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent cycles first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored row is corrupt.
    pub fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, outcome, magnitude, confidence,
                    triggered_at, finished_at, delivered, failed
             FROM escalations
             ORDER BY finished_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, i64>(8)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, session_id, outcome, magnitude, confidence, triggered_at, finished_at, delivered, failed) =
                row?;
            let corrupt = |what: &str| {
                DatabaseError::QueryFailed(format!("escalation {id} has invalid {what}"))
            };
            entries.push(HistoryEntry {
                id,
                record: CycleRecord {
                    session_id: Uuid::parse_str(&session_id).map_err(|_| corrupt("session_id"))?,
                    outcome: outcome
                        .parse::<CycleOutcome>()
                        .map_err(|_| corrupt("outcome"))?,
                    magnitude: magnitude as f32,
                    confidence: confidence as f32,
                    triggered_at: parse_timestamp(&triggered_at).ok_or_else(|| corrupt("triggered_at"))?,
                    finished_at: parse_timestamp(&finished_at).ok_or_else(|| corrupt("finished_at"))?,
                    delivered: delivered.max(0) as usize,
                    failed: failed.max(0) as usize,
                },
            });
        }
        Ok(entries)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.kv_get(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        Ok(self.kv_set(key, value)?)
    }
}
