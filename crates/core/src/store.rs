//! SQLite store
//!
//! The [`Database`] handle only holds the file path. Every unit of work opens
//! its own short-lived [`Connection`], so request handlers and broker message
//! handlers never share a session.
//!
//! # Tables
//!
//! - `boats`: owner's vessel
//! - `devices`: relay/channel controllers with protected keys and presence
//! - `channels`: logical outputs, pin unique per boat
//! - `device_commands`: command ledger rows, never deleted
//! - `telemetry`: append-only samples

use rusqlite::{types::Type, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS boats (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    name TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_boats_owner ON boats(owner_id);

CREATE TABLE IF NOT EXISTS devices (
    id TEXT PRIMARY KEY,
    boat_id TEXT NOT NULL REFERENCES boats(id),
    name TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    key_protected TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_online INTEGER NOT NULL DEFAULT 0,
    last_seen_ms INTEGER,
    created_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_devices_boat ON devices(boat_id);

CREATE TABLE IF NOT EXISTS channels (
    id TEXT PRIMARY KEY,
    boat_id TEXT NOT NULL REFERENCES boats(id),
    name TEXT NOT NULL,
    channel_type TEXT NOT NULL,
    pin INTEGER NOT NULL,
    state INTEGER NOT NULL DEFAULT 0,
    UNIQUE(boat_id, pin)
);

CREATE TABLE IF NOT EXISTS device_commands (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id TEXT NOT NULL REFERENCES devices(id),
    type TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    created_ms INTEGER NOT NULL,
    dequeued_ms INTEGER,
    acked_ms INTEGER
);

CREATE INDEX IF NOT EXISTS idx_commands_device ON device_commands(device_id, id);

CREATE TABLE IF NOT EXISTS telemetry (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    boat_id TEXT NOT NULL,
    device_id TEXT,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    created_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_telemetry_boat_time ON telemetry(boat_id, created_ms);
"#;

/// Cloneable handle to the SQLite database file.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Open (or create) the database and initialize the schema.
    pub fn open(path: impl AsRef<Path>, busy_timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        info!(path = %path.display(), "Opening marinelink database");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Self {
            path,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
        };

        let conn = db.connect()?;
        // WAL is persistent on the file, set once
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;

        Ok(db)
    }

    /// Open a fresh connection for one unit of work.
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fresh database file under the system temp dir, for tests.
    #[doc(hidden)]
    pub fn open_temp(prefix: &str) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("{}_{}.db", prefix, Uuid::new_v4()));
        Self::open(path, 5000)
    }
}

/// Read a TEXT column holding a hyphenated UUID.
pub fn column_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Nullable variant of [`column_uuid`].
pub fn column_uuid_opt(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        Uuid::parse_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_schema() {
        let db_path = std::env::temp_dir().join(format!("test_store_{}.db", uuid::Uuid::new_v4()));

        let db = Database::open(&db_path, 1000).unwrap();
        let conn = db.connect().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('boats', 'devices', 'channels', 'device_commands', 'telemetry')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);

        // Re-opening an existing file is idempotent
        Database::open(&db_path, 1000).unwrap();

        std::fs::remove_file(db_path).ok();
    }
}
