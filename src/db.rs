//! SQLite-backed key/value store standing in for browser local storage.
//!
//! Uses rusqlite with WAL mode. Every row is scoped to an origin so several
//! shops can share one database file without seeing each other's keys.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::error::{PosError, Result};
use crate::storage::KeyValueStore;

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 1;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    origin: String,
    pub db_path: PathBuf,
}

impl SqliteStore {
    /// Open `{data_dir}/storage.db`, creating the directory if needed.
    ///
    /// On corruption or open failure the file (with its WAL and shared-memory
    /// companions) is renamed to `storage.db.corrupt-<timestamp>` and the open
    /// is retried once against a fresh file.
    pub fn open(data_dir: &Path, origin: &str) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .map_err(|e| PosError::StorageInit(format!("Failed to create data dir: {e}")))?;

        let db_path = data_dir.join("storage.db");
        info!("Opening storage at {}", db_path.display());

        let conn = match open_and_configure(&db_path) {
            Ok(c) => c,
            Err(first_err) => {
                warn!(
                    "Storage open failed ({}), moving the file aside and retrying once",
                    first_err
                );
                quarantine(&db_path)?;
                open_and_configure(&db_path).map_err(|e| {
                    PosError::StorageInit(format!("Storage open failed after retry: {e}"))
                })?
            }
        };

        run_migrations(&conn)?;
        info!("Storage initialized (schema v{CURRENT_SCHEMA_VERSION})");

        Ok(Self {
            conn: Mutex::new(conn),
            origin: origin.to_string(),
            db_path,
        })
    }

    pub fn open_in_memory(origin: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            origin: origin.to_string(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Rename `db_path` and its `-wal`/`-shm` companions out of the way, keeping
/// their contents for recovery.
fn quarantine(db_path: &Path) -> Result<()> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    for suffix in ["", "-wal", "-shm"] {
        let mut from = db_path.as_os_str().to_owned();
        from.push(suffix);
        let from = PathBuf::from(from);
        if !from.exists() {
            continue;
        }
        let mut to = db_path.as_os_str().to_owned();
        to.push(format!(".corrupt-{stamp}{suffix}"));
        let to = PathBuf::from(to);
        fs::rename(&from, &to).map_err(|e| {
            PosError::StorageInit(format!(
                "Failed to move {} aside: {e}",
                from.display()
            ))
        })?;
        warn!("Moved {} to {}", from.display(), to.display());
    }
    Ok(())
}

fn open_and_configure(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(conn)
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Storage schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating storage from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    Ok(())
}

/// Migration v1: the key/value table.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS local_storage (
            origin TEXT NOT NULL,
            storage_key TEXT NOT NULL,
            storage_value TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (origin, storage_key)
        );
        INSERT INTO schema_version (version) VALUES (1);
        COMMIT;",
    )?;
    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT storage_value FROM local_storage WHERE origin = ?1 AND storage_key = ?2",
                params![self.origin, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO local_storage (origin, storage_key, storage_value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(origin, storage_key) DO UPDATE SET
                storage_value = excluded.storage_value,
                updated_at = excluded.updated_at",
            params![self.origin, key, value],
        )?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM local_storage WHERE origin = ?1 AND storage_key = ?2",
            params![self.origin, key],
        )?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT storage_key FROM local_storage WHERE origin = ?1 ORDER BY storage_key",
        )?;
        let rows = stmt.query_map(params![self.origin], |row| row.get::<_, String>(0))?;
        let keys: Vec<String> = rows.filter_map(|r| r.ok()).collect();
        Ok(keys)
    }
}
