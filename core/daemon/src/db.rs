//! SQLite persistence for hide-daemon.
//!
//! Two tables: `hidelist` holds one row per (package, process) pair and
//! `settings` holds integer flags keyed by name.

use hide_core::Persistence;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::PathBuf;

const HIDE_ENABLED_KEY: &str = "process_hide";

pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new(path: PathBuf) -> Result<Self, String> {
        let db = Self { path };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS hidelist (
                    package_name TEXT NOT NULL,
                    process TEXT NOT NULL,
                    PRIMARY KEY (package_name, process)
                 );
                 CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value INTEGER NOT NULL
                 );
                 COMMIT;",
            )
            .map_err(|err| format!("Failed to initialize schema: {}", err))
        })
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, String>,
    ) -> Result<T, String> {
        let mut conn = self.open()?;
        op(&mut conn)
    }

    fn open(&self) -> Result<Connection, String> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|err| format!("Failed to create daemon data dir: {}", err))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|err| format!("Failed to open sqlite db: {}", err))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| format!("Failed to enable WAL: {}", err))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| format!("Failed to set synchronous: {}", err))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|err| format!("Failed to set busy_timeout: {}", err))?;

        Ok(conn)
    }
}

impl Persistence for Db {
    fn for_each_entry(&self, row: &mut dyn FnMut(&str, &str) -> bool) -> Result<(), String> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare("SELECT package_name, process FROM hidelist")
                .map_err(|err| format!("Failed to prepare hidelist query: {}", err))?;
            let mut rows = stmt
                .query([])
                .map_err(|err| format!("Failed to read hidelist rows: {}", err))?;

            while let Some(entry) = rows
                .next()
                .map_err(|err| format!("Failed to step hidelist rows: {}", err))?
            {
                let package: String = entry
                    .get(0)
                    .map_err(|err| format!("Failed to decode package_name: {}", err))?;
                let process: String = entry
                    .get(1)
                    .map_err(|err| format!("Failed to decode process: {}", err))?;
                if !row(&package, &process) {
                    break;
                }
            }
            Ok(())
        })
    }

    fn insert_entry(&self, package: &str, process: &str) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO hidelist (package_name, process) VALUES (?1, ?2) \
                 ON CONFLICT(package_name, process) DO NOTHING",
                params![package, process],
            )
            .map_err(|err| format!("Failed to insert hidelist entry: {}", err))?;
            Ok(())
        })
    }

    fn delete_entry(&self, package: &str, process: Option<&str>) -> Result<(), String> {
        self.with_connection(|conn| {
            let result = match process {
                Some(process) => conn.execute(
                    "DELETE FROM hidelist WHERE package_name = ?1 AND process = ?2",
                    params![package, process],
                ),
                None => conn.execute(
                    "DELETE FROM hidelist WHERE package_name = ?1",
                    params![package],
                ),
            };
            result.map_err(|err| format!("Failed to delete hidelist entry: {}", err))?;
            Ok(())
        })
    }

    fn hide_enabled(&self) -> Result<bool, String> {
        let value = self.with_connection(|conn| {
            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![HIDE_ENABLED_KEY],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|err| format!("Failed to read hide setting: {}", err))
        })?;
        Ok(value.unwrap_or(0) != 0)
    }

    fn set_hide_enabled(&self, enabled: bool) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![HIDE_ENABLED_KEY, i64::from(enabled)],
            )
            .map_err(|err| format!("Failed to write hide setting: {}", err))?;
            Ok(())
        })
    }
}
