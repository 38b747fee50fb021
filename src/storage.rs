//! Local persistence: the session mirror and per-user sidebar pins.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Create an in-memory database (used for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(conn: &Arc<Mutex<Connection>>) -> Result<MutexGuard<'_, Connection>> {
        conn.lock().map_err(|_| anyhow!("Database lock poisoned"))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = Self::lock(&self.conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        if version < 2 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS pinned_conversations (
                    user_id INTEGER NOT NULL,
                    conversation_id INTEGER NOT NULL,
                    PRIMARY KEY (user_id, conversation_id)
                );

                UPDATE schema_version SET version = 2;",
            )?;
        }

        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let result: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(result)
        })
        .await?
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.clone();
        let key = key.to_string();
        let value = value.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await?
    }

    pub async fn pinned_conversations(&self, user_id: i64) -> Result<HashSet<i64>> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let mut stmt = conn.prepare(
                "SELECT conversation_id FROM pinned_conversations WHERE user_id = ?1",
            )?;
            let ids = stmt
                .query_map(params![user_id], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<HashSet<i64>>>()?;
            Ok(ids)
        })
        .await?
    }

    pub async fn set_pinned(&self, user_id: i64, conversation_id: i64, pinned: bool) -> Result<()> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            if pinned {
                conn.execute(
                    "INSERT OR IGNORE INTO pinned_conversations (user_id, conversation_id) VALUES (?1, ?2)",
                    params![user_id, conversation_id],
                )?;
            } else {
                conn.execute(
                    "DELETE FROM pinned_conversations WHERE user_id = ?1 AND conversation_id = ?2",
                    params![user_id, conversation_id],
                )?;
            }
            Ok(())
        })
        .await?
    }
}
