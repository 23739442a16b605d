//! SQLite-backed persistent memory store.
//!
//! Split into focused submodules:
//! - `profiles`: lazily created profiles, style, voice mode, and the fact set
//! - `history`: bounded per-user turn history
//! - `reminders`: pending reminder CRUD

mod history;
mod profiles;
mod reminders;

use chrono::{DateTime, NaiveDateTime, Utc};
use sauti_core::{config::MemoryConfig, error::SautiError, shellexpand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Timestamp format stored in TEXT columns. Sorts lexicographically.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Persistent memory store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    history_capacity: usize,
}

impl Store {
    /// Create a new store, running migrations on first use.
    pub async fn new(config: &MemoryConfig) -> Result<Self, SautiError> {
        let db_path = shellexpand(&config.db_path);

        // Ensure parent directory exists.
        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SautiError::Memory(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| SautiError::Memory(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| SautiError::Memory(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Memory store initialized at {db_path}");

        Ok(Self {
            pool,
            history_capacity: config.history_capacity.max(1),
        })
    }

    /// A private in-memory database. Used by tests across the workspace.
    pub async fn in_memory(history_capacity: usize) -> Result<Self, SautiError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| SautiError::Memory(format!("invalid db path: {e}")))?
            .create_if_missing(true);
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(|e| SautiError::Memory(format!("failed to connect to sqlite: {e}")))?;
        Self::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            history_capacity: history_capacity.max(1),
        })
    }

    /// Get the database file size in bytes.
    pub async fn db_size(&self) -> Result<u64, SautiError> {
        let (page_count,): (i64,) = sqlx::query_as("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SautiError::Memory(format!("pragma failed: {e}")))?;

        let (page_size,): (i64,) = sqlx::query_as("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SautiError::Memory(format!("pragma failed: {e}")))?;

        Ok((page_count * page_size) as u64)
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), SautiError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| SautiError::Memory(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] = &[
            ("001_init", include_str!("../../migrations/001_init.sql")),
            (
                "002_reminders",
                include_str!("../../migrations/002_reminders.sql"),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        SautiError::Memory(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| SautiError::Memory(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    SautiError::Memory(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }
}

pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, SautiError> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| SautiError::Memory(format!("bad timestamp '{s}': {e}")))
}
