//! Relational store: connection pool, schema, lookup reads, instrument reads and writes.
//!
//! The store is SQLite through `sqlx`. Foreign keys are switched on for every
//! connection; the composite keys in [`schema`] depend on it.

pub mod instruments;
pub mod lookups;
pub mod schema;

use std::str::FromStr;
use std::time::Duration;

use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Pool sizing and timeouts. Built from [`crate::config::AppConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// How long a writer waits for another writer's lock before failing.
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 20,
            acquire_timeout: Duration::from_millis(2000),
            idle_timeout: Duration::from_millis(30_000),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Opens a pool on `url` (e.g. `sqlite://data/catalog.db`), creating the
/// database file and its parent directory if needed.
pub async fn connect(url: &str, settings: &PoolSettings) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(settings.busy_timeout);

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(Some(settings.idle_timeout))
        .connect_with(options)
        .await?;
    info!(
        "database pool ready url={} max_connections={}",
        url, settings.max_connections
    );
    Ok(pool)
}
