//! Runtime configuration from environment variables.
//!
//! `main` loads `.env` with `dotenvy` first, so either source works. Every
//! variable has a default; a value that is present but does not parse is a
//! [`ConfigError`] rather than a silent fallback.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::db::PoolSettings;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/catalog.db";
pub const DEFAULT_DATA_DIR: &str = "data/raw";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

/// Development shows error details to clients; production hides them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Development,
    Production,
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("development") || s.eq_ignore_ascii_case("dev") {
            Ok(RunMode::Development)
        } else if s.eq_ignore_ascii_case("production") || s.eq_ignore_ascii_case("prod") {
            Ok(RunMode::Production)
        } else {
            Err(ConfigError::Invalid {
                name: "APP_ENV",
                value: s.to_string(),
            })
        }
    }
}

impl RunMode {
    pub fn is_production(self) -> bool {
        self == RunMode::Production
    }

    /// Log filter used when `RUST_LOG` is unset.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            RunMode::Development => "debug",
            RunMode::Production => "info",
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub data_dir: PathBuf,
    pub mode: RunMode,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub db_idle_timeout: Duration,
    pub tick_interval: Duration,
    pub cors_origin: String,
    pub shutdown_grace: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        let pool = PoolSettings::default();
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            mode: RunMode::Development,
            db_max_connections: pool.max_connections,
            db_acquire_timeout: pool.acquire_timeout,
            db_idle_timeout: pool.idle_timeout,
            tick_interval: Duration::from_millis(3000),
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parsed(lookup, name, default.as_millis() as u64).map(Duration::from_millis)
}

impl AppConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Reads variables through `lookup`. For tests.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let mode = match lookup("APP_ENV").filter(|v| !v.trim().is_empty()) {
            None => d.mode,
            Some(value) => value.trim().parse()?,
        };
        Ok(Self {
            port: parsed(&lookup, "PORT", d.port)?,
            database_url: lookup("DATABASE_URL").unwrap_or(d.database_url),
            data_dir: lookup("DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            mode,
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", d.db_max_connections)?,
            db_acquire_timeout: millis(&lookup, "DB_ACQUIRE_TIMEOUT_MS", d.db_acquire_timeout)?,
            db_idle_timeout: millis(&lookup, "DB_IDLE_TIMEOUT_MS", d.db_idle_timeout)?,
            tick_interval: millis(&lookup, "TICK_INTERVAL_MS", d.tick_interval)?,
            cors_origin: lookup("CORS_ORIGIN").unwrap_or(d.cors_origin),
            shutdown_grace: parsed(&lookup, "SHUTDOWN_GRACE_SECS", d.shutdown_grace.as_secs())
                .map(Duration::from_secs)?,
        })
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_max_connections,
            acquire_timeout: self.db_acquire_timeout,
            idle_timeout: self.db_idle_timeout,
            ..PoolSettings::default()
        }
    }
}
