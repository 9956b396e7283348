#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use instrument_catalog::api::{self, AppState};
use instrument_catalog::config::RunMode;
use instrument_catalog::db::{self, schema, PoolSettings};
use instrument_catalog::live_feed::{spawn_feed, FeedConfig};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::sync::watch;

pub struct TestDb {
    _dir: TempDir, // keep alive for the life of the test
    pub pool: SqlitePool,
}

/// Migrated, seeded database in a fresh temp directory.
pub async fn setup_db() -> TestDb {
    setup_db_with(PoolSettings::default()).await
}

pub async fn setup_db_with(settings: PoolSettings) -> TestDb {
    let dir = TempDir::new().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let pool = db::connect(&url, &settings).await.expect("connect");
    schema::migrate(&pool).await.expect("migrations");
    TestDb { _dir: dir, pool }
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub db: TestDb,
    /// Dropping this closes open sockets; tests hold it for their whole run.
    pub shutdown: watch::Sender<bool>,
    _server: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(RunMode::Development, Duration::from_millis(20)).await
}

pub async fn spawn_app_with(mode: RunMode, tick_interval: Duration) -> TestApp {
    let db = setup_db().await;
    let (shutdown, shutdown_rx) = watch::channel(false);
    let (feed, _feed_task) = spawn_feed(
        FeedConfig {
            seed: Some(7),
            interval: tick_interval,
            ..Default::default()
        },
        shutdown_rx.clone(),
    );
    let state = AppState {
        pool: db.pool.clone(),
        feed,
        mode,
        shutdown: shutdown_rx,
    };
    let cors = api::cors_layer("http://localhost:5173").unwrap();
    let app = api::create_router(state, cors);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    TestApp {
        addr,
        db,
        shutdown,
        _server: handle,
    }
}

/// A complete broker record. Override fields with [`with`].
pub fn record(ticker: &str, token: &str, exchange: i32, segment: i32, inst_type: i32) -> Value {
    let exchange_name = match exchange {
        10 => "NSE",
        11 => "MCX",
        12 => "BSE",
        _ => "UNKNOWN",
    };
    json!({
        "symTicker": ticker,
        "fyToken": token,
        "exToken": 1001,
        "exSymbol": ticker.split(':').nth(1).unwrap_or(ticker),
        "exSymName": format!("{ticker} name"),
        "exchange": exchange,
        "exchangeName": exchange_name,
        "segment": segment,
        "exInstType": inst_type,
        "tradeStatus": 1,
        "currencyCode": "INR",
        "lastUpdate": "2025-06-05",
        "optType": "XX",
        "strikePrice": -1.0,
        "isin": "NA",
        "minLotSize": 1,
        "tickSize": 0.05
    })
}

pub fn with(mut value: Value, field: &str, v: Value) -> Value {
    value[field] = v;
    value
}

/// Writes `records` as a master file keyed by broker token.
pub fn write_master(dir: &Path, file_name: &str, records: &[Value]) {
    let mut map = serde_json::Map::new();
    for r in records {
        let key = r["fyToken"].as_str().unwrap_or("key").to_string();
        map.insert(key, r.clone());
    }
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file_name), Value::Object(map).to_string()).unwrap();
}
