//! Instrument catalog binary.
//!
//! Subcommands: `serve` (default) runs the REST/WebSocket server, `migrate`
//! creates the schema and seeds the lookup tables, `download` fetches the
//! broker's master files and `ingest` loads them into the store.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use instrument_catalog::api::{self, AppState};
use instrument_catalog::config::AppConfig;
use instrument_catalog::db::{self, schema};
use instrument_catalog::fetcher;
use instrument_catalog::ingest::{IngestOutcome, Ingestor};
use instrument_catalog::live_feed::{spawn_feed, FeedConfig};
use log::{error, info, warn};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "instrument_catalog", version, about = "Broker instrument catalog service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP and WebSocket server.
    Serve,
    /// Create tables and seed lookup data.
    Migrate,
    /// Download master files into the data directory.
    Download {
        /// Only fetch these masters (e.g. NSE_CM). Repeatable.
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Load downloaded master files into the store.
    Ingest {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    let config = AppConfig::from_env().context("invalid configuration")?;
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.mode.default_log_filter()),
    )
    .try_init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let pool = open_store(&config).await?;
            pool.close().await;
            Ok(())
        }
        Command::Download { only, dir } => {
            let sources = fetcher::select_sources(&only)?;
            let dir = dir.unwrap_or_else(|| config.data_dir.clone());
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .context("building HTTP client")?;
            fetcher::download_all(&client, &dir, &sources).await?;
            Ok(())
        }
        Command::Ingest { dir } => {
            let dir = dir.unwrap_or_else(|| config.data_dir.clone());
            let pool = open_store(&config).await?;
            let result = Ingestor::new(pool.clone()).run(&dir).await;
            pool.close().await;
            match result? {
                IngestOutcome::Completed(report) => {
                    info!("ingest complete upserted={} failed={}", report.upserted, report.failed)
                }
                IngestOutcome::Skipped(reason) => info!("ingest skipped reason={:?}", reason),
            }
            Ok(())
        }
    }
}

async fn open_store(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    let pool = db::connect(&config.database_url, &config.pool_settings())
        .await
        .with_context(|| format!("connecting to {}", config.database_url))?;
    schema::migrate(&pool).await.context("running migrations")?;
    Ok(pool)
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let pool = open_store(&config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (feed, mut feed_task) = spawn_feed(
        FeedConfig {
            interval: config.tick_interval,
            ..Default::default()
        },
        shutdown_rx.clone(),
    );

    let state = AppState {
        pool: pool.clone(),
        feed,
        mode: config.mode,
        shutdown: shutdown_rx.clone(),
    };
    let cors = api::cors_layer(&config.cors_origin)
        .with_context(|| format!("invalid CORS_ORIGIN {:?}", config.cors_origin))?;
    let app = api::create_router(state, cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("listening on http://{} mode={:?}", addr, config.mode);

    let mut server_stop = shutdown_rx.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = server_stop.wait_for(|stop| *stop).await;
            })
            .await
    });

    let mut fatal: Option<anyhow::Error> = None;
    let mut server_done = false;
    let mut feed_done = false;
    tokio::select! {
        _ = shutdown_signal() => {}
        res = &mut feed_task => {
            feed_done = true;
            let e = match res {
                Err(join) if join.is_panic() => anyhow!("live feed task panicked"),
                Err(join) => anyhow!("live feed task failed: {join}"),
                Ok(()) => anyhow!("live feed task exited unexpectedly"),
            };
            error!("{e}; shutting down");
            fatal = Some(e);
        }
        res = &mut server => {
            server_done = true;
            let e = match res {
                Ok(Ok(())) => anyhow!("server exited unexpectedly"),
                Ok(Err(io)) => anyhow!("server failed: {io}"),
                Err(join) => anyhow!("server task failed: {join}"),
            };
            error!("{e}; shutting down");
            fatal = Some(e);
        }
    }

    let _ = shutdown_tx.send(true);
    let grace = config.shutdown_grace;
    if !server_done {
        match tokio::time::timeout(grace, &mut server).await {
            Ok(Ok(Ok(()))) => info!("HTTP server closed"),
            Ok(Ok(Err(e))) => error!("HTTP server error during shutdown: {}", e),
            Ok(Err(e)) => error!("HTTP server task failed during shutdown: {}", e),
            Err(_) => {
                warn!("HTTP server did not drain within {}s", grace.as_secs());
                server.abort();
            }
        }
    }
    if !feed_done && tokio::time::timeout(grace, &mut feed_task).await.is_err() {
        feed_task.abort();
    }
    if tokio::time::timeout(grace, pool.close()).await.is_err() {
        warn!("database pool did not close within {}s", grace.as_secs());
    } else {
        info!("database pool closed");
    }

    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("SIGINT received, shutting down gracefully"),
        _ = terminate => info!("SIGTERM received, shutting down gracefully"),
    }
}
