//! REST and WebSocket router for the instrument catalog.
//!
//! Every handler reads [`AppState`] from an `Extension` layer, so [`create_router`]
//! hands back a stateless router that `axum::serve` can take directly.

use std::any::Any;
use std::collections::HashMap;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path, Query, Request,
    },
    http::{header::InvalidHeaderValue, HeaderValue, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{debug, info};
use sqlx::SqlitePool;
use tokio::sync::{broadcast, watch};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::catalog::CatalogQuery;
use crate::config::RunMode;
use crate::db::{instruments, lookups};
use crate::error::{render_errors, AppError};
use crate::live_feed::{LiveFeed, PriceTick};

/// Shared app state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub feed: LiveFeed,
    pub mode: RunMode,
    /// Flips to `true` when the process starts shutting down; open sockets close on it.
    pub shutdown: watch::Receiver<bool>,
}

/// Success envelope. Paging fields are only present on paged responses.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_records: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<i64>,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: message.into(),
            total_records: None,
            current_page: None,
            total_pages: None,
            data,
        }
    }
}

impl<T: serde::Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// CORS for the browser client at `origin`.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    Ok(CorsLayer::new()
        .allow_origin(origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST]))
}

/// Builds the router with state. Returns `Router<()>` so you can call `.into_make_service()` for `axum::serve`.
pub fn create_router(state: AppState, cors: CorsLayer) -> Router<()> {
    let mode = state.mode;
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/data/instruments", get(list_instruments))
        .route("/api/data/exchanges", get(list_exchanges))
        .route("/api/data/segments", get(list_segments))
        .route("/api/data/instrument-types", get(list_instrument_types))
        .route("/api/data/market-status", get(market_status))
        .route("/api/data/quotes", get(quotes))
        .route("/api/data/history/:symbol", get(history))
        .route("/ws/live", get(ws_live))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(move |req: Request<Body>, next: Next| {
            render_errors(req, next, mode)
        }))
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
        .layer(Extension(state))
}

/// One log line per request.
async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    info!(
        "{} {} status={} latency_ms={}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };
    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}

async fn root() -> impl IntoResponse {
    "Instrument catalog backend is running. Use /api/health for API check."
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "API Health Check: OK")
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Can't find {} on this server!", uri.path()))
}

async fn list_instruments(
    Extension(state): Extension<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Envelope<Vec<crate::types::CatalogEntry>>, AppError> {
    let query = CatalogQuery::from_params(&params)?;
    let page = instruments::fetch_page(&state.pool, &query)
        .await
        .map_err(AppError::database("Failed to fetch instruments."))?;
    info!(
        "instruments fetched count={} total={} page={} limit={} search={:?} exchange={:?} segment={:?} type={:?} sort={}:{}",
        page.entries.len(),
        page.total_records,
        page.current_page,
        query.limit,
        query.search,
        query.exchange.map(|c| c.0),
        query.segment.map(|c| c.0),
        query.instrument_type.map(|c| c.0),
        query.sort_field.column(),
        query.sort_order.as_sql()
    );
    Ok(Envelope {
        total_records: Some(page.total_records),
        current_page: Some(page.current_page),
        total_pages: Some(page.total_pages),
        ..Envelope::success("Instruments fetched successfully.", page.entries)
    })
}

async fn list_exchanges(
    Extension(state): Extension<AppState>,
) -> Result<Envelope<Vec<crate::types::Exchange>>, AppError> {
    let rows = lookups::list_exchanges(&state.pool)
        .await
        .map_err(AppError::database("Failed to fetch exchanges."))?;
    debug!("exchanges fetched count={}", rows.len());
    Ok(Envelope::success("Exchanges fetched successfully.", rows))
}

async fn list_segments(
    Extension(state): Extension<AppState>,
) -> Result<Envelope<Vec<crate::types::Segment>>, AppError> {
    let rows = lookups::list_segments(&state.pool)
        .await
        .map_err(AppError::database("Failed to fetch segments."))?;
    debug!("segments fetched count={}", rows.len());
    Ok(Envelope::success("Segments fetched successfully.", rows))
}

async fn list_instrument_types(
    Extension(state): Extension<AppState>,
) -> Result<Envelope<Vec<crate::types::InstrumentType>>, AppError> {
    let rows = lookups::list_instrument_types(&state.pool)
        .await
        .map_err(AppError::database("Failed to fetch instrument types."))?;
    debug!("instrument types fetched count={}", rows.len());
    Ok(Envelope::success("Instrument types fetched successfully.", rows))
}

async fn market_status() -> Envelope<serde_json::Value> {
    Envelope::success(
        "This endpoint will return market status.",
        serde_json::json!({ "NSE": "OPEN", "BSE": "CLOSED" }),
    )
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

#[derive(Debug, serde::Serialize)]
struct PlaceholderQuote {
    ltp: f64,
    volume: u64,
}

async fn quotes(
    Query(params): Query<HashMap<String, String>>,
) -> Result<Envelope<HashMap<String, PlaceholderQuote>>, AppError> {
    let symbols = required(&params, "symbols").ok_or_else(|| {
        AppError::BadRequest("Symbols query parameter is required for quotes.".into())
    })?;
    let data = symbols
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            (
                s.to_string(),
                PlaceholderQuote {
                    ltp: 100.5,
                    volume: 100_000,
                },
            )
        })
        .collect();
    Ok(Envelope::success(
        format!("This endpoint will return live quotes for symbols: {symbols}."),
        data,
    ))
}

#[derive(Debug, serde::Serialize)]
struct PlaceholderCandle {
    time: &'static str,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

static PLACEHOLDER_CANDLES: [PlaceholderCandle; 2] = [
    PlaceholderCandle {
        time: "2023-01-01",
        open: 100.0,
        high: 105.0,
        low: 98.0,
        close: 103.0,
        volume: 5000,
    },
    PlaceholderCandle {
        time: "2023-01-02",
        open: 103.0,
        high: 108.0,
        low: 102.0,
        close: 107.0,
        volume: 6000,
    },
];

async fn history(
    Path(symbol): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Envelope<&'static [PlaceholderCandle]>, AppError> {
    let missing = symbol.trim().is_empty()
        || ["resolution", "range_from", "range_to"]
            .iter()
            .any(|name| required(&params, name).is_none());
    if missing {
        return Err(AppError::BadRequest(
            "Symbol, resolution, range_from, and range_to query parameters are required for historical data."
                .into(),
        ));
    }
    Ok(Envelope::success(
        format!("This endpoint will return historical data for {symbol}."),
        &PLACEHOLDER_CANDLES[..],
    ))
}

async fn ws_live(ws: WebSocketUpgrade, Extension(state): Extension<AppState>) -> Response {
    let rx = state.feed.subscribe();
    let shutdown = state.shutdown.clone();
    ws.on_upgrade(move |socket| live_loop(socket, rx, shutdown))
}

/// Forwards feed ticks to one client until it disconnects, the feed ends, or the server shuts down.
async fn live_loop(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<PriceTick>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("live client connected");
    loop {
        tokio::select! {
            tick = rx.recv() => match tick {
                Ok(tick) => {
                    let Ok(text) = serde_json::to_string(&tick) else { continue };
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("live client lagged skipped={}", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }
    info!("live client disconnected");
}
