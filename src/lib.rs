//! # Instrument Catalog
//!
//! Backend for a broker's instrument master: download the public symbol-master
//! files, normalize and load them into a relational store, and serve the
//! catalog over REST with search, filters, sorting and paging. A demo price
//! feed is pushed over WebSocket.
//!
//! ## Pipeline
//!
//! [`fetcher::download_all`] → files on disk → [`ingest::Ingestor::run`]
//! ([`raw`] parsing, [`normalize`], upsert into [`db`]) → [`api::create_router`].
//!
//! ## Example
//!
//! ```rust
//! use instrument_catalog::normalize::normalize_record;
//! use instrument_catalog::raw::RawRecord;
//!
//! let raw = RawRecord::from_json(
//!     "NSE:NIFTY25JULFUT",
//!     serde_json::json!({
//!         "symTicker": "NSE:NIFTY25JULFUT",
//!         "fyToken": "1011250731",
//!         "exToken": 35001,
//!         "exSymbol": "NIFTY",
//!         "exSymName": "NIFTY",
//!         "exchange": 10,
//!         "exchangeName": "NSE",
//!         "segment": 11,
//!         "exInstType": 11,
//!         "currencyCode": "INR",
//!         "tradeStatus": 1,
//!         "strikePrice": -1.0,
//!         "optType": "XX",
//!         "isin": "NA"
//!     }),
//! );
//! let record = normalize_record(&raw).unwrap();
//! assert_eq!(record.ticker, "NSE:NIFTY25JULFUT");
//! assert!(record.trade_status);
//! assert_eq!(record.strike_price, None);
//! assert_eq!(record.option_type, None);
//! assert_eq!(record.isin, None);
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod ingest;
pub mod live_feed;
pub mod normalize;
pub mod raw;
pub mod types;

pub use api::{create_router, AppState};
pub use catalog::{CatalogQuery, QueryError, SortField, SortOrder};
pub use config::{AppConfig, ConfigError, RunMode};
pub use error::AppError;
pub use fetcher::{download_all, FetchError, Source};
pub use ingest::{IngestError, IngestOutcome, IngestReport, Ingestor, SkipReason};
pub use live_feed::{spawn_feed, FeedConfig, LiveFeed, PriceTick, TickGenerator};
pub use types::{
    CatalogEntry, Exchange, ExchangeCode, Instrument, InstrumentPage, InstrumentRecord, InstrumentType,
    InstrumentTypeCode, Segment, SegmentCode,
};
