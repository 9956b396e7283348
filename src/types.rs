//! Catalog data model: lookup rows, the normalized instrument record, and the
//! joined row returned by the catalog endpoint.
//!
//! Lookup codes are newtype wrappers. Instrument-type codes are only unique
//! within a segment, so an instrument type is always addressed by
//! ([`InstrumentTypeCode`], [`SegmentCode`]).
//!
//! Wire names (serde) follow the broker's camelCase field names so that the
//! `sortBy` parameter and the response keys use the same vocabulary.

use chrono::{NaiveDate, NaiveDateTime};

/// Exchange code assigned by the broker (10 NSE, 11 MCX, 12 BSE).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct ExchangeCode(pub i32);

/// Segment code assigned by the broker (10 CM, 11 FO, 12 CD, 20 COM).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct SegmentCode(pub i32);

/// Instrument-type code. Not globally unique: pair it with a [`SegmentCode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct InstrumentTypeCode(pub i32);

#[derive(Clone, Debug, PartialEq, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    #[serde(rename = "id")]
    pub code: ExchangeCode,
    pub name: String,
    pub full_name: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(rename = "id")]
    pub code: SegmentCode,
    pub name: String,
}

/// Instrument type keyed by (type code, segment code).
#[derive(Clone, Debug, PartialEq, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentType {
    #[serde(rename = "id")]
    pub type_code: InstrumentTypeCode,
    #[serde(rename = "segmentId")]
    pub segment_code: SegmentCode,
    pub name: String,
}

/// One allowed (exchange, segment) pairing. Instruments outside this list are rejected by the store.
#[derive(Clone, Debug, PartialEq, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeSegmentCombination {
    #[serde(rename = "exchangeId")]
    pub exchange_code: ExchangeCode,
    #[serde(rename = "segmentId")]
    pub segment_code: SegmentCode,
    pub exchange_name: String,
    pub segment_name: String,
}

/// A normalized instrument as produced by [`crate::normalize::normalize_record`]
/// and written by the ingestion upsert.
///
/// Every optional field is `None` when the source value was missing, empty,
/// malformed, or a "not applicable" sentinel.
#[derive(Clone, Debug, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct InstrumentRecord {
    #[serde(rename = "symTicker")]
    pub ticker: String,
    #[serde(rename = "fyToken")]
    pub broker_token: String,
    #[serde(rename = "exToken")]
    pub exchange_token: i64,
    #[serde(rename = "exSymbol")]
    pub exchange_symbol: String,
    #[serde(rename = "exSymName")]
    pub symbol_name: String,
    #[serde(rename = "exchangeId")]
    pub exchange_id: ExchangeCode,
    #[serde(rename = "exchangeName")]
    pub exchange_name: String,
    #[serde(rename = "segmentId")]
    pub segment_id: SegmentCode,
    #[serde(rename = "exInstType")]
    pub instrument_type: InstrumentTypeCode,
    #[serde(rename = "tradeStatus")]
    pub trade_status: bool,
    #[serde(rename = "currencyCode")]
    pub currency_code: String,
    #[serde(rename = "lastUpdate")]
    pub last_update: Option<NaiveDate>,

    #[serde(rename = "underSym")]
    pub underlying_symbol: Option<String>,
    #[serde(rename = "underFyTok")]
    pub underlying_token: Option<String>,
    #[serde(rename = "exSeries")]
    pub series: Option<String>,
    #[serde(rename = "optType")]
    pub option_type: Option<String>,
    /// Unix seconds; expiry carries a time of day so it is not stored as a date.
    #[serde(rename = "expiryDate")]
    pub expiry: Option<i64>,
    #[serde(rename = "strikePrice")]
    pub strike_price: Option<f64>,

    #[serde(rename = "minLotSize")]
    pub min_lot_size: Option<i64>,
    #[serde(rename = "tickSize")]
    pub tick_size: Option<f64>,
    #[serde(rename = "upperPrice")]
    pub upper_price: Option<f64>,
    #[serde(rename = "lowerPrice")]
    pub lower_price: Option<f64>,
    #[serde(rename = "faceValue")]
    pub face_value: Option<f64>,
    #[serde(rename = "qtyMultiplier")]
    pub qty_multiplier: Option<f64>,
    #[serde(rename = "qtyFreeze")]
    pub qty_freeze: Option<i64>,
    #[serde(rename = "previousClose")]
    pub previous_close: Option<f64>,
    #[serde(rename = "previousOi")]
    pub previous_oi: Option<f64>,

    #[serde(rename = "isMtfTradable")]
    pub is_mtf_tradable: Option<bool>,
    #[serde(rename = "mtfMargin")]
    pub mtf_margin: Option<f64>,

    pub isin: Option<String>,
    #[serde(rename = "tradingSession")]
    pub trading_session: Option<String>,
    #[serde(rename = "asmGsmVal")]
    pub surveillance_flag: Option<String>,
    pub stream: Option<String>,
    #[serde(rename = "cautionaryMsg")]
    pub cautionary_msg: Option<String>,
    #[serde(rename = "productCode")]
    pub product_code: Option<String>,
    #[serde(rename = "fullDescription")]
    pub full_description: Option<String>,
    #[serde(rename = "shortName")]
    pub short_name: Option<String>,
    #[serde(rename = "displayNameMobile")]
    pub display_name_mobile: Option<String>,
}

/// A stored instrument row: the normalized record plus surrogate id and store timestamps.
#[derive(Clone, Debug, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct Instrument {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub record: InstrumentRecord,
    #[serde(rename = "createdAt")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "updatedAt")]
    pub updated_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeDetails {
    pub id: ExchangeCode,
    pub name: String,
    pub full_name: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SegmentDetails {
    pub id: SegmentCode,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct InstrumentTypeDetails {
    pub id: InstrumentTypeCode,
    pub name: String,
}

/// Catalog row: an instrument with its exchange, segment, and instrument-type names joined in.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub instrument: Instrument,
    pub exchange_details: Option<ExchangeDetails>,
    pub segment_details: Option<SegmentDetails>,
    pub instrument_type_details: Option<InstrumentTypeDetails>,
}

/// One page of catalog results.
#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentPage {
    pub entries: Vec<CatalogEntry>,
    /// Rows matching the filters, ignoring pagination.
    pub total_records: i64,
    pub current_page: i64,
    pub total_pages: i64,
}
