//! Field normalization for broker records.
//!
//! Every function here is pure and total: any [`RawValue`], including absent,
//! empty, malformed, or wrongly typed input, maps to a defined output. Only
//! [`normalize_record`] can fail, and only when a field the store requires is
//! missing.

use chrono::{DateTime, NaiveDate};

use crate::raw::{RawRecord, RawValue};
use crate::types::{ExchangeCode, InstrumentRecord, InstrumentTypeCode, SegmentCode};

/// Strike price sent for instruments that have none.
pub const STRIKE_NOT_APPLICABLE: f64 = -1.0;
/// Option type sent for instruments that are not options.
pub const OPTION_TYPE_NOT_APPLICABLE: &str = "XX";
/// ISIN placeholder sent when the exchange has not assigned one.
pub const ISIN_NOT_AVAILABLE: &str = "NA";

/// A record that cannot be stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("required field `{0}` is missing or invalid")]
    MissingField(&'static str),
}

/// Trimmed, non-empty text. Numbers are rendered in their JSON form.
pub fn text(value: RawValue<'_>) -> Option<String> {
    match value {
        RawValue::Text(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        RawValue::Number(n) => Some(n.to_string()),
        RawValue::Absent | RawValue::Bool(_) | RawValue::Unsupported => None,
    }
}

/// Finite float from a number or numeric string.
pub fn float(value: RawValue<'_>) -> Option<f64> {
    let parsed = match value {
        RawValue::Number(n) => n.as_f64(),
        RawValue::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// 64-bit integer from a number or numeric string. Integral floats (`10.0`,
/// `"1750154400.0"`) are accepted; fractional values are not.
pub fn integer(value: RawValue<'_>) -> Option<i64> {
    match value {
        RawValue::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)),
        RawValue::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
        }
        _ => None,
    }
}

fn integral_f64(v: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn small_integer(value: RawValue<'_>) -> Option<i32> {
    integer(value).and_then(|v| i32::try_from(v).ok())
}

/// Unix timestamp in seconds (expiry, freeze quantity and other large integers).
pub fn timestamp(value: RawValue<'_>) -> Option<i64> {
    integer(value)
}

/// Margin-tradable style flags: the source sends a number, `1` meaning yes.
/// A missing field stays unknown rather than becoming `false`.
pub fn flag(value: RawValue<'_>) -> Option<bool> {
    match value {
        RawValue::Number(n) => Some(n.as_f64() == Some(1.0)),
        RawValue::Bool(b) => Some(b),
        _ => None,
    }
}

/// Trade status is mandatory: `1` (number or string) is active, anything else inactive.
pub fn trade_status(value: RawValue<'_>) -> bool {
    integer(value) == Some(1)
}

pub fn strike_price(value: RawValue<'_>) -> Option<f64> {
    float(value).filter(|price| *price != STRIKE_NOT_APPLICABLE)
}

pub fn option_type(value: RawValue<'_>) -> Option<String> {
    text(value).filter(|kind| kind != OPTION_TYPE_NOT_APPLICABLE)
}

pub fn isin(value: RawValue<'_>) -> Option<String> {
    text(value).filter(|isin| isin != ISIN_NOT_AVAILABLE)
}

/// Calendar date from `YYYY-MM-DD` text or a Unix timestamp in seconds (UTC).
/// `""`, `"none"` and `"null"` (any case) are absent.
pub fn date(value: RawValue<'_>) -> Option<NaiveDate> {
    match value {
        RawValue::Number(_) => timestamp(value).and_then(date_from_unix),
        RawValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null") {
                return None;
            }
            match integer(value) {
                Some(seconds) => date_from_unix(seconds),
                None => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            }
        }
        _ => None,
    }
}

fn date_from_unix(seconds: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.date_naive())
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, NormalizeError> {
    value.ok_or(NormalizeError::MissingField(field))
}

/// Turns one raw broker record into an [`InstrumentRecord`].
pub fn normalize_record(raw: &RawRecord) -> Result<InstrumentRecord, NormalizeError> {
    Ok(InstrumentRecord {
        ticker: required("symTicker", text(raw.get("symTicker")))?,
        broker_token: required("fyToken", text(raw.get("fyToken")))?,
        exchange_token: required("exToken", integer(raw.get("exToken")))?,
        exchange_symbol: required("exSymbol", text(raw.get("exSymbol")))?,
        symbol_name: required("exSymName", text(raw.get("exSymName")))?,
        exchange_id: ExchangeCode(required("exchange", small_integer(raw.get("exchange")))?),
        exchange_name: required("exchangeName", text(raw.get("exchangeName")))?,
        segment_id: SegmentCode(required("segment", small_integer(raw.get("segment")))?),
        instrument_type: InstrumentTypeCode(required(
            "exInstType",
            small_integer(raw.get("exInstType")),
        )?),
        trade_status: trade_status(raw.get("tradeStatus")),
        currency_code: required("currencyCode", text(raw.get("currencyCode")))?,
        last_update: date(raw.get("lastUpdate")),

        underlying_symbol: text(raw.get("underSym")),
        underlying_token: text(raw.get("underFyTok")),
        series: text(raw.get("exSeries")),
        option_type: option_type(raw.get("optType")),
        expiry: timestamp(raw.get("expiryDate")),
        strike_price: strike_price(raw.get("strikePrice")),

        min_lot_size: integer(raw.get("minLotSize")),
        tick_size: float(raw.get("tickSize")),
        upper_price: float(raw.get("upperPrice")),
        lower_price: float(raw.get("lowerPrice")),
        face_value: float(raw.get("faceValue")),
        qty_multiplier: float(raw.get("qtyMultiplier")),
        qty_freeze: integer(raw.get("qtyFreeze")),
        previous_close: float(raw.get("previousClose")),
        previous_oi: float(raw.get("previousOi")),

        is_mtf_tradable: flag(raw.get("is_mtf_tradable")),
        mtf_margin: float(raw.get("mtf_margin")),

        isin: isin(raw.get("isin")),
        trading_session: text(raw.get("tradingSession")),
        surveillance_flag: text(raw.get("asmGsmVal")),
        stream: text(raw.get("stream")),
        cautionary_msg: text(raw.get("cautionary_msg")),
        product_code: text(raw.get("productCode")),
        full_description: text(raw.first_present(&["symbolDetails", "symDetails", "symbolDesc"])),
        short_name: text(raw.get("short_name")),
        display_name_mobile: text(raw.get("display_format_mob")),
    })
}
