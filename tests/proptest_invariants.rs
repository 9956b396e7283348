//! Property-based invariant tests.
//!
//! Normalization is total over arbitrary JSON (never panics, never leaks a
//! "not applicable" sentinel), page math partitions any result set, and the
//! seeded price feed is reproducible.

use std::collections::HashMap;

use instrument_catalog::catalog::{like_pattern, total_pages, CatalogQuery, MAX_LIMIT};
use instrument_catalog::live_feed::{FeedConfig, TickGenerator};
use instrument_catalog::normalize::{
    self, normalize_record, OPTION_TYPE_NOT_APPLICABLE, STRIKE_NOT_APPLICABLE,
};
use instrument_catalog::raw::{RawRecord, RawValue};
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        any::<f64>().prop_map(|f| Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)),
        Just(Value::from(-1.0)),
        Just(Value::from("XX")),
        Just(Value::from("NA")),
        Just(Value::from("None")),
        Just(Value::from("")),
        "[ -~]{0,12}".prop_map(Value::String),
        "-?[0-9]{1,19}(\\.[0-9]{0,3})?".prop_map(Value::String),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
            prop::collection::hash_map("[a-z]{1,4}", inner, 0..3)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

const FIELDS: [&str; 16] = [
    "symTicker",
    "fyToken",
    "exToken",
    "exSymbol",
    "exSymName",
    "exchange",
    "exchangeName",
    "segment",
    "exInstType",
    "currencyCode",
    "strikePrice",
    "optType",
    "isin",
    "lastUpdate",
    "qtyFreeze",
    "is_mtf_tradable",
];

fn broker_record() -> impl Strategy<Value = Value> {
    prop::collection::vec(prop::option::of(json_value()), FIELDS.len()).prop_map(|values| {
        let mut map = Map::new();
        for (name, value) in FIELDS.iter().zip(values) {
            if let Some(v) = value {
                map.insert(name.to_string(), v);
            }
        }
        Value::Object(map)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every field normalizer accepts any value and never returns a sentinel.
    #[test]
    fn prop_field_normalizers_are_total(v in json_value()) {
        let raw = RawValue::from(Some(&v));
        let _ = normalize::text(raw);
        let _ = normalize::integer(raw);
        let _ = normalize::timestamp(raw);
        let _ = normalize::flag(raw);
        let _ = normalize::trade_status(raw);
        let _ = normalize::date(raw);
        let _ = normalize::isin(raw);
        if let Some(f) = normalize::float(raw) {
            prop_assert!(f.is_finite());
        }
        prop_assert_ne!(normalize::strike_price(raw), Some(STRIKE_NOT_APPLICABLE));
        let option_type = normalize::option_type(raw);
        prop_assert_ne!(option_type.as_deref(), Some(OPTION_TYPE_NOT_APPLICABLE));
        if let Some(s) = normalize::text(raw) {
            prop_assert!(!s.is_empty());
            prop_assert_eq!(s.trim(), s.as_str());
        }
    }

    /// Whole records either normalize or report a missing field; they never panic.
    #[test]
    fn prop_normalize_record_is_total(v in broker_record()) {
        let raw = RawRecord::from_json("key", v);
        match normalize_record(&raw) {
            Ok(record) => {
                prop_assert!(!record.ticker.is_empty());
                prop_assert!(!record.broker_token.is_empty());
                prop_assert!(!record.currency_code.is_empty());
                prop_assert_ne!(record.strike_price, Some(STRIKE_NOT_APPLICABLE));
            }
            Err(e) => prop_assert!(e.to_string().contains("required field")),
        }
    }

    /// Pages of size `limit` cover exactly `total` rows.
    #[test]
    fn prop_total_pages_partitions(total in 0i64..1_000_000, limit in 1i64..=MAX_LIMIT) {
        let pages = total_pages(total, limit);
        if total == 0 {
            prop_assert_eq!(pages, 0);
        } else {
            prop_assert!(pages * limit >= total);
            prop_assert!((pages - 1) * limit < total);
        }
    }

    /// Page and limit parsing accepts exactly the positive integers.
    #[test]
    fn prop_paging_validation(page in "[ -~]{0,8}") {
        let mut params = HashMap::new();
        params.insert("page".to_string(), page.clone());
        let result = CatalogQuery::from_params(&params);
        let trimmed = page.trim();
        match trimmed.parse::<i64>() {
            _ if trimmed.is_empty() => prop_assert_eq!(result.map(|q| q.page), Ok(1)),
            Ok(n) if n >= 1 => prop_assert_eq!(result.map(|q| q.page), Ok(n)),
            _ => prop_assert!(result.is_err()),
        }
    }

    /// The escaped pattern contains the term with each wildcard escaped.
    #[test]
    fn prop_like_pattern_escapes(term in "[a-z%_\\\\]{0,10}") {
        let pattern = like_pattern(&term);
        let inner = &pattern[1..pattern.len() - 1];
        let mut unescaped = String::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                let next = chars.next();
                prop_assert!(matches!(next, Some('%' | '_' | '\\')));
                unescaped.extend(next);
            } else {
                prop_assert!(c != '%' && c != '_');
                unescaped.push(c);
            }
        }
        prop_assert_eq!(unescaped, term);
    }

    /// Same seed ⇒ same ticks; prices stay in [100, 200) with two decimals.
    #[test]
    fn prop_seeded_feed_is_reproducible(seed in any::<u64>()) {
        let config = FeedConfig { seed: Some(seed), ..Default::default() };
        let mut a = TickGenerator::new(config.clone());
        let mut b = TickGenerator::new(config);
        for _ in 0..10 {
            let (x, y) = (a.next_tick(), b.next_tick());
            prop_assert_eq!(&x.symbol, &y.symbol);
            prop_assert_eq!(x.price, y.price);
            prop_assert!(x.price >= Decimal::new(100, 0) && x.price < Decimal::new(200, 0));
            prop_assert!(x.price.scale() <= 2);
        }
    }
}
