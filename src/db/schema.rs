//! Schema creation and lookup seeding.
//!
//! Five tables: `exchanges`, `segments`, `instrument_types` (keyed by type code
//! and segment), `exchange_segment_combinations` (the allow-list of valid
//! pairs) and `instruments`. An instrument references the allow-list through
//! `(exchange_id, segment_id)` and its type through `(instrument_type, segment_id)`.
//!
//! [`migrate`] is idempotent: tables are created if missing and seed rows are upserted.

use log::info;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const CREATE_TABLES: [&str; 9] = [
    "CREATE TABLE IF NOT EXISTS exchanges (
        code INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS segments (
        code INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS instrument_types (
        type_code INTEGER NOT NULL,
        segment_code INTEGER NOT NULL REFERENCES segments (code),
        name TEXT NOT NULL,
        PRIMARY KEY (type_code, segment_code)
    )",
    "CREATE TABLE IF NOT EXISTS exchange_segment_combinations (
        exchange_code INTEGER NOT NULL REFERENCES exchanges (code),
        segment_code INTEGER NOT NULL REFERENCES segments (code),
        exchange_name TEXT NOT NULL,
        segment_name TEXT NOT NULL,
        PRIMARY KEY (exchange_code, segment_code)
    )",
    "CREATE TABLE IF NOT EXISTS instruments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ticker TEXT NOT NULL UNIQUE,
        broker_token TEXT NOT NULL UNIQUE,
        exchange_token INTEGER NOT NULL,
        exchange_symbol TEXT NOT NULL,
        symbol_name TEXT NOT NULL,
        exchange_id INTEGER NOT NULL,
        exchange_name TEXT NOT NULL,
        segment_id INTEGER NOT NULL,
        instrument_type INTEGER NOT NULL,
        trade_status INTEGER NOT NULL,
        currency_code TEXT NOT NULL,
        last_update TEXT,
        underlying_symbol TEXT,
        underlying_token TEXT,
        series TEXT,
        option_type TEXT,
        expiry INTEGER,
        strike_price REAL,
        min_lot_size INTEGER,
        tick_size REAL,
        upper_price REAL,
        lower_price REAL,
        face_value REAL,
        qty_multiplier REAL,
        qty_freeze INTEGER,
        previous_close REAL,
        previous_oi REAL,
        is_mtf_tradable INTEGER,
        mtf_margin REAL,
        isin TEXT,
        trading_session TEXT,
        surveillance_flag TEXT,
        stream TEXT,
        cautionary_msg TEXT,
        product_code TEXT,
        full_description TEXT,
        short_name TEXT,
        display_name_mobile TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (exchange_id, segment_id)
            REFERENCES exchange_segment_combinations (exchange_code, segment_code),
        FOREIGN KEY (instrument_type, segment_id)
            REFERENCES instrument_types (type_code, segment_code)
    )",
    "CREATE INDEX IF NOT EXISTS idx_instruments_exchange ON instruments (exchange_id)",
    "CREATE INDEX IF NOT EXISTS idx_instruments_segment ON instruments (segment_id)",
    "CREATE INDEX IF NOT EXISTS idx_instruments_type ON instruments (instrument_type, segment_id)",
    "CREATE INDEX IF NOT EXISTS idx_instruments_exchange_segment ON instruments (exchange_id, segment_id)",
];

/// (code, short name, full name)
pub const EXCHANGES: [(i32, &str, &str); 3] = [
    (10, "NSE", "National Stock Exchange"),
    (11, "MCX", "Multi Commodity Exchange"),
    (12, "BSE", "Bombay Stock Exchange"),
];

/// (code, name)
pub const SEGMENTS: [(i32, &str); 4] = [
    (10, "Capital Market"),
    (11, "Equity Derivatives"),
    (12, "Currency Derivatives"),
    (20, "Commodity Derivatives"),
];

/// Valid (exchange code, segment code) pairs.
pub const EXCHANGE_SEGMENTS: [(i32, i32); 8] = [
    (10, 10),
    (10, 11),
    (10, 12),
    (10, 20),
    (12, 10),
    (12, 11),
    (12, 12),
    (11, 20),
];

/// (type code, segment code, name). Code 11 appears under two segments.
pub const INSTRUMENT_TYPES: [(i32, i32, &str); 36] = [
    (0, 10, "EQ (EQUITY)"),
    (1, 10, "PREFSHARES"),
    (2, 10, "DEBENTURES"),
    (3, 10, "WARRANTS"),
    (4, 10, "MISC (NSE, BSE)"),
    (5, 10, "SGB"),
    (6, 10, "G - Secs"),
    (7, 10, "T - Bills"),
    (8, 10, "MF"),
    (9, 10, "ETF"),
    (10, 10, "INDEX"),
    (50, 10, "MISC (BSE)"),
    (11, 11, "FUTIDX"),
    (12, 11, "FUTIVX"),
    (13, 11, "FUTSTK"),
    (14, 11, "OPTIDX"),
    (15, 11, "OPTSTK"),
    (16, 12, "FUTCUR"),
    (17, 12, "FUTIRT"),
    (18, 12, "FUTIRC"),
    (19, 12, "OPTCUR"),
    (20, 12, "UNDCUR"),
    (21, 12, "UNDIRC"),
    (22, 12, "UNDIRT"),
    (23, 12, "UNDIRD"),
    (24, 12, "INDEX_CD"),
    (25, 12, "FUTIRD"),
    (11, 20, "FUTIDX"),
    (30, 20, "FUTCOM"),
    (31, 20, "OPTFUT"),
    (32, 20, "OPTCOM"),
    (33, 20, "FUTBAS"),
    (34, 20, "FUTBLN"),
    (35, 20, "FUTENR"),
    (36, 20, "OPTBLN"),
    (37, 20, "OPTFUT (NCOM)"),
];

fn exchange_name(code: i32) -> &'static str {
    EXCHANGES
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, name, _)| *name)
        .unwrap_or_default()
}

fn segment_name(code: i32) -> &'static str {
    SEGMENTS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or_default()
}

/// Creates missing tables and upserts the lookup seed rows, in one transaction.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for ddl in CREATE_TABLES {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO exchanges (code, name, full_name) ");
    qb.push_values(EXCHANGES, |mut b, (code, name, full_name)| {
        b.push_bind(code).push_bind(name).push_bind(full_name);
    });
    qb.push(" ON CONFLICT (code) DO UPDATE SET name = excluded.name, full_name = excluded.full_name");
    qb.build().execute(&mut *tx).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO segments (code, name) ");
    qb.push_values(SEGMENTS, |mut b, (code, name)| {
        b.push_bind(code).push_bind(name);
    });
    qb.push(" ON CONFLICT (code) DO UPDATE SET name = excluded.name");
    qb.build().execute(&mut *tx).await?;

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO instrument_types (type_code, segment_code, name) ");
    qb.push_values(INSTRUMENT_TYPES, |mut b, (type_code, segment_code, name)| {
        b.push_bind(type_code).push_bind(segment_code).push_bind(name);
    });
    qb.push(" ON CONFLICT (type_code, segment_code) DO UPDATE SET name = excluded.name");
    qb.build().execute(&mut *tx).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO exchange_segment_combinations (exchange_code, segment_code, exchange_name, segment_name) ",
    );
    qb.push_values(EXCHANGE_SEGMENTS, |mut b, (exchange, segment)| {
        b.push_bind(exchange)
            .push_bind(segment)
            .push_bind(exchange_name(exchange))
            .push_bind(segment_name(segment));
    });
    qb.push(
        " ON CONFLICT (exchange_code, segment_code) DO UPDATE SET \
         exchange_name = excluded.exchange_name, segment_name = excluded.segment_name",
    );
    qb.build().execute(&mut *tx).await?;

    tx.commit().await?;
    info!(
        "schema ready exchanges={} segments={} instrument_types={} combinations={}",
        EXCHANGES.len(),
        SEGMENTS.len(),
        INSTRUMENT_TYPES.len(),
        EXCHANGE_SEGMENTS.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn seed_keys_are_unique() {
        let types: HashSet<(i32, i32)> = INSTRUMENT_TYPES.iter().map(|(t, s, _)| (*t, *s)).collect();
        assert_eq!(types.len(), INSTRUMENT_TYPES.len());
        let pairs: HashSet<(i32, i32)> = EXCHANGE_SEGMENTS.iter().copied().collect();
        assert_eq!(pairs.len(), EXCHANGE_SEGMENTS.len());
    }

    #[test]
    fn seed_references_exist() {
        for (exchange, segment) in EXCHANGE_SEGMENTS {
            assert!(!exchange_name(exchange).is_empty(), "exchange {exchange}");
            assert!(!segment_name(segment).is_empty(), "segment {segment}");
        }
        for (_, segment, _) in INSTRUMENT_TYPES {
            assert!(!segment_name(segment).is_empty(), "segment {segment}");
        }
    }

    #[test]
    fn type_code_eleven_is_shared_across_segments() {
        let elevens: Vec<i32> = INSTRUMENT_TYPES
            .iter()
            .filter(|(code, _, _)| *code == 11)
            .map(|(_, segment, _)| *segment)
            .collect();
        assert_eq!(elevens, vec![11, 20]);
    }
}
