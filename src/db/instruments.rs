//! Instrument reads and writes.
//!
//! Writes go through [`upsert`], keyed on the ticker. Reads go through
//! [`fetch_page`], which applies the search, filters, sort and paging of a
//! [`CatalogQuery`] and joins the three lookup tables. The instrument-type join
//! must match on both type code and segment: type codes repeat across segments.

use log::debug;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::catalog::{like_pattern, total_pages, CatalogQuery};
use crate::types::{
    CatalogEntry, ExchangeDetails, Instrument, InstrumentPage, InstrumentRecord, InstrumentTypeDetails,
    SegmentDetails,
};

const UPSERT_SQL: &str = "INSERT INTO instruments (
        ticker, broker_token, exchange_token, exchange_symbol, symbol_name,
        exchange_id, exchange_name, segment_id, instrument_type, trade_status,
        currency_code, last_update, underlying_symbol, underlying_token, series,
        option_type, expiry, strike_price, min_lot_size, tick_size,
        upper_price, lower_price, face_value, qty_multiplier, qty_freeze,
        previous_close, previous_oi, is_mtf_tradable, mtf_margin, isin,
        trading_session, surveillance_flag, stream, cautionary_msg, product_code,
        full_description, short_name, display_name_mobile
    ) VALUES (
        ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
        ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
        ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
        ?, ?, ?, ?, ?, ?, ?, ?
    )
    ON CONFLICT (ticker) DO UPDATE SET
        broker_token = excluded.broker_token,
        exchange_token = excluded.exchange_token,
        exchange_symbol = excluded.exchange_symbol,
        symbol_name = excluded.symbol_name,
        exchange_id = excluded.exchange_id,
        exchange_name = excluded.exchange_name,
        segment_id = excluded.segment_id,
        instrument_type = excluded.instrument_type,
        trade_status = excluded.trade_status,
        currency_code = excluded.currency_code,
        last_update = excluded.last_update,
        underlying_symbol = excluded.underlying_symbol,
        underlying_token = excluded.underlying_token,
        series = excluded.series,
        option_type = excluded.option_type,
        expiry = excluded.expiry,
        strike_price = excluded.strike_price,
        min_lot_size = excluded.min_lot_size,
        tick_size = excluded.tick_size,
        upper_price = excluded.upper_price,
        lower_price = excluded.lower_price,
        face_value = excluded.face_value,
        qty_multiplier = excluded.qty_multiplier,
        qty_freeze = excluded.qty_freeze,
        previous_close = excluded.previous_close,
        previous_oi = excluded.previous_oi,
        is_mtf_tradable = excluded.is_mtf_tradable,
        mtf_margin = excluded.mtf_margin,
        isin = excluded.isin,
        trading_session = excluded.trading_session,
        surveillance_flag = excluded.surveillance_flag,
        stream = excluded.stream,
        cautionary_msg = excluded.cautionary_msg,
        product_code = excluded.product_code,
        full_description = excluded.full_description,
        short_name = excluded.short_name,
        display_name_mobile = excluded.display_name_mobile,
        updated_at = CURRENT_TIMESTAMP";

const SELECT_JOINED: &str = "SELECT i.*,
        e.name AS exchange_ref_name,
        e.full_name AS exchange_ref_full_name,
        s.name AS segment_ref_name,
        t.name AS instrument_type_ref_name
    FROM instruments i
    LEFT JOIN exchanges e ON e.code = i.exchange_id
    LEFT JOIN segments s ON s.code = i.segment_id
    LEFT JOIN instrument_types t ON t.type_code = i.instrument_type AND t.segment_code = i.segment_id";

/// Searched by the free-text `search` parameter.
const SEARCH_COLUMNS: [&str; 5] = [
    "i.ticker",
    "i.exchange_symbol",
    "i.symbol_name",
    "i.full_description",
    "i.exchange_name",
];

/// Inserts `record`, or updates the row with the same ticker. Constraint
/// violations (unknown exchange/segment pair, unknown instrument type, broker
/// token owned by another ticker) surface as `Err`.
pub async fn upsert(conn: &mut SqliteConnection, record: &InstrumentRecord) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_SQL)
        .bind(&record.ticker)
        .bind(&record.broker_token)
        .bind(record.exchange_token)
        .bind(&record.exchange_symbol)
        .bind(&record.symbol_name)
        .bind(record.exchange_id)
        .bind(&record.exchange_name)
        .bind(record.segment_id)
        .bind(record.instrument_type)
        .bind(record.trade_status)
        .bind(&record.currency_code)
        .bind(record.last_update)
        .bind(&record.underlying_symbol)
        .bind(&record.underlying_token)
        .bind(&record.series)
        .bind(&record.option_type)
        .bind(record.expiry)
        .bind(record.strike_price)
        .bind(record.min_lot_size)
        .bind(record.tick_size)
        .bind(record.upper_price)
        .bind(record.lower_price)
        .bind(record.face_value)
        .bind(record.qty_multiplier)
        .bind(record.qty_freeze)
        .bind(record.previous_close)
        .bind(record.previous_oi)
        .bind(record.is_mtf_tradable)
        .bind(record.mtf_margin)
        .bind(&record.isin)
        .bind(&record.trading_session)
        .bind(&record.surveillance_flag)
        .bind(&record.stream)
        .bind(&record.cautionary_msg)
        .bind(&record.product_code)
        .bind(&record.full_description)
        .bind(&record.short_name)
        .bind(&record.display_name_mobile)
        .execute(conn)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct JoinedRow {
    #[sqlx(flatten)]
    instrument: Instrument,
    exchange_ref_name: Option<String>,
    exchange_ref_full_name: Option<String>,
    segment_ref_name: Option<String>,
    instrument_type_ref_name: Option<String>,
}

impl From<JoinedRow> for CatalogEntry {
    fn from(row: JoinedRow) -> Self {
        let record = &row.instrument.record;
        let exchange_details = row.exchange_ref_name.map(|name| ExchangeDetails {
            id: record.exchange_id,
            name,
            full_name: row.exchange_ref_full_name.unwrap_or_default(),
        });
        let segment_details = row.segment_ref_name.map(|name| SegmentDetails {
            id: record.segment_id,
            name,
        });
        let instrument_type_details = row.instrument_type_ref_name.map(|name| InstrumentTypeDetails {
            id: record.instrument_type,
            name,
        });
        CatalogEntry {
            instrument: row.instrument,
            exchange_details,
            segment_details,
            instrument_type_details,
        }
    }
}

/// Appends the WHERE clause shared by the page and count queries.
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &CatalogQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(term) = &query.search {
        let pattern = like_pattern(term);
        qb.push(" AND (");
        for (i, column) in SEARCH_COLUMNS.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("LOWER(")
                .push(*column)
                .push(") LIKE LOWER(")
                .push_bind(pattern.clone())
                .push(") ESCAPE '\\'");
        }
        qb.push(")");
    }
    if let Some(exchange) = query.exchange {
        qb.push(" AND i.exchange_id = ").push_bind(exchange);
    }
    if let Some(segment) = query.segment {
        qb.push(" AND i.segment_id = ").push_bind(segment);
    }
    if let Some(instrument_type) = query.instrument_type {
        qb.push(" AND i.instrument_type = ").push_bind(instrument_type);
    }
}

/// Number of instruments matching the query's search and filters.
pub async fn count_matching(pool: &SqlitePool, query: &CatalogQuery) -> Result<i64, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM instruments i");
    push_filters(&mut qb, query);
    qb.build_query_scalar::<i64>().fetch_one(pool).await
}

/// One page of joined catalog rows plus the total match count.
pub async fn fetch_page(pool: &SqlitePool, query: &CatalogQuery) -> Result<InstrumentPage, sqlx::Error> {
    let total_records = count_matching(pool, query).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_JOINED);
    push_filters(&mut qb, query);
    qb.push(" ORDER BY i.")
        .push(query.sort_field.column())
        .push(" ")
        .push(query.sort_order.as_sql())
        .push(", i.id ASC LIMIT ")
        .push_bind(query.limit)
        .push(" OFFSET ")
        .push_bind(query.offset());
    debug!("catalog query sql={}", qb.sql());

    let rows = qb.build_query_as::<JoinedRow>().fetch_all(pool).await?;
    Ok(InstrumentPage {
        entries: rows.into_iter().map(CatalogEntry::from).collect(),
        total_records,
        current_page: query.page,
        total_pages: total_pages(total_records, query.limit),
    })
}

/// Looks up one instrument by its ticker.
pub async fn find_by_ticker(pool: &SqlitePool, ticker: &str) -> Result<Option<Instrument>, sqlx::Error> {
    sqlx::query_as::<_, Instrument>("SELECT * FROM instruments WHERE ticker = ?")
        .bind(ticker)
        .fetch_optional(pool)
        .await
}

/// Total stored instruments.
pub async fn count_all(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM instruments")
        .fetch_one(pool)
        .await
}
