//! Full-table reads of the lookup tables. They hold tens of rows, so no paging.

use sqlx::SqlitePool;

use crate::types::{Exchange, ExchangeSegmentCombination, InstrumentType, Segment};

pub async fn list_exchanges(pool: &SqlitePool) -> Result<Vec<Exchange>, sqlx::Error> {
    sqlx::query_as::<_, Exchange>("SELECT code, name, full_name FROM exchanges")
        .fetch_all(pool)
        .await
}

pub async fn list_segments(pool: &SqlitePool) -> Result<Vec<Segment>, sqlx::Error> {
    sqlx::query_as::<_, Segment>("SELECT code, name FROM segments")
        .fetch_all(pool)
        .await
}

pub async fn list_instrument_types(pool: &SqlitePool) -> Result<Vec<InstrumentType>, sqlx::Error> {
    sqlx::query_as::<_, InstrumentType>("SELECT type_code, segment_code, name FROM instrument_types")
        .fetch_all(pool)
        .await
}

pub async fn list_exchange_segments(
    pool: &SqlitePool,
) -> Result<Vec<ExchangeSegmentCombination>, sqlx::Error> {
    sqlx::query_as::<_, ExchangeSegmentCombination>(
        "SELECT exchange_code, segment_code, exchange_name, segment_name FROM exchange_segment_combinations",
    )
    .fetch_all(pool)
    .await
}
