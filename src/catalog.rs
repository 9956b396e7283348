//! Catalog query parameters: parsing, validation, sort allow-list, page math.
//!
//! [`CatalogQuery::from_params`] runs before any data access; a query that
//! reaches the store is already valid. SQL is built from it in
//! [`crate::db::instruments`].

use std::collections::HashMap;

use log::warn;

use crate::types::{ExchangeCode, InstrumentTypeCode, SegmentCode};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 1000;

/// Rejected query parameter. The message is safe to return to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid page number. Must be a positive integer.")]
    InvalidPage,
    #[error("Invalid limit. Must be a positive integer.")]
    InvalidLimit,
    #[error("Invalid {0}. Must be an integer code.")]
    InvalidCode(&'static str),
}

/// Sortable columns. Anything else falls back to [`SortField::Ticker`] ascending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    Ticker,
    ExchangeName,
    CreatedAt,
    UpdatedAt,
    StrikePrice,
    Expiry,
    PreviousClose,
    MinLotSize,
    TickSize,
    UpperPrice,
    LowerPrice,
    FaceValue,
}

impl SortField {
    /// Parses the API name (the camelCase response key).
    pub fn from_param(s: &str) -> Option<Self> {
        Some(match s {
            "symTicker" => SortField::Ticker,
            "exchangeName" => SortField::ExchangeName,
            "createdAt" => SortField::CreatedAt,
            "updatedAt" => SortField::UpdatedAt,
            "strikePrice" => SortField::StrikePrice,
            "expiryDate" => SortField::Expiry,
            "previousClose" => SortField::PreviousClose,
            "minLotSize" => SortField::MinLotSize,
            "tickSize" => SortField::TickSize,
            "upperPrice" => SortField::UpperPrice,
            "lowerPrice" => SortField::LowerPrice,
            "faceValue" => SortField::FaceValue,
            _ => return None,
        })
    }

    /// Column in the `instruments` table.
    pub fn column(self) -> &'static str {
        match self {
            SortField::Ticker => "ticker",
            SortField::ExchangeName => "exchange_name",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::StrikePrice => "strike_price",
            SortField::Expiry => "expiry",
            SortField::PreviousClose => "previous_close",
            SortField::MinLotSize => "min_lot_size",
            SortField::TickSize => "tick_size",
            SortField::UpperPrice => "upper_price",
            SortField::LowerPrice => "lower_price",
            SortField::FaceValue => "face_value",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// `DESC` in any case is descending; anything else ascending.
    pub fn from_param(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Validated catalog request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub exchange: Option<ExchangeCode>,
    pub segment: Option<SegmentCode>,
    pub instrument_type: Option<InstrumentTypeCode>,
    pub page: i64,
    pub limit: i64,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            search: None,
            exchange: None,
            segment: None,
            instrument_type: None,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            sort_field: SortField::Ticker,
            sort_order: SortOrder::Asc,
        }
    }
}

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn positive(raw: Option<&str>, default: i64, err: QueryError) -> Result<i64, QueryError> {
    match raw {
        None => Ok(default),
        Some(s) => match s.parse::<i64>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(err),
        },
    }
}

fn code(raw: Option<&str>, name: &'static str) -> Result<Option<i32>, QueryError> {
    raw.map(|s| s.parse::<i32>().map_err(|_| QueryError::InvalidCode(name)))
        .transpose()
}

impl CatalogQuery {
    /// Builds a query from raw HTTP query parameters. Empty values count as absent.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, QueryError> {
        let page = positive(param(params, "page"), DEFAULT_PAGE, QueryError::InvalidPage)?;
        let limit = positive(param(params, "limit"), DEFAULT_LIMIT, QueryError::InvalidLimit)?
            .min(MAX_LIMIT);

        let requested_order = param(params, "sortOrder").map_or(SortOrder::Asc, SortOrder::from_param);
        let (sort_field, sort_order) = match param(params, "sortBy") {
            None => (SortField::Ticker, requested_order),
            Some(name) => match SortField::from_param(name) {
                Some(field) => (field, requested_order),
                None => {
                    warn!("invalid sortBy field {:?}, defaulting to symTicker ASC", name);
                    (SortField::Ticker, SortOrder::Asc)
                }
            },
        };

        Ok(Self {
            search: param(params, "search").map(str::to_string),
            exchange: code(param(params, "exchange_code"), "exchange_code")?.map(ExchangeCode),
            segment: code(param(params, "segment_code"), "segment_code")?.map(SegmentCode),
            instrument_type: code(param(params, "instrument_type_code"), "instrument_type_code")?
                .map(InstrumentTypeCode),
            page,
            limit,
            sort_field,
            sort_order,
        })
    }

    /// Rows to skip for the requested page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// `ceil(total / limit)`; zero when there are no rows.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// Escapes `%`, `_` and `\` and wraps the term for a substring `LIKE ... ESCAPE '\'`.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
