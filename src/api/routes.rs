//! Thin axum handlers wrapping `query::*` (§4.9). Each handler parses
//! its `Query` extractor, calls the matching `query::` function, and
//! wraps the result in the `{success, data|error}` envelope from §6.
//! Parameter errors map to 400, storage errors to 500 (§7).

use axum::{
    extract::{Query, State as AxumState},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{VenueId, Window};
use crate::error::QueryError;
use crate::query::{
    arbitrage::{self, ArbitrageFilter, ArbitrageSort},
    funding, ma, markets, normalized_data,
};
use crate::storage::{PrimaryStore, UnifiedStore};

#[derive(Clone)]
pub struct AppState {
    pub primary: Arc<PrimaryStore>,
    pub unified: Arc<UnifiedStore>,
}

/// `{success, data}` envelope (§6). Errors never reach this type —
/// they're communicated via the response status code (§7), matching
/// the teacher's `Result<Json<T>, StatusCode>` handler signatures.
#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

fn map_err(err: QueryError) -> StatusCode {
    match err {
        QueryError::BadParameter(_) => StatusCode::BAD_REQUEST,
        QueryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/markets", get(get_markets))
        .route("/api/markets/compare", get(get_markets_compare))
        .route("/api/funding", get(get_funding_rates))
        .route("/api/funding/apr", get(get_funding_apr))
        .route("/api/funding/summary", get(get_funding_summary))
        .route("/api/funding/ma", get(get_funding_ma))
        .route("/api/funding/ma/latest", get(get_funding_ma_latest))
        .route("/api/funding/ma/bulk", get(get_funding_ma_bulk))
        .route("/api/arbitrage", get(get_arbitrage))
        .route("/api/normalized-data", get(get_normalized_data))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct MarketsQuery {
    limit: Option<usize>,
}

async fn get_markets(
    Query(params): Query<MarketsQuery>,
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, StatusCode> {
    let rows = markets::list_normalized_markets(&state.primary, params.limit.unwrap_or(500))
        .await
        .map_err(map_err)?;
    Ok(ok(serde_json::to_value(rows).unwrap_or_default()))
}

#[derive(Debug, Deserialize)]
struct SymbolQuery {
    symbol: String,
}

async fn get_markets_compare(
    Query(params): Query<SymbolQuery>,
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, StatusCode> {
    let row = markets::compare_symbol_across_venues(&state.primary, &params.symbol)
        .await
        .map_err(map_err)?;
    Ok(ok(serde_json::to_value(row).unwrap_or_default()))
}

#[derive(Debug, Deserialize)]
struct FundingQuery {
    symbol: String,
    venues: Option<String>,
    from: Option<i64>,
    to: Option<i64>,
    limit: Option<usize>,
}

fn parse_venues(raw: &Option<String>) -> Option<Vec<VenueId>> {
    raw.as_ref().map(|s| {
        s.split(',')
            .filter_map(|v| v.trim().parse::<VenueId>().ok())
            .collect()
    })
}

async fn get_funding_rates(
    Query(params): Query<FundingQuery>,
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, StatusCode> {
    let venues = parse_venues(&params.venues);
    let rows = funding::funding_rates(
        &state.unified,
        &params.symbol,
        venues.as_deref(),
        params.from,
        params.to,
        params.limit.unwrap_or(500),
    )
    .await
    .map_err(map_err)?;
    Ok(ok(serde_json::to_value(rows).unwrap_or_default()))
}

async fn get_funding_apr(
    Query(params): Query<FundingQuery>,
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, StatusCode> {
    let venues = parse_venues(&params.venues);
    let rows = funding::funding_apr(
        &state.unified,
        &params.symbol,
        venues.as_deref(),
        params.from,
        params.to,
        params.limit.unwrap_or(500),
    )
    .await
    .map_err(map_err)?;
    Ok(ok(serde_json::to_value(rows).unwrap_or_default()))
}

#[derive(Debug, Deserialize)]
struct FundingSummaryQuery {
    symbol: String,
    window: Option<String>,
    now: i64,
}

async fn get_funding_summary(
    Query(params): Query<FundingSummaryQuery>,
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, StatusCode> {
    let window = parse_window(&params.window)?;
    let rows = funding::funding_summary(&state.unified, &params.symbol, window, params.now)
        .await
        .map_err(map_err)?;
    Ok(ok(serde_json::to_value(rows).unwrap_or_default()))
}

fn parse_window(raw: &Option<String>) -> Result<Window, StatusCode> {
    match raw {
        Some(s) => s.parse::<Window>().map_err(|_| StatusCode::BAD_REQUEST),
        None => Ok(Window::H24),
    }
}

#[derive(Debug, Deserialize)]
struct FundingMaQuery {
    symbol: String,
    window: Option<String>,
    venue: Option<String>,
    cross: Option<bool>,
}

async fn get_funding_ma(
    Query(params): Query<FundingMaQuery>,
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, StatusCode> {
    let window = parse_window(&params.window)?;
    let target = if params.cross.unwrap_or(false) {
        ma::MaTarget::Cross
    } else {
        let venue = params
            .venue
            .as_deref()
            .ok_or(StatusCode::BAD_REQUEST)?
            .parse::<VenueId>()
            .map_err(|_| StatusCode::BAD_REQUEST)?;
        ma::MaTarget::Venue(venue)
    };
    let row = ma::funding_ma(&state.unified, &params.symbol, window, target)
        .await
        .map_err(map_err)?;
    let value = match row {
        Some(ma::FundingMa::PerVenue(r)) => serde_json::to_value(r).unwrap_or_default(),
        Some(ma::FundingMa::Cross(r)) => serde_json::to_value(r).unwrap_or_default(),
        None => serde_json::Value::Null,
    };
    Ok(ok(value))
}

#[derive(Debug, Deserialize)]
struct FundingMaLatestQuery {
    symbol: String,
    venue: Option<String>,
}

async fn get_funding_ma_latest(
    Query(params): Query<FundingMaLatestQuery>,
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, StatusCode> {
    let venue = match params.venue {
        Some(v) => Some(v.parse::<VenueId>().map_err(|_| StatusCode::BAD_REQUEST)?),
        None => None,
    };
    let rows = ma::funding_ma_latest(&state.unified, &params.symbol, venue)
        .await
        .map_err(map_err)?;
    Ok(ok(serde_json::to_value(rows).unwrap_or_default()))
}

#[derive(Debug, Deserialize)]
struct FundingMaBulkQuery {
    symbols: String,
    window: Option<String>,
    limit: Option<usize>,
}

async fn get_funding_ma_bulk(
    Query(params): Query<FundingMaBulkQuery>,
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, StatusCode> {
    let window = parse_window(&params.window)?;
    let symbols: Vec<String> = params.symbols.split(',').map(|s| s.trim().to_string()).collect();
    let rows = ma::funding_ma_bulk(&state.unified, &symbols, window, params.limit.unwrap_or(100))
        .await
        .map_err(map_err)?;
    Ok(ok(serde_json::to_value(rows).unwrap_or_default()))
}

#[derive(Debug, Deserialize)]
struct ArbitrageQuery {
    symbol: Option<String>,
    window: Option<String>,
    min_spread_apr: Option<f64>,
    stable_only: Option<bool>,
    sort_by: Option<String>,
    limit: Option<usize>,
}

async fn get_arbitrage(
    Query(params): Query<ArbitrageQuery>,
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, StatusCode> {
    let window = match &params.window {
        Some(s) => Some(s.parse::<Window>().map_err(|_| StatusCode::BAD_REQUEST)?),
        None => None,
    };
    let sort_by = match params.sort_by.as_deref() {
        Some("spread") => ArbitrageSort::Spread,
        Some("stability_score") => ArbitrageSort::StabilityScore,
        _ => ArbitrageSort::SpreadApr,
    };
    let rows = arbitrage::arbitrage(
        &state.unified,
        ArbitrageFilter {
            symbol: params.symbol,
            window,
            min_spread_apr: params.min_spread_apr,
            stable_only: params.stable_only.unwrap_or(false),
            sort_by,
            limit: params.limit.unwrap_or(100),
        },
    )
    .await
    .map_err(map_err)?;
    Ok(ok(serde_json::to_value(rows).unwrap_or_default()))
}

#[derive(Debug, Deserialize)]
struct NormalizedDataQuery {
    symbol: String,
    from: i64,
    to: i64,
    interval: Option<String>,
    now: i64,
}

async fn get_normalized_data(
    Query(params): Query<NormalizedDataQuery>,
    AxumState(state): AxumState<AppState>,
) -> Result<Json<Envelope<serde_json::Value>>, StatusCode> {
    let interval = parse_interval(params.interval.as_deref())?;
    let rows = normalized_data::normalized_data(
        &state.primary,
        &params.symbol,
        params.from,
        params.to,
        interval,
        params.now,
    )
    .await
    .map_err(map_err)?;
    Ok(ok(serde_json::to_value(rows).unwrap_or_default()))
}

fn parse_interval(raw: Option<&str>) -> Result<normalized_data::Interval, StatusCode> {
    use normalized_data::Interval;
    match raw.unwrap_or("auto") {
        "raw" => Ok(Interval::Raw),
        "15m" => Ok(Interval::Min15),
        "1h" => Ok(Interval::Hour1),
        "4h" => Ok(Interval::Hour4),
        "1d" => Ok(Interval::Day1),
        "7d" => Ok(Interval::Day7),
        "30d" => Ok(Interval::Day30),
        "auto" => Ok(Interval::Auto),
        _ => Err(StatusCode::BAD_REQUEST),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState {
            primary: Arc::new(PrimaryStore::open_in_memory().unwrap()),
            unified: Arc::new(UnifiedStore::open_in_memory().unwrap()),
        }
    }

    #[tokio::test]
    async fn markets_query_defaults_to_empty_result() {
        let st = state();
        let result = get_markets(
            Query(MarketsQuery { limit: None }),
            AxumState(st),
        )
        .await;
        assert!(result.is_ok());
    }

    #[test]
    fn unknown_interval_is_bad_request() {
        assert_eq!(parse_interval(Some("bogus")), Err(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn auto_interval_is_default() {
        assert!(matches!(parse_interval(None), Ok(normalized_data::Interval::Auto)));
    }

    #[test]
    fn parse_venues_splits_on_comma_and_skips_unknown() {
        let venues = parse_venues(&Some("hyperliquid,bogus,aster".to_string())).unwrap();
        assert_eq!(venues, vec![VenueId::Hyperliquid, VenueId::Aster]);
    }
}
