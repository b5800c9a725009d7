//! `funding_ma`, `funding_ma_latest`, `funding_ma_bulk` (§4.9).

use crate::domain::{CrossVenueMaRow, MovingAverageRow, VenueId, Window};
use crate::error::QueryError;
use crate::query::MAX_MA_LIMIT;
use crate::storage::UnifiedStore;

/// `Cross` selects the cross-venue aggregate row instead of a per-venue
/// row — the `venue? | cross` union in §4.9.
pub enum MaTarget {
    Venue(VenueId),
    Cross,
}

pub enum FundingMa {
    PerVenue(MovingAverageRow),
    Cross(CrossVenueMaRow),
}

pub async fn funding_ma(
    store: &UnifiedStore,
    normalized_symbol: &str,
    window: Window,
    target: MaTarget,
) -> Result<Option<FundingMa>, QueryError> {
    if normalized_symbol.trim().is_empty() {
        return Err(QueryError::BadParameter(
            "normalized symbol must not be empty".into(),
        ));
    }
    match target {
        MaTarget::Venue(venue) => Ok(store
            .ma_row(normalized_symbol, venue, window)?
            .map(FundingMa::PerVenue)),
        MaTarget::Cross => Ok(store
            .cross_venue_ma(normalized_symbol, window)?
            .map(FundingMa::Cross)),
    }
}

/// Latest per-venue MA row for `normalized_symbol`, optionally
/// restricted to one venue. Uses the `24h` window as "latest" since
/// every per-venue row is overwritten in place by `INSERT OR REPLACE`
/// rather than versioned — the shortest window is always the freshest.
pub async fn funding_ma_latest(
    store: &UnifiedStore,
    normalized_symbol: &str,
    venue: Option<VenueId>,
) -> Result<Vec<MovingAverageRow>, QueryError> {
    if normalized_symbol.trim().is_empty() {
        return Err(QueryError::BadParameter(
            "normalized symbol must not be empty".into(),
        ));
    }
    let rows = store.ma_rows_for_symbol(normalized_symbol, Window::H24)?;
    Ok(match venue {
        Some(v) => rows.into_iter().filter(|r| r.venue == v).collect(),
        None => rows,
    })
}

pub async fn funding_ma_bulk(
    store: &UnifiedStore,
    normalized_symbols: &[String],
    window: Window,
    limit: usize,
) -> Result<Vec<MovingAverageRow>, QueryError> {
    if normalized_symbols.is_empty() {
        return Err(QueryError::BadParameter(
            "at least one symbol is required".into(),
        ));
    }
    let limit = limit.clamp(1, MAX_MA_LIMIT);
    let mut out = Vec::new();
    for symbol in normalized_symbols {
        out.extend(store.ma_rows_for_symbol(symbol, window)?);
        if out.len() >= limit {
            break;
        }
    }
    out.truncate(limit);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bulk_requires_at_least_one_symbol() {
        let store = UnifiedStore::open_in_memory().unwrap();
        let err = funding_ma_bulk(&store, &[], Window::H24, 10).await.unwrap_err();
        assert!(matches!(err, QueryError::BadParameter(_)));
    }

    #[tokio::test]
    async fn bulk_respects_limit_across_symbols() {
        let store = UnifiedStore::open_in_memory().unwrap();
        store
            .upsert_ma_rows(&[
                ma_row("BTC", VenueId::Hyperliquid),
                ma_row("BTC", VenueId::Aster),
                ma_row("ETH", VenueId::Hyperliquid),
            ])
            .unwrap();
        let out = funding_ma_bulk(
            &store,
            &["BTC".to_string(), "ETH".to_string()],
            Window::H24,
            1,
        )
        .await
        .unwrap();
        assert_eq!(out.len(), 1);
    }

    fn ma_row(symbol: &str, venue: VenueId) -> MovingAverageRow {
        MovingAverageRow {
            normalized_symbol: symbol.to_string(),
            venue,
            window: Window::H24,
            ma_rate_1h: 0.01,
            ma_apr: 87.6,
            sample_count: 5,
            stddev: 0.001,
            min_rate_1h: 0.009,
            max_rate_1h: 0.011,
            calculated_at: 1,
            window_start: 0,
            window_end: 1,
        }
    }
}
