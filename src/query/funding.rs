//! `funding_rates`, `funding_apr`, `funding_summary` (§4.9): reads from
//! the unified cross-venue table.

use crate::domain::{UnifiedFundingRow, VenueId, Window};
use crate::error::QueryError;
use crate::query::MAX_RAW_LIMIT;
use crate::storage::UnifiedStore;
use serde::Serialize;
use std::collections::HashMap;

pub async fn funding_rates(
    store: &UnifiedStore,
    normalized_symbol: &str,
    venues: Option<&[VenueId]>,
    from_s: Option<i64>,
    to_s: Option<i64>,
    limit: usize,
) -> Result<Vec<UnifiedFundingRow>, QueryError> {
    if normalized_symbol.trim().is_empty() {
        return Err(QueryError::BadParameter(
            "normalized symbol must not be empty".into(),
        ));
    }
    let limit = limit.clamp(1, MAX_RAW_LIMIT);
    Ok(store.funding_rows(normalized_symbol, venues, from_s, to_s, limit)?)
}

/// Same shape as `funding_rates` — callers read `rate_apr` off each row.
/// The "APR projection" is a field-selection contract, not a distinct
/// storage query (§4.9: "same shape, APR projection").
pub async fn funding_apr(
    store: &UnifiedStore,
    normalized_symbol: &str,
    venues: Option<&[VenueId]>,
    from_s: Option<i64>,
    to_s: Option<i64>,
    limit: usize,
) -> Result<Vec<UnifiedFundingRow>, QueryError> {
    funding_rates(store, normalized_symbol, venues, from_s, to_s, limit).await
}

#[derive(Debug, Clone, Serialize)]
pub struct FundingSummaryRow {
    pub venue: VenueId,
    pub sample_count: usize,
    pub avg_rate_1h: f64,
    pub min_rate_1h: f64,
    pub max_rate_1h: f64,
    pub avg_apr: f64,
}

pub async fn funding_summary(
    store: &UnifiedStore,
    normalized_symbol: &str,
    window: Window,
    now_s: i64,
) -> Result<Vec<FundingSummaryRow>, QueryError> {
    if normalized_symbol.trim().is_empty() {
        return Err(QueryError::BadParameter(
            "normalized symbol must not be empty".into(),
        ));
    }
    let from_s = now_s - window.length_seconds();
    let rows = store.funding_rows(normalized_symbol, None, Some(from_s), Some(now_s), MAX_RAW_LIMIT)?;

    let mut by_venue: HashMap<VenueId, Vec<&UnifiedFundingRow>> = HashMap::new();
    for row in &rows {
        by_venue.entry(row.venue).or_default().push(row);
    }

    Ok(by_venue
        .into_iter()
        .map(|(venue, venue_rows)| {
            let n = venue_rows.len() as f64;
            let avg_rate_1h = venue_rows.iter().map(|r| r.rate_1h_percent).sum::<f64>() / n;
            let avg_apr = venue_rows.iter().map(|r| r.rate_apr).sum::<f64>() / n;
            let min_rate_1h = venue_rows
                .iter()
                .map(|r| r.rate_1h_percent)
                .fold(f64::INFINITY, f64::min);
            let max_rate_1h = venue_rows
                .iter()
                .map(|r| r.rate_1h_percent)
                .fold(f64::NEG_INFINITY, f64::max);
            FundingSummaryRow {
                venue,
                sample_count: venue_rows.len(),
                avg_rate_1h,
                min_rate_1h,
                max_rate_1h,
                avg_apr,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FundingSource;

    fn row(venue: VenueId, ft: i64, rate_1h: f64) -> UnifiedFundingRow {
        UnifiedFundingRow {
            normalized_symbol: "BTC".into(),
            venue,
            funding_time: ft,
            original_symbol: "BTC-PERP".into(),
            raw_rate: rate_1h / 100.0,
            raw_rate_percent: rate_1h,
            interval_hours: 8.0,
            rate_1h_percent: rate_1h,
            rate_apr: rate_1h * 24.0 * 365.0,
            source: FundingSource::Live,
            synced_at: ft,
            open_interest: Some(1_000_000.0),
        }
    }

    #[tokio::test]
    async fn rejects_empty_symbol() {
        let store = UnifiedStore::open_in_memory().unwrap();
        let err = funding_rates(&store, "", None, None, None, 10).await.unwrap_err();
        assert!(matches!(err, QueryError::BadParameter(_)));
    }

    #[tokio::test]
    async fn summary_averages_per_venue() {
        let store = UnifiedStore::open_in_memory().unwrap();
        let now = 1_700_000_000i64;
        store
            .upsert_funding_rows(&[
                row(VenueId::Hyperliquid, now - 100, 0.01),
                row(VenueId::Hyperliquid, now - 200, 0.03),
            ])
            .unwrap();
        let summary = funding_summary(&store, "BTC", Window::H24, now).await.unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].sample_count, 2);
        assert!((summary[0].avg_rate_1h - 0.02).abs() < 1e-9);
    }
}
