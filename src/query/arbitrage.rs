//! `arbitrage` query (§4.9): filter/sort parameters over `arbitrage_v3`.

use crate::domain::{ArbitrageRow, Window};
use crate::error::QueryError;
use crate::query::MAX_MA_LIMIT;
use crate::storage::UnifiedStore;

#[derive(Debug, Clone, Default)]
pub struct ArbitrageFilter {
    pub symbol: Option<String>,
    pub window: Option<Window>,
    pub min_spread_apr: Option<f64>,
    pub stable_only: bool,
    pub sort_by: ArbitrageSort,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArbitrageSort {
    #[default]
    SpreadApr,
    Spread,
    StabilityScore,
}

pub async fn arbitrage(
    store: &UnifiedStore,
    filter: ArbitrageFilter,
) -> Result<Vec<ArbitrageRow>, QueryError> {
    let limit = filter.limit.clamp(1, MAX_MA_LIMIT);
    let mut rows = store.arbitrage_rows(
        filter.symbol.as_deref(),
        filter.window,
        filter.min_spread_apr,
        filter.stable_only,
        limit,
    )?;
    match filter.sort_by {
        ArbitrageSort::SpreadApr => {
            rows.sort_by(|a, b| b.spread_apr.partial_cmp(&a.spread_apr).unwrap())
        }
        ArbitrageSort::Spread => rows.sort_by(|a, b| b.spread.partial_cmp(&a.spread).unwrap()),
        ArbitrageSort::StabilityScore => rows.sort_by(|a, b| b.stability_score.cmp(&a.stability_score)),
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VenueId;

    fn row(symbol: &str, spread_apr: f64, stability_score: i64) -> ArbitrageRow {
        ArbitrageRow {
            normalized_symbol: symbol.into(),
            long_venue: VenueId::Hyperliquid,
            short_venue: VenueId::Aster,
            window: Window::H24,
            long_rate: 0.01,
            short_rate: 0.02,
            spread: 0.01,
            long_apr: 10.0,
            short_apr: 10.0 + spread_apr,
            spread_apr,
            stability_score,
            is_stable: stability_score >= 4,
            calculated_at: 1,
        }
    }

    #[tokio::test]
    async fn sorts_by_stability_score_descending() {
        let store = UnifiedStore::open_in_memory().unwrap();
        store
            .insert_arbitrage_rows(&[row("BTC", 5.0, 2), row("ETH", 1.0, 6)])
            .unwrap();
        let rows = arbitrage(
            &store,
            ArbitrageFilter {
                sort_by: ArbitrageSort::StabilityScore,
                limit: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(rows[0].normalized_symbol, "ETH");
    }
}
