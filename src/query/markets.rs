//! `list_normalized_markets` and `compare_symbol_across_venues` (§4.9).

use crate::domain::NormalizedToken;
use crate::error::QueryError;
use crate::query::MAX_RAW_LIMIT;
use crate::storage::PrimaryStore;
use serde::Serialize;

pub async fn list_normalized_markets(
    store: &PrimaryStore,
    limit: usize,
) -> Result<Vec<NormalizedToken>, QueryError> {
    let limit = limit.clamp(1, MAX_RAW_LIMIT);
    Ok(store.list_normalized_tokens(limit)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolComparison {
    pub normalized_symbol: String,
    pub venues: Vec<NormalizedToken>,
    pub venue_count: usize,
    pub total_open_interest_usd: f64,
}

pub async fn compare_symbol_across_venues(
    store: &PrimaryStore,
    normalized_symbol: &str,
) -> Result<SymbolComparison, QueryError> {
    if normalized_symbol.trim().is_empty() {
        return Err(QueryError::BadParameter(
            "normalized symbol must not be empty".into(),
        ));
    }
    let venues = store.normalized_tokens_for_symbol(normalized_symbol)?;
    let total_open_interest_usd = venues.iter().map(|v| v.open_interest_usd).sum();
    Ok(SymbolComparison {
        normalized_symbol: normalized_symbol.to_string(),
        venue_count: venues.len(),
        total_open_interest_usd,
        venues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VenueId;

    fn token(venue: VenueId, oi_usd: f64) -> NormalizedToken {
        NormalizedToken {
            normalized_symbol: "BTC".into(),
            venue,
            mark_price: 100_000.0,
            open_interest: 1.0,
            open_interest_usd: oi_usd,
            raw_funding_rate: 0.0008,
            funding_rate_1h_percent: 0.01,
            funding_rate_apr_percent: 87.6,
            atr_14: None,
            realized_vol_24h: None,
            realized_vol_7d: None,
            bollinger_width: None,
            updated_at_ms: 1,
        }
    }

    #[tokio::test]
    async fn rejects_empty_symbol() {
        let store = PrimaryStore::open_in_memory().unwrap();
        let err = compare_symbol_across_venues(&store, "  ").await.unwrap_err();
        assert!(matches!(err, QueryError::BadParameter(_)));
    }

    #[tokio::test]
    async fn totals_open_interest_across_venues() {
        let store = PrimaryStore::open_in_memory().unwrap();
        store
            .upsert_normalized_tokens(&[token(VenueId::Hyperliquid, 1_000_000.0), token(VenueId::Aster, 500_000.0)])
            .unwrap();
        let cmp = compare_symbol_across_venues(&store, "BTC").await.unwrap();
        assert_eq!(cmp.venue_count, 2);
        assert_eq!(cmp.total_open_interest_usd, 1_500_000.0);
    }
}
