//! Stage C (live-view refresh), fired every 5 minutes.
//!
//! For every (venue, original symbol) with a raw snapshot in the last
//! 10 minutes, upserts `normalized_tokens` with the most recent values,
//! the normalized funding rates from §4.2, and a best-effort volatility
//! snapshot (ATR-14 / realized vol / Bollinger width) computed from
//! `market_history` — the `volatility_stats` fields named in §6's table
//! layout, folded into the live row rather than a separate table since
//! they're always read alongside it.

use crate::domain::{NormalizedToken, Snapshot, VenueId};
use crate::normalize;
use crate::rollup::RollupStats;
use crate::storage::PrimaryStore;
use anyhow::Result;
use std::collections::HashMap;
use tracing::info;

const LOOKBACK_MS: i64 = 10 * 60 * 1000;

pub async fn run(store: &PrimaryStore, now_ms: i64) -> Result<RollupStats> {
    let since = now_ms - LOOKBACK_MS;
    let rows = store.snapshots_since(since)?;
    if rows.is_empty() {
        return Ok(RollupStats::default());
    }

    let mut latest: HashMap<(VenueId, String), Snapshot> = HashMap::new();
    for row in rows {
        let key = (row.venue, row.original_symbol.clone());
        latest
            .entry(key)
            .and_modify(|existing| {
                if row.recorded_at_ms > existing.recorded_at_ms {
                    *existing = row.clone();
                }
            })
            .or_insert(row);
    }

    let now_s = now_ms / 1000;
    let mut tokens = Vec::with_capacity(latest.len());
    for ((venue, original_symbol), snap) in latest {
        let normalized_symbol = normalize::normalize(&original_symbol);
        let funding = normalize::normalize_funding(
            snap.raw_funding_rate,
            venue,
            Some(snap.funding_interval_hours),
        );
        let vol = volatility_metrics(store, &normalized_symbol, now_s)?;

        tokens.push(NormalizedToken {
            normalized_symbol,
            venue,
            mark_price: snap.mark_price,
            open_interest: snap.open_interest,
            open_interest_usd: snap.open_interest_usd,
            raw_funding_rate: snap.raw_funding_rate,
            funding_rate_1h_percent: funding.hourly_percent,
            funding_rate_apr_percent: funding.annualized_percent,
            atr_14: vol.0,
            realized_vol_24h: vol.1,
            realized_vol_7d: vol.2,
            bollinger_width: vol.3,
            updated_at_ms: now_ms,
        });
    }

    let written = store.upsert_normalized_tokens(&tokens)?;
    info!(tokens_written = written, "stage_c complete");
    Ok(RollupStats {
        buckets_written: written,
        rows_deleted: 0,
    })
}

/// Best-effort (ATR-14, realized vol 24h, realized vol 7d, Bollinger
/// width) from `market_history`. Returns all-`None` once fewer than 2
/// hour buckets exist yet — too little history for any of these to be
/// meaningful.
fn volatility_metrics(
    store: &PrimaryStore,
    normalized_symbol: &str,
    now_s: i64,
) -> Result<(Option<f64>, Option<f64>, Option<f64>, Option<f64>)> {
    let hours_7d = store.hour_aggregates_range(normalized_symbol, now_s - 7 * 86_400, now_s)?;
    if hours_7d.len() < 2 {
        return Ok((None, None, None, None));
    }

    let true_ranges: Vec<f64> = hours_7d.iter().map(|h| h.max_price - h.min_price).collect();
    let atr_14 = Some(average(&true_ranges[true_ranges.len().saturating_sub(14)..]));

    let returns: Vec<f64> = hours_7d
        .windows(2)
        .filter(|w| w[0].avg_price != 0.0)
        .map(|w| (w[1].avg_price - w[0].avg_price) / w[0].avg_price)
        .collect();
    let realized_vol_7d = if returns.len() >= 2 {
        Some(stddev(&returns) * 100.0)
    } else {
        None
    };
    let last_24 = &returns[returns.len().saturating_sub(24)..];
    let realized_vol_24h = if last_24.len() >= 2 {
        Some(stddev(last_24) * 100.0)
    } else {
        None
    };

    let last_20_prices: Vec<f64> = hours_7d
        .iter()
        .rev()
        .take(20)
        .map(|h| h.avg_price)
        .collect();
    let bollinger_width = if last_20_prices.len() >= 2 {
        let mean = average(&last_20_prices);
        let sd = stddev(
            &last_20_prices
                .iter()
                .map(|p| if mean != 0.0 { (p - mean) / mean } else { 0.0 })
                .collect::<Vec<_>>(),
        );
        Some(4.0 * sd * 100.0) // (mean+2sd) - (mean-2sd), in percent of mean
    } else {
        None
    };

    Ok((atr_14, realized_vol_24h, realized_vol_7d, bollinger_width))
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = average(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SnapshotInput;

    #[tokio::test]
    async fn upserts_live_row_for_recent_snapshot() {
        let store = PrimaryStore::open_in_memory().unwrap();
        let now_ms = 1_700_000_000_000i64;
        store
            .insert_snapshots_batch(&[SnapshotInput::new(
                VenueId::Hyperliquid,
                "BTC-USD-PERP",
                100_000.0,
                100_000.0,
                1.0,
                100_000.0,
                0.0008,
                8.0,
                10.0,
                10.0,
                99_000.0,
                101_000.0,
                0.5,
                now_ms - 60_000,
            )])
            .unwrap();

        let stats = run(&store, now_ms).await.unwrap();
        assert_eq!(stats.buckets_written, 1);

        let tokens = store.normalized_tokens_for_symbol("BTC").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].venue, VenueId::Hyperliquid);
        assert!(tokens[0].atr_14.is_none());
    }

    #[tokio::test]
    async fn stale_snapshots_outside_lookback_are_skipped() {
        let store = PrimaryStore::open_in_memory().unwrap();
        let now_ms = 1_700_000_000_000i64;
        store
            .insert_snapshots_batch(&[SnapshotInput::new(
                VenueId::Hyperliquid,
                "BTC-USD-PERP",
                100_000.0,
                100_000.0,
                1.0,
                100_000.0,
                0.0008,
                8.0,
                10.0,
                10.0,
                99_000.0,
                101_000.0,
                0.5,
                now_ms - 20 * 60_000,
            )])
            .unwrap();

        let stats = run(&store, now_ms).await.unwrap();
        assert_eq!(stats.buckets_written, 0);
    }
}
