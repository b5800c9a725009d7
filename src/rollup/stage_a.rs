//! Stage A (15s → 1m), fired every 5 minutes by the scheduler.
//!
//! Processes at most 50 distinct hour buckets per run (§4.5) so the
//! working set stays bounded; within each hour the raw rows are only
//! deleted once that hour's minute buckets have been durably written,
//! so a crash mid-run leaves strictly less raw retention, never a gap.

use crate::domain::{MinuteAggregate, VenueId};
use crate::normalize;
use crate::rollup::RollupStats;
use crate::storage::PrimaryStore;
use anyhow::Result;
use std::collections::HashMap;
use tracing::info;

const STALE_AFTER_MS: i64 = 5 * 60 * 1000;
const MAX_HOUR_BATCHES: usize = 50;

pub async fn run(store: &PrimaryStore, now_ms: i64) -> Result<RollupStats> {
    let cutoff = now_ms - STALE_AFTER_MS;
    let hours = store.raw_hour_buckets_older_than(cutoff, MAX_HOUR_BATCHES)?;
    let mut stats = RollupStats::default();

    for hour_start_s in hours {
        let rows = store.snapshots_in_hour(hour_start_s, cutoff)?;
        if rows.is_empty() {
            continue;
        }

        let mut buckets: HashMap<(VenueId, String, i64), Vec<&crate::domain::Snapshot>> =
            HashMap::new();
        for row in &rows {
            let bucket_ts = (row.recorded_at_ms / 1000 / 60) * 60;
            buckets
                .entry((row.venue, row.original_symbol.clone(), bucket_ts))
                .or_default()
                .push(row);
        }

        let aggregates: Vec<MinuteAggregate> = buckets
            .into_iter()
            .map(|((venue, original_symbol, bucket_ts), samples)| {
                aggregate_minute(venue, original_symbol, bucket_ts, &samples)
            })
            .collect();

        let written = store.upsert_minute_aggregates(&aggregates)?;
        let deleted = store.delete_snapshots_in_hour(hour_start_s, cutoff)?;

        stats.buckets_written += written;
        stats.rows_deleted += deleted;
        info!(
            hour_start_s,
            buckets_written = written,
            raw_rows_deleted = deleted,
            "stage_a hour processed"
        );
    }

    Ok(stats)
}

/// Exposed to the query layer so `normalized_data`'s raw-interval
/// gap-fill can build the same shape of minute bucket from a handful of
/// recent raw rows without duplicating the arithmetic.
pub(crate) fn aggregate_minute(
    venue: VenueId,
    original_symbol: String,
    bucket_ts: i64,
    samples: &[&crate::domain::Snapshot],
) -> MinuteAggregate {
    let n = samples.len() as f64;
    let prices: Vec<f64> = samples.iter().map(|s| s.mark_price).collect();
    let min_price = prices.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_price = prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg_price = prices.iter().sum::<f64>() / n;
    let price_volatility_percent = if avg_price != 0.0 {
        (max_price - min_price) / avg_price * 100.0
    } else {
        0.0
    };

    let volume_24h_base_sum = samples.iter().map(|s| s.volume_24h_base).sum();
    let volume_24h_quote_sum = samples.iter().map(|s| s.volume_24h_quote).sum();

    let oi_values: Vec<f64> = samples.iter().map(|s| s.open_interest_usd).collect();
    let avg_oi_usd = oi_values.iter().sum::<f64>() / n;
    let max_oi_usd = oi_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let raw_funding: Vec<f64> = samples.iter().map(|s| s.raw_funding_rate).collect();
    let avg_funding_rate = raw_funding.iter().sum::<f64>() / n;
    let min_funding_rate = raw_funding.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_funding_rate = raw_funding.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let interval_hours = samples[0].funding_interval_hours;
    let annualized = normalize::normalize_funding(avg_funding_rate, venue, Some(interval_hours))
        .annualized_percent;

    MinuteAggregate {
        venue,
        original_symbol: original_symbol.clone(),
        normalized_symbol: normalize::normalize(&original_symbol),
        min_price,
        avg_price,
        max_price,
        price_volatility_percent,
        volume_24h_base_sum,
        volume_24h_quote_sum,
        avg_oi_usd,
        max_oi_usd,
        avg_funding_rate,
        min_funding_rate,
        max_funding_rate,
        avg_annualized_funding_percent: annualized,
        bucket_ts,
        sample_count: samples.len() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SnapshotInput;

    #[tokio::test]
    async fn aggregates_one_minute_bucket_and_deletes_raw_rows() {
        let store = PrimaryStore::open_in_memory().unwrap();
        let base_ms = 1_700_000_000_000i64;
        let rows = vec![
            SnapshotInput::new(
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
                99_500.0,
                100_500.0,
                0.5,
                base_ms,
            ),
            SnapshotInput::new(
                VenueId::Hyperliquid,
                "BTC-USD-PERP",
                101_000.0,
                101_000.0,
                1.0,
                101_000.0,
                0.0009,
                8.0,
                10.0,
                10.0,
                99_500.0,
                100_500.0,
                0.5,
                base_ms + 15_000,
            ),
        ];
        store.insert_snapshots_batch(&rows).unwrap();

        let stats = run(&store, base_ms + 10 * 60 * 1000).await.unwrap();
        assert_eq!(stats.buckets_written, 1);
        assert_eq!(stats.rows_deleted, 2);

        let remaining = store
            .range_scan(VenueId::Hyperliquid, None, None, None, 10)
            .unwrap();
        assert!(remaining.is_empty());
    }

    /// `now_ms` sits inside the same hour as the raw rows, with some
    /// rows older than 5 minutes and some newer. Only the old rows
    /// should be aggregated and deleted; the recent row must survive
    /// for a later pass to pick up.
    #[tokio::test]
    async fn retains_raw_rows_younger_than_five_minutes_in_the_current_hour() {
        let store = PrimaryStore::open_in_memory().unwrap();
        let hour_start_ms = 1_700_002_800_000i64; // aligned to an hour boundary
        let now_ms = hour_start_ms + 40 * 60 * 1000; // 40 minutes into the hour

        let make = |recorded_at_ms: i64| {
            SnapshotInput::new(
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
                99_500.0,
                100_500.0,
                0.5,
                recorded_at_ms,
            )
        };

        // An old minute (30 min in, well past the 5-minute cutoff).
        let old_ms = hour_start_ms + 30 * 60 * 1000;
        // A fresh minute, only 1 minute before `now_ms` — inside the
        // 5-minute retention window and must not be touched.
        let recent_ms = now_ms - 60 * 1000;

        store
            .insert_snapshots_batch(&[make(old_ms), make(recent_ms)])
            .unwrap();

        let stats = run(&store, now_ms).await.unwrap();
        assert_eq!(stats.buckets_written, 1, "only the old minute is aggregated");
        assert_eq!(stats.rows_deleted, 1, "only the old raw row is deleted");

        let remaining = store
            .range_scan(VenueId::Hyperliquid, None, None, None, 10)
            .unwrap();
        assert_eq!(remaining.len(), 1, "the recent raw row must survive");
        assert_eq!(remaining[0].recorded_at_ms, recent_ms);

        let minute_rows = store.minute_aggregates_range("BTC", 0, i64::MAX).unwrap();
        assert_eq!(minute_rows.len(), 1);
        assert_eq!(minute_rows[0].sample_count, 1);
    }
}
