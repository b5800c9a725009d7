//! Stage B (1m → 1h), fired hourly on the hour.
//!
//! Minute buckets are weighted by their own `sample_count` so a minute
//! built from more raw snapshots (a busy venue, or one that happened
//! to report more often) contributes proportionally more to the hour
//! average, per §4.5.

use crate::domain::{HourAggregate, MinuteAggregate, VenueId};
use crate::rollup::RollupStats;
use crate::storage::PrimaryStore;
use anyhow::Result;
use std::collections::HashMap;
use tracing::info;

const STALE_AFTER_SECS: i64 = 3600;

pub async fn run(store: &PrimaryStore, now_ms: i64) -> Result<RollupStats> {
    let cutoff = now_ms / 1000 - STALE_AFTER_SECS;
    let rows = store.minute_aggregates_older_than(cutoff)?;
    if rows.is_empty() {
        return Ok(RollupStats::default());
    }

    let mut buckets: HashMap<(VenueId, String, i64), Vec<MinuteAggregate>> = HashMap::new();
    for row in rows {
        let hour_bucket = (row.bucket_ts / 3600) * 3600;
        buckets
            .entry((row.venue, row.original_symbol.clone(), hour_bucket))
            .or_default()
            .push(row);
    }

    let mut keys_to_delete = Vec::new();
    let mut aggregates = Vec::with_capacity(buckets.len());
    for ((venue, original_symbol, hour_bucket), minutes) in buckets {
        for m in &minutes {
            keys_to_delete.push((venue, m.original_symbol.clone(), m.bucket_ts));
        }
        aggregates.push(aggregate_hour(venue, original_symbol, hour_bucket, &minutes));
    }

    let written = store.upsert_hour_aggregates(&aggregates)?;
    let deleted = store.delete_minute_aggregates(&keys_to_delete)?;

    info!(
        buckets_written = written,
        minute_rows_deleted = deleted,
        "stage_b complete"
    );

    Ok(RollupStats {
        buckets_written: written,
        rows_deleted: deleted,
    })
}

fn aggregate_hour(
    venue: VenueId,
    original_symbol: String,
    bucket_ts: i64,
    minutes: &[MinuteAggregate],
) -> HourAggregate {
    let total_samples: f64 = minutes.iter().map(|m| m.sample_count as f64).sum();
    let weighted = |f: &dyn Fn(&MinuteAggregate) -> f64| -> f64 {
        minutes
            .iter()
            .map(|m| f(m) * m.sample_count as f64)
            .sum::<f64>()
            / total_samples
    };

    let normalized_symbol = minutes[0].normalized_symbol.clone();
    let min_price = minutes.iter().map(|m| m.min_price).fold(f64::INFINITY, f64::min);
    let max_price = minutes
        .iter()
        .map(|m| m.max_price)
        .fold(f64::NEG_INFINITY, f64::max);
    let min_funding_rate = minutes
        .iter()
        .map(|m| m.min_funding_rate)
        .fold(f64::INFINITY, f64::min);
    let max_funding_rate = minutes
        .iter()
        .map(|m| m.max_funding_rate)
        .fold(f64::NEG_INFINITY, f64::max);
    let max_oi_usd = minutes.iter().map(|m| m.max_oi_usd).fold(f64::NEG_INFINITY, f64::max);

    HourAggregate {
        venue,
        original_symbol,
        normalized_symbol,
        min_price,
        avg_price: weighted(&|m| m.avg_price),
        max_price,
        price_volatility_percent: weighted(&|m| m.price_volatility_percent),
        volume_24h_base_sum: minutes.iter().map(|m| m.volume_24h_base_sum).sum(),
        volume_24h_quote_sum: minutes.iter().map(|m| m.volume_24h_quote_sum).sum(),
        avg_oi_usd: weighted(&|m| m.avg_oi_usd),
        max_oi_usd,
        avg_funding_rate: weighted(&|m| m.avg_funding_rate),
        min_funding_rate,
        max_funding_rate,
        avg_annualized_funding_percent: weighted(&|m| m.avg_annualized_funding_percent),
        bucket_ts,
        sample_count: total_samples as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute(bucket_ts: i64, avg_price: f64, sample_count: i64) -> MinuteAggregate {
        MinuteAggregate {
            venue: VenueId::Hyperliquid,
            original_symbol: "BTC-USD-PERP".to_string(),
            normalized_symbol: "BTC".to_string(),
            min_price: avg_price - 10.0,
            avg_price,
            max_price: avg_price + 10.0,
            price_volatility_percent: 0.1,
            volume_24h_base_sum: 10.0,
            volume_24h_quote_sum: 10.0,
            avg_oi_usd: 1_000_000.0,
            max_oi_usd: 1_100_000.0,
            avg_funding_rate: 0.0008,
            min_funding_rate: 0.0007,
            max_funding_rate: 0.0009,
            avg_annualized_funding_percent: 8.76,
            bucket_ts,
            sample_count,
        }
    }

    #[test]
    fn weighted_average_favors_higher_sample_count_minute() {
        let minutes = vec![minute(0, 100.0, 1), minute(60, 200.0, 9)];
        let hour = aggregate_hour(VenueId::Hyperliquid, "BTC-USD-PERP".to_string(), 0, &minutes);
        assert!((hour.avg_price - 190.0).abs() < 1e-9);
        assert_eq!(hour.sample_count, 10);
    }
}
