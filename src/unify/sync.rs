//! Per-venue high-water-mark sync into the unified cross-venue funding
//! table (§4.6). Reads newly-rolled-up hour buckets out of `market_history`
//! (the permanent table Stage B writes to) and upserts them into
//! `unified_v3`, applying the `|raw_rate_percent| ≤ 10` filter and the
//! §4.1 symbol normalizer. Grounded in the same transaction-per-batch
//! idiom as `UnifiedStore::upsert_funding_rows` itself.

use crate::domain::{FundingSource, UnifiedFundingRow, VenueId};
use crate::normalize;
use crate::storage::{PrimaryStore, UnifiedStore};
use anyhow::Result;
use tracing::{info, warn};

const BATCH_SIZE: usize = 500;
const SEED_LOOKBACK_SECS: i64 = 7 * 86_400;
const MS_THRESHOLD: i64 = 10_000_000_000; // 10^10, the ms-vs-s cutoff from §4.6

/// Summary counters for one sync pass across every venue.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncStats {
    pub rows_synced: usize,
    pub rows_filtered_rate: usize,
}

/// A timestamp that might arrive in milliseconds or seconds, converted
/// to seconds via the `>10^10` heuristic (a second-precision unix
/// timestamp doesn't cross that threshold until the year 2286).
fn to_seconds(ts: i64) -> i64 {
    if ts > MS_THRESHOLD {
        ts / 1000
    } else {
        ts
    }
}

/// Sync every venue's newly-rolled-up funding history into `unified_v3`
/// as live data. Safe to run concurrently with collectors (disjoint
/// tables); must itself be invoked by a single scheduled instance (§5).
pub async fn run(
    primary: &PrimaryStore,
    unified: &UnifiedStore,
    venues: &[VenueId],
    now_s: i64,
) -> Result<SyncStats> {
    sync_with(primary, unified, venues, now_s, FundingSource::Live, SEED_LOOKBACK_SECS).await
}

/// Same contract, filtered to `source = 'import'` rows with a
/// caller-supplied look-back, per §4.6's "import-source rows ... may be
/// called with a larger look-back".
pub async fn run_import(
    primary: &PrimaryStore,
    unified: &UnifiedStore,
    venues: &[VenueId],
    now_s: i64,
    lookback_secs: i64,
) -> Result<SyncStats> {
    sync_with(primary, unified, venues, now_s, FundingSource::Import, lookback_secs).await
}

async fn sync_with(
    primary: &PrimaryStore,
    unified: &UnifiedStore,
    venues: &[VenueId],
    now_s: i64,
    source: FundingSource,
    seed_lookback_secs: i64,
) -> Result<SyncStats> {
    let mut stats = SyncStats::default();

    for &venue in venues {
        let since_s = match unified.last_synced_funding_time(venue)? {
            Some(last) => last,
            None => now_s - seed_lookback_secs,
        };

        let hours = primary.hour_aggregates_since(venue, since_s, BATCH_SIZE)?;
        if hours.is_empty() {
            continue;
        }

        let params = venue.funding_params();
        let mut rows = Vec::with_capacity(hours.len());
        for hour in hours {
            let raw_rate_percent = if params.raw_in_percent {
                hour.avg_funding_rate
            } else {
                hour.avg_funding_rate * 100.0
            };
            if raw_rate_percent.abs() > 10.0 {
                stats.rows_filtered_rate += 1;
                continue;
            }

            let funding = normalize::normalize_funding(hour.avg_funding_rate, venue, None);
            rows.push(UnifiedFundingRow {
                normalized_symbol: normalize::normalize(&hour.original_symbol),
                venue,
                funding_time: to_seconds(hour.bucket_ts),
                original_symbol: hour.original_symbol,
                raw_rate: hour.avg_funding_rate,
                raw_rate_percent,
                interval_hours: params.default_interval_hours,
                rate_1h_percent: funding.hourly_percent,
                rate_apr: funding.annualized_percent,
                source,
                synced_at: now_s,
                open_interest: Some(hour.avg_oi_usd),
            });
        }

        let written = unified.upsert_funding_rows(&rows)?;
        stats.rows_synced += written;
    }

    if stats.rows_filtered_rate > 0 {
        warn!(
            dropped = stats.rows_filtered_rate,
            reason = "raw_rate_percent out of range",
            "unified sync filtered rows"
        );
    }
    info!(
        rows_synced = stats.rows_synced,
        source = source.as_str(),
        "unified sync complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HourAggregate;

    fn hour(bucket_ts: i64, avg_funding_rate: f64) -> HourAggregate {
        HourAggregate {
            venue: VenueId::Hyperliquid,
            original_symbol: "BTC-USD-PERP".to_string(),
            normalized_symbol: "BTC".to_string(),
            min_price: 99_000.0,
            avg_price: 100_000.0,
            max_price: 101_000.0,
            price_volatility_percent: 1.0,
            volume_24h_base_sum: 10.0,
            volume_24h_quote_sum: 10.0,
            avg_oi_usd: 1_000_000.0,
            max_oi_usd: 1_100_000.0,
            avg_funding_rate,
            min_funding_rate: avg_funding_rate,
            max_funding_rate: avg_funding_rate,
            avg_annualized_funding_percent: avg_funding_rate * 100.0 * 3.0 * 365.0,
            bucket_ts,
            sample_count: 60,
        }
    }

    #[tokio::test]
    async fn seeds_lookback_on_first_sync_and_writes_rows() {
        let primary = PrimaryStore::open_in_memory().unwrap();
        let unified = UnifiedStore::open_in_memory().unwrap();
        primary
            .upsert_hour_aggregates(&[hour(1_700_000_000, 0.0008)])
            .unwrap();

        let stats = run(&primary, &unified, &[VenueId::Hyperliquid], 1_700_003_600)
            .await
            .unwrap();
        assert_eq!(stats.rows_synced, 1);
        assert_eq!(
            unified
                .last_synced_funding_time(VenueId::Hyperliquid)
                .unwrap(),
            Some(1_700_000_000)
        );
    }

    #[tokio::test]
    async fn filters_rows_with_raw_rate_percent_over_ten() {
        let primary = PrimaryStore::open_in_memory().unwrap();
        let unified = UnifiedStore::open_in_memory().unwrap();
        primary
            .upsert_hour_aggregates(&[hour(1_700_000_000, 0.2)]) // 20% hourly -> filtered
            .unwrap();

        let stats = run(&primary, &unified, &[VenueId::Hyperliquid], 1_700_003_600)
            .await
            .unwrap();
        assert_eq!(stats.rows_synced, 0);
        assert_eq!(stats.rows_filtered_rate, 1);
    }

    #[tokio::test]
    async fn second_sync_only_reads_rows_past_high_water_mark() {
        let primary = PrimaryStore::open_in_memory().unwrap();
        let unified = UnifiedStore::open_in_memory().unwrap();
        primary
            .upsert_hour_aggregates(&[hour(1_700_000_000, 0.0008)])
            .unwrap();
        run(&primary, &unified, &[VenueId::Hyperliquid], 1_700_003_600)
            .await
            .unwrap();

        primary
            .upsert_hour_aggregates(&[hour(1_700_003_600, 0.0009)])
            .unwrap();
        let stats = run(&primary, &unified, &[VenueId::Hyperliquid], 1_700_007_200)
            .await
            .unwrap();
        assert_eq!(stats.rows_synced, 1);
    }
}
