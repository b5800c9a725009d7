//! `normalized_data` (§4.9): dispatches across raw/1-minute/1-hour
//! tables based on `interval` and the age of the requested range,
//! rejects ranges over 30 days, and fills the gap near "now" by
//! aggregating raw rows on the fly when the finest stored granularity
//! hasn't caught up yet — reusing `rollup::stage_a`'s bucket arithmetic
//! rather than duplicating it.

use crate::domain::{HourAggregate, MinuteAggregate, Snapshot, VenueId};
use crate::error::QueryError;
use crate::normalize::symbol::normalize;
use crate::rollup::stage_a;
use crate::storage::PrimaryStore;
use serde::Serialize;
use std::collections::HashMap;

const MAX_RANGE_SECS: i64 = 30 * 86_400;
const RAW_SCAN_LIMIT: usize = 20_000;
/// Minute buckets are only reliably present once Stage A has had a
/// chance to roll them up; anything newer than this is filled in from
/// raw rows instead.
const MINUTE_ROLLUP_LAG_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Raw,
    Min15,
    Hour1,
    Hour4,
    Day1,
    Day7,
    Day30,
    Auto,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "granularity", rename_all = "snake_case")]
pub enum NormalizedDataRow {
    Raw(Snapshot),
    Minute(MinuteAggregate),
    Hour(HourAggregate),
}

pub async fn normalized_data(
    store: &PrimaryStore,
    normalized_symbol: &str,
    from_s: i64,
    to_s: i64,
    interval: Interval,
    now_s: i64,
) -> Result<Vec<NormalizedDataRow>, QueryError> {
    if normalized_symbol.trim().is_empty() {
        return Err(QueryError::BadParameter(
            "normalized symbol must not be empty".into(),
        ));
    }
    if to_s < from_s {
        return Err(QueryError::BadParameter(
            "range end must not precede range start".into(),
        ));
    }
    if to_s - from_s > MAX_RANGE_SECS {
        return Err(QueryError::BadParameter(
            "time ranges beyond 30 days are rejected".into(),
        ));
    }

    let resolved = resolve_interval(interval, from_s, now_s);
    let mut rows = match resolved {
        Interval::Raw => raw_rows(store, normalized_symbol, from_s, to_s)?,
        Interval::Min15 => minute_rows(store, normalized_symbol, from_s, to_s)?,
        Interval::Hour1 | Interval::Hour4 | Interval::Day1 | Interval::Day7 | Interval::Day30 => {
            hour_rows(store, normalized_symbol, from_s, to_s)?
        }
        Interval::Auto => unreachable!("resolve_interval never returns Auto"),
    };

    if matches!(resolved, Interval::Min15) && to_s >= now_s - MINUTE_ROLLUP_LAG_SECS {
        if let Some(gap) = gap_fill_minute(store, normalized_symbol, now_s)? {
            rows.push(NormalizedDataRow::Minute(gap));
        }
    }

    Ok(rows)
}

fn resolve_interval(requested: Interval, from_s: i64, now_s: i64) -> Interval {
    if requested != Interval::Auto {
        return requested;
    }
    if now_s - from_s <= 3600 {
        Interval::Min15
    } else {
        Interval::Hour1
    }
}

fn raw_rows(
    store: &PrimaryStore,
    normalized_symbol: &str,
    from_s: i64,
    to_s: i64,
) -> Result<Vec<NormalizedDataRow>, QueryError> {
    let snapshots = store.raw_snapshots_in_range(from_s * 1000, to_s * 1000, RAW_SCAN_LIMIT)?;
    Ok(snapshots
        .into_iter()
        .filter(|s| normalize(&s.original_symbol) == normalized_symbol)
        .map(NormalizedDataRow::Raw)
        .collect())
}

fn minute_rows(
    store: &PrimaryStore,
    normalized_symbol: &str,
    from_s: i64,
    to_s: i64,
) -> Result<Vec<NormalizedDataRow>, QueryError> {
    Ok(store
        .minute_aggregates_range(normalized_symbol, from_s, to_s)?
        .into_iter()
        .map(NormalizedDataRow::Minute)
        .collect())
}

fn hour_rows(
    store: &PrimaryStore,
    normalized_symbol: &str,
    from_s: i64,
    to_s: i64,
) -> Result<Vec<NormalizedDataRow>, QueryError> {
    Ok(store
        .hour_aggregates_range(normalized_symbol, from_s, to_s)?
        .into_iter()
        .map(NormalizedDataRow::Hour)
        .collect())
}

/// Aggregates raw rows from the last `MINUTE_ROLLUP_LAG_SECS` into one
/// synthetic minute bucket per (venue, original symbol) matching
/// `normalized_symbol`, so callers asking for "now" don't see a gap
/// while Stage A hasn't run yet. Only the most recent (venue, symbol)
/// combination is folded in, matching the live-view's own "latest
/// wins" semantics.
fn gap_fill_minute(
    store: &PrimaryStore,
    normalized_symbol: &str,
    now_s: i64,
) -> Result<Option<MinuteAggregate>, QueryError> {
    let since_ms = (now_s - MINUTE_ROLLUP_LAG_SECS) * 1000;
    let snapshots = store.raw_snapshots_in_range(since_ms, now_s * 1000, RAW_SCAN_LIMIT)?;
    let matching: Vec<Snapshot> = snapshots
        .into_iter()
        .filter(|s| normalize(&s.original_symbol) == normalized_symbol)
        .collect();
    if matching.is_empty() {
        return Ok(None);
    }

    let mut by_venue_symbol: HashMap<(VenueId, String), Vec<&Snapshot>> = HashMap::new();
    for s in &matching {
        by_venue_symbol
            .entry((s.venue, s.original_symbol.clone()))
            .or_default()
            .push(s);
    }

    // Pick the (venue, symbol) pair with the most recent observation.
    let ((venue, original_symbol), samples) = by_venue_symbol
        .into_iter()
        .max_by_key(|(_, samples)| samples.iter().map(|s| s.recorded_at_ms).max().unwrap_or(0))
        .expect("matching is non-empty");

    let bucket_ts = (now_s / 60) * 60;
    Ok(Some(stage_a::aggregate_minute(
        venue,
        original_symbol,
        bucket_ts,
        &samples,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SnapshotInput, VenueId};

    #[tokio::test]
    async fn rejects_ranges_over_thirty_days() {
        let store = PrimaryStore::open_in_memory().unwrap();
        let err = normalized_data(&store, "BTC", 0, 31 * 86_400, Interval::Auto, 31 * 86_400)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::BadParameter(_)));
    }

    #[tokio::test]
    async fn auto_picks_hour_granularity_for_older_ranges() {
        let store = PrimaryStore::open_in_memory().unwrap();
        let now_s = 1_700_100_000i64;
        store
            .upsert_hour_aggregates(&[crate::domain::HourAggregate {
                venue: VenueId::Hyperliquid,
                original_symbol: "BTC-USD-PERP".into(),
                normalized_symbol: "BTC".into(),
                min_price: 99_000.0,
                avg_price: 100_000.0,
                max_price: 101_000.0,
                price_volatility_percent: 1.0,
                volume_24h_base_sum: 1.0,
                volume_24h_quote_sum: 1.0,
                avg_oi_usd: 1_000_000.0,
                max_oi_usd: 1_000_000.0,
                avg_funding_rate: 0.0008,
                min_funding_rate: 0.0008,
                max_funding_rate: 0.0008,
                avg_annualized_funding_percent: 8.76,
                bucket_ts: now_s - 2 * 3600,
                sample_count: 60,
            }])
            .unwrap();

        let rows = normalized_data(
            &store,
            "BTC",
            now_s - 10 * 3600,
            now_s,
            Interval::Auto,
            now_s,
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0], NormalizedDataRow::Hour(_)));
    }

    #[tokio::test]
    async fn gap_fill_folds_recent_raw_rows_into_a_synthetic_minute() {
        let store = PrimaryStore::open_in_memory().unwrap();
        let now_ms = 1_700_100_000_000i64;
        let now_s = now_ms / 1000;
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
                now_ms - 30_000,
            )])
            .unwrap();

        let rows = normalized_data(&store, "BTC", now_s - 600, now_s, Interval::Auto, now_s)
            .await
            .unwrap();
        assert!(rows.iter().any(|r| matches!(r, NormalizedDataRow::Minute(_))));
    }
}
