//! Moving-average engine (§4.7): per-(symbol, venue, window) MA rows
//! plus a cross-venue aggregate keyed by (symbol, window). Runs as bulk
//! `INSERT OR REPLACE` passes rather than row-by-row read-then-write,
//! grounded in `rollup::stage_b`'s sample-count-weighted averaging idiom.

use crate::domain::{CrossVenueMaRow, MovingAverageRow, VenueId, Window};
use crate::storage::UnifiedStore;
use anyhow::Result;
use std::collections::HashMap;
use tracing::info;

const HOURS_PER_YEAR: f64 = 24.0 * 365.0;
const OUTLIER_SIGMA: f64 = 3.0;
const MIN_POINTS_FOR_OUTLIER_FILTER: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct MaStats {
    pub per_venue_rows: usize,
    pub cross_venue_rows: usize,
}

pub async fn run(unified: &UnifiedStore, now_s: i64) -> Result<MaStats> {
    let symbol_venues = unified.distinct_symbol_venues()?;
    let mut per_venue_rows: Vec<MovingAverageRow> = Vec::new();

    for (symbol, venue) in &symbol_venues {
        let earliest = unified.earliest_funding_time(symbol, *venue)?;
        for &window in Window::ma_windows() {
            if window.requires_eligibility_gate() {
                let eligible = earliest.is_some_and(|t| now_s - t >= window.length_seconds());
                if !eligible {
                    continue;
                }
            }

            let from_s = now_s - window.length_seconds();
            let samples = unified.rate_samples(symbol, *venue, from_s, now_s)?;
            if samples.len() < window.min_sample_count() as usize {
                continue;
            }

            if let Some(row) = build_ma_row(symbol, *venue, window, &samples, from_s, now_s) {
                per_venue_rows.push(row);
            }
        }
    }

    let written = unified.upsert_ma_rows(&per_venue_rows)?;

    let cross_rows = cross_venue_rows(&per_venue_rows, now_s);
    let cross_written = unified.upsert_cross_venue_ma_rows(&cross_rows)?;

    info!(
        per_venue_rows = written,
        cross_venue_rows = cross_written,
        "moving average engine complete"
    );
    Ok(MaStats {
        per_venue_rows: written,
        cross_venue_rows: cross_written,
    })
}

fn build_ma_row(
    symbol: &str,
    venue: VenueId,
    window: Window,
    samples: &[f64],
    window_start: i64,
    window_end: i64,
) -> Option<MovingAverageRow> {
    let mean = average(samples);
    let sd = stddev(samples);

    let filtered: Vec<f64> = if sd > 0.0 && samples.len() >= MIN_POINTS_FOR_OUTLIER_FILTER {
        samples
            .iter()
            .copied()
            .filter(|v| (v - mean).abs() <= OUTLIER_SIGMA * sd)
            .collect()
    } else {
        samples.to_vec()
    };
    if filtered.len() != samples.len() {
        tracing::warn!(
            dropped = samples.len() - filtered.len(),
            symbol,
            venue = %venue,
            reason = "outlier beyond 3-sigma",
            "moving average engine dropped samples"
        );
    }
    if filtered.is_empty() {
        return None;
    }

    let ma_rate_1h = average(&filtered);
    let min_rate_1h = filtered.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_rate_1h = filtered.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    Some(MovingAverageRow {
        normalized_symbol: symbol.to_string(),
        venue,
        window,
        ma_rate_1h,
        ma_apr: ma_rate_1h * HOURS_PER_YEAR,
        sample_count: filtered.len() as i64,
        stddev: sd,
        min_rate_1h,
        max_rate_1h,
        calculated_at: window_end,
        window_start,
        window_end,
    })
}

/// Cross-venue aggregate per (symbol, window): simple average, sample-
/// count-weighted average, min/max, spread, venue count (§4.7).
/// Requires at least 2 venues.
fn cross_venue_rows(per_venue: &[MovingAverageRow], now_s: i64) -> Vec<CrossVenueMaRow> {
    let mut groups: HashMap<(String, Window), Vec<&MovingAverageRow>> = HashMap::new();
    for row in per_venue {
        groups
            .entry((row.normalized_symbol.clone(), row.window))
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .filter(|(_, rows)| rows.len() >= 2)
        .map(|((symbol, window), rows)| {
            let venue_count = rows.len() as i64;
            let simple_avg = rows.iter().map(|r| r.ma_rate_1h).sum::<f64>() / venue_count as f64;
            let total_samples: f64 = rows.iter().map(|r| r.sample_count as f64).sum();
            let weighted_avg = rows
                .iter()
                .map(|r| r.ma_rate_1h * r.sample_count as f64)
                .sum::<f64>()
                / total_samples;
            let min_rate = rows.iter().map(|r| r.ma_rate_1h).fold(f64::INFINITY, f64::min);
            let max_rate = rows
                .iter()
                .map(|r| r.ma_rate_1h)
                .fold(f64::NEG_INFINITY, f64::max);

            CrossVenueMaRow {
                normalized_symbol: symbol,
                window,
                simple_avg_rate_1h: simple_avg,
                weighted_avg_rate_1h: weighted_avg,
                min_venue_rate_1h: min_rate,
                max_venue_rate_1h: max_rate,
                spread: max_rate - min_rate,
                venue_count,
                calculated_at: now_s,
            }
        })
        .collect()
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
    use crate::domain::FundingSource;
    use crate::storage::UnifiedStore;

    fn row(symbol: &str, venue: VenueId, ft: i64, rate_1h: f64) -> crate::domain::UnifiedFundingRow {
        crate::domain::UnifiedFundingRow {
            normalized_symbol: symbol.to_string(),
            venue,
            funding_time: ft,
            original_symbol: format!("{symbol}-PERP"),
            raw_rate: rate_1h / 100.0,
            raw_rate_percent: rate_1h,
            interval_hours: 8.0,
            rate_1h_percent: rate_1h,
            rate_apr: rate_1h * HOURS_PER_YEAR,
            source: FundingSource::Live,
            synced_at: ft,
            open_interest: Some(1_000_000.0),
        }
    }

    #[tokio::test]
    async fn below_threshold_window_is_skipped() {
        let store = UnifiedStore::open_in_memory().unwrap();
        let now = 1_700_000_000i64;
        store
            .upsert_funding_rows(&[row("BTC", VenueId::Hyperliquid, now - 3600, 0.01)])
            .unwrap();
        let stats = run(&store, now).await.unwrap();
        assert_eq!(stats.per_venue_rows, 0); // 24h threshold is 3 samples, we have 1
    }

    #[tokio::test]
    async fn daily_window_respects_eligibility_gate() {
        let store = UnifiedStore::open_in_memory().unwrap();
        let now = 1_700_000_000i64;
        for i in 0..6 {
            store
                .upsert_funding_rows(&[row("BTC", VenueId::Hyperliquid, now - i * 3600, 0.01)])
                .unwrap();
        }
        let stats = run(&store, now).await.unwrap();
        assert!(stats.per_venue_rows >= 1);
        assert!(store
            .ma_row("BTC", VenueId::Hyperliquid, Window::H24)
            .unwrap()
            .is_some());
        assert!(store
            .ma_row("BTC", VenueId::Hyperliquid, Window::D3)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn outlier_filter_excludes_values_beyond_three_sigma() {
        let store = UnifiedStore::open_in_memory().unwrap();
        let now = 1_700_000_000i64;
        for i in 0..10 {
            store
                .upsert_funding_rows(&[row("BTC", VenueId::Hyperliquid, now - i * 3600, 0.01)])
                .unwrap();
        }
        // one wild outlier, still within the 24h window
        store
            .upsert_funding_rows(&[row("BTC", VenueId::Hyperliquid, now - 11 * 3600, 5.0)])
            .unwrap();

        run(&store, now).await.unwrap();
        let ma = store
            .ma_row("BTC", VenueId::Hyperliquid, Window::H24)
            .unwrap()
            .unwrap();
        assert!((ma.ma_rate_1h - 0.01).abs() < 1e-6, "outlier should be filtered out of the mean");
    }

    #[test]
    fn cross_venue_requires_at_least_two_venues() {
        let single = vec![sample_row(VenueId::Hyperliquid, 0.01)];
        assert!(cross_venue_rows(&single, 1).is_empty());
    }

    #[test]
    fn cross_venue_spread_is_max_minus_min() {
        let rows = vec![sample_row(VenueId::Hyperliquid, 0.01), sample_row(VenueId::Aster, 0.03)];
        let cross = cross_venue_rows(&rows, 1);
        assert_eq!(cross.len(), 1);
        assert!((cross[0].spread - 0.02).abs() < 1e-9);
        assert_eq!(cross[0].venue_count, 2);
    }

    fn sample_row(venue: VenueId, ma_rate_1h: f64) -> MovingAverageRow {
        MovingAverageRow {
            normalized_symbol: "BTC".into(),
            venue,
            window: Window::H24,
            ma_rate_1h,
            ma_apr: ma_rate_1h * HOURS_PER_YEAR,
            sample_count: 5,
            stddev: 0.001,
            min_rate_1h: ma_rate_1h - 0.001,
            max_rate_1h: ma_rate_1h + 0.001,
            calculated_at: 1,
            window_start: 0,
            window_end: 1,
        }
    }
}
