//! Arbitrage engine (§4.8). Runs after the moving-average engine:
//! clears `arbitrage_v3`, then for every window (the five MA windows
//! plus the synthetic `live` window) emits one row per pair of venues
//! that both quote a rate for the same symbol, long = lower-rate side,
//! short = higher-rate side. Grounded in the teacher's
//! `arbitrage/engine.rs` `scan_opportunities` shape: clear-then-rebuild,
//! with a small pure stability-scoring helper kept separately testable.

use crate::domain::{ArbitrageRow, VenueId, Window};
use crate::storage::UnifiedStore;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

const MAX_APR_PERCENT: f64 = 500.0;
const VARIATIONAL_MIN_OI_USD: f64 = 200_000.0;
const STABILITY_THRESHOLD: i64 = 4;
const LIVE_LOOKBACK_SECS: i64 = 15 * 60;

#[derive(Debug, Clone, Copy, Default)]
pub struct ArbitrageStats {
    pub rows_written: usize,
    pub filtered_apr: usize,
    pub filtered_low_oi: usize,
}

#[derive(Debug, Clone, Copy)]
struct RateEntry {
    venue: VenueId,
    rate_1h: f64,
    apr: f64,
}

pub async fn run(unified: &UnifiedStore, now_s: i64) -> Result<ArbitrageStats> {
    unified.clear_arbitrage()?;
    let mut stats = ArbitrageStats::default();

    let symbols = distinct_symbols(unified)?;

    // window -> symbol -> entries, built once so the stability score can
    // look across every window for the same ordered venue pair.
    let mut by_window: HashMap<Window, HashMap<String, Vec<RateEntry>>> = HashMap::new();
    for &window in Window::arbitrage_windows() {
        let mut by_symbol: HashMap<String, Vec<RateEntry>> = HashMap::new();
        if window == Window::Live {
            let rows = unified.latest_rows_since(now_s - LIVE_LOOKBACK_SECS)?;
            for row in rows {
                if row.rate_apr.abs() > MAX_APR_PERCENT {
                    stats.filtered_apr += 1;
                    continue;
                }
                if row.venue == VenueId::Variational
                    && row.open_interest.unwrap_or(0.0) < VARIATIONAL_MIN_OI_USD
                {
                    stats.filtered_low_oi += 1;
                    continue;
                }
                by_symbol.entry(row.normalized_symbol.clone()).or_default().push(RateEntry {
                    venue: row.venue,
                    rate_1h: row.rate_1h_percent,
                    apr: row.rate_apr,
                });
            }
        } else {
            for symbol in &symbols {
                for ma_row in unified.ma_rows_for_symbol(symbol, window)? {
                    if ma_row.ma_apr.abs() > MAX_APR_PERCENT {
                        stats.filtered_apr += 1;
                        continue;
                    }
                    if ma_row.venue == VenueId::Variational {
                        let oi = unified
                            .latest_open_interest(symbol, ma_row.venue)?
                            .unwrap_or(0.0);
                        if oi < VARIATIONAL_MIN_OI_USD {
                            stats.filtered_low_oi += 1;
                            continue;
                        }
                    }
                    by_symbol.entry(symbol.clone()).or_default().push(RateEntry {
                        venue: ma_row.venue,
                        rate_1h: ma_row.ma_rate_1h,
                        apr: ma_row.ma_apr,
                    });
                }
            }
        }
        by_window.insert(window, by_symbol);
    }

    // First pass: compute every (window, symbol, long, short) ordering.
    let mut orderings: Vec<(Window, String, VenueId, VenueId)> = Vec::new();
    for (&window, by_symbol) in &by_window {
        for (symbol, entries) in by_symbol {
            for (i, a) in entries.iter().enumerate() {
                for b in entries.iter().skip(i + 1) {
                    let (long, short) = if a.rate_1h <= b.rate_1h { (a, b) } else { (b, a) };
                    orderings.push((window, symbol.clone(), long.venue, short.venue));
                }
            }
        }
    }

    let mut rows = Vec::new();
    for (window, by_symbol) in &by_window {
        for (symbol, entries) in by_symbol {
            for (i, a) in entries.iter().enumerate() {
                for b in entries.iter().skip(i + 1) {
                    let (long, short) = if a.rate_1h <= b.rate_1h { (a, b) } else { (b, a) };
                    let stability_score =
                        compute_stability(&orderings, symbol, long.venue, short.venue);
                    rows.push(ArbitrageRow {
                        normalized_symbol: symbol.clone(),
                        long_venue: long.venue,
                        short_venue: short.venue,
                        window: *window,
                        long_rate: long.rate_1h,
                        short_rate: short.rate_1h,
                        spread: (short.rate_1h - long.rate_1h).abs(),
                        long_apr: long.apr,
                        short_apr: short.apr,
                        spread_apr: (short.apr - long.apr).abs(),
                        stability_score,
                        is_stable: stability_score >= STABILITY_THRESHOLD,
                        calculated_at: now_s,
                    });
                }
            }
        }
    }

    let written = unified.insert_arbitrage_rows(&rows)?;
    stats.rows_written = written;

    if stats.filtered_apr > 0 || stats.filtered_low_oi > 0 {
        warn!(
            filtered_apr = stats.filtered_apr,
            filtered_low_oi = stats.filtered_low_oi,
            "arbitrage engine dropped illiquid/extreme rows"
        );
    }
    info!(rows_written = written, "arbitrage engine complete");
    Ok(stats)
}

/// Number of distinct windows (of `orderings`) in which `symbol` shows
/// exactly this `long`/`short` ordering. Kept as a small pure helper
/// with its own unit tests, mirroring the teacher's
/// `calculate_confidence`-style scoring function.
fn compute_stability(
    orderings: &[(Window, String, VenueId, VenueId)],
    symbol: &str,
    long: VenueId,
    short: VenueId,
) -> i64 {
    let windows: HashSet<Window> = orderings
        .iter()
        .filter(|(_, s, l, sh)| s == symbol && *l == long && *sh == short)
        .map(|(w, ..)| *w)
        .collect();
    windows.len() as i64
}

fn distinct_symbols(unified: &UnifiedStore) -> Result<Vec<String>> {
    let pairs = unified.distinct_symbol_venues()?;
    let set: HashSet<String> = pairs.into_iter().map(|(symbol, _)| symbol).collect();
    Ok(set.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stability_counts_only_matching_ordering() {
        let orderings = vec![
            (Window::H24, "BTC".to_string(), VenueId::Hyperliquid, VenueId::Aster),
            (Window::D3, "BTC".to_string(), VenueId::Hyperliquid, VenueId::Aster),
            (Window::D7, "BTC".to_string(), VenueId::Aster, VenueId::Hyperliquid), // reversed
            (Window::D14, "ETH".to_string(), VenueId::Hyperliquid, VenueId::Aster), // different symbol
        ];
        let score = compute_stability(&orderings, "BTC", VenueId::Hyperliquid, VenueId::Aster);
        assert_eq!(score, 2);
    }

    #[test]
    fn is_stable_requires_at_least_four_windows() {
        assert!(STABILITY_THRESHOLD == 4);
    }

    #[tokio::test]
    async fn filters_apr_above_five_hundred_and_requires_two_venues() {
        let store = UnifiedStore::open_in_memory().unwrap();
        let now = 1_700_000_000i64;
        store
            .upsert_ma_rows(&[crate::domain::MovingAverageRow {
                normalized_symbol: "BTC".into(),
                venue: VenueId::Hyperliquid,
                window: Window::H24,
                ma_rate_1h: 0.01,
                ma_apr: 900.0, // above the 500 cap
                sample_count: 5,
                stddev: 0.001,
                min_rate_1h: 0.009,
                max_rate_1h: 0.011,
                calculated_at: now,
                window_start: now - 86_400,
                window_end: now,
            }])
            .unwrap();
        store
            .upsert_funding_rows(&[crate::domain::UnifiedFundingRow {
                normalized_symbol: "BTC".into(),
                venue: VenueId::Hyperliquid,
                funding_time: now - 100,
                original_symbol: "BTC-PERP".into(),
                raw_rate: 0.0001,
                raw_rate_percent: 0.01,
                interval_hours: 8.0,
                rate_1h_percent: 0.01,
                rate_apr: 87.6,
                source: crate::domain::FundingSource::Live,
                synced_at: now,
                open_interest: Some(1_000_000.0),
            }])
            .unwrap();

        let stats = run(&store, now).await.unwrap();
        assert_eq!(stats.rows_written, 0); // only one venue in every window: no pairs possible
        assert_eq!(stats.filtered_apr, 1);
    }
}
