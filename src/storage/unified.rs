//! `unified` store: `unified_v3` (cross-venue funding history),
//! `funding_ma` / `funding_ma_cross` (moving-average engine output),
//! `arbitrage_v3` (arbitrage engine output), and a last-writer-wins
//! `funding_ma_cache` for the `live` window's hot path.

use crate::domain::{
    ArbitrageRow, CrossVenueMaRow, FundingSource, MovingAverageRow, UnifiedFundingRow, VenueId,
    Window,
};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS unified_v3 (
    normalized_symbol TEXT NOT NULL,
    venue TEXT NOT NULL,
    funding_time INTEGER NOT NULL,
    original_symbol TEXT NOT NULL,
    raw_rate REAL NOT NULL,
    raw_rate_percent REAL NOT NULL,
    interval_hours REAL NOT NULL,
    rate_1h_percent REAL NOT NULL,
    rate_apr REAL NOT NULL,
    source TEXT NOT NULL,
    synced_at INTEGER NOT NULL,
    open_interest REAL,
    PRIMARY KEY (normalized_symbol, venue, funding_time)
);

CREATE INDEX IF NOT EXISTS idx_unified_v3_symbol_time
    ON unified_v3(normalized_symbol, funding_time DESC);
CREATE INDEX IF NOT EXISTS idx_unified_v3_venue_time ON unified_v3(venue, funding_time DESC);

CREATE TABLE IF NOT EXISTS funding_ma (
    normalized_symbol TEXT NOT NULL,
    venue TEXT NOT NULL,
    window TEXT NOT NULL,
    ma_rate_1h REAL NOT NULL,
    ma_apr REAL NOT NULL,
    sample_count INTEGER NOT NULL,
    stddev REAL NOT NULL,
    min_rate_1h REAL NOT NULL,
    max_rate_1h REAL NOT NULL,
    calculated_at INTEGER NOT NULL,
    window_start INTEGER NOT NULL,
    window_end INTEGER NOT NULL,
    PRIMARY KEY (normalized_symbol, venue, window)
);

CREATE TABLE IF NOT EXISTS funding_ma_cross (
    normalized_symbol TEXT NOT NULL,
    window TEXT NOT NULL,
    simple_avg_rate_1h REAL NOT NULL,
    weighted_avg_rate_1h REAL NOT NULL,
    min_venue_rate_1h REAL NOT NULL,
    max_venue_rate_1h REAL NOT NULL,
    spread REAL NOT NULL,
    venue_count INTEGER NOT NULL,
    calculated_at INTEGER NOT NULL,
    PRIMARY KEY (normalized_symbol, window)
);

CREATE TABLE IF NOT EXISTS funding_ma_cache (
    normalized_symbol TEXT NOT NULL,
    venue TEXT NOT NULL,
    rate_1h_percent REAL NOT NULL,
    rate_apr REAL NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (normalized_symbol, venue)
);

CREATE TABLE IF NOT EXISTS arbitrage_v3 (
    normalized_symbol TEXT NOT NULL,
    long_venue TEXT NOT NULL,
    short_venue TEXT NOT NULL,
    window TEXT NOT NULL,
    long_rate REAL NOT NULL,
    short_rate REAL NOT NULL,
    spread REAL NOT NULL,
    long_apr REAL NOT NULL,
    short_apr REAL NOT NULL,
    spread_apr REAL NOT NULL,
    stability_score INTEGER NOT NULL,
    is_stable INTEGER NOT NULL,
    calculated_at INTEGER NOT NULL,
    PRIMARY KEY (normalized_symbol, long_venue, short_venue, window)
);

CREATE INDEX IF NOT EXISTS idx_arbitrage_v3_spread ON arbitrage_v3(spread_apr DESC);
"#;

/// `unified` logical store: sole writer of the cross-venue funding
/// history, moving-average tables, and the arbitrage table.
pub struct UnifiedStore {
    conn: Arc<Mutex<Connection>>,
}

impl super::SqlStore for UnifiedStore {
    const SCHEMA_SQL: &'static str = SCHEMA_SQL;
}

impl UnifiedStore {
    pub fn open(path: &str) -> Result<Self> {
        use super::SqlStore;
        let conn = Self::bootstrap(path).with_context(|| format!("opening unified store {path}"))?;
        info!(path, "unified store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// High-water mark (max `funding_time`) already synced for `venue`,
    /// or `None` if the venue has never been synced (§4.6: caller seeds
    /// "now − 7 days" in that case).
    pub fn last_synced_funding_time(&self, venue: VenueId) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let result: Option<i64> = conn.query_row(
            "SELECT MAX(funding_time) FROM unified_v3 WHERE venue = ?1",
            params![venue.as_str()],
            |row| row.get(0),
        )?;
        Ok(result)
    }

    /// Upsert up to 500 rows (§4.6 batch cap is enforced by the caller,
    /// this just executes whatever it's handed as one transaction).
    pub fn upsert_funding_rows(&self, rows: &[UnifiedFundingRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        for row in rows {
            conn.execute(
                "INSERT OR REPLACE INTO unified_v3 (
                    normalized_symbol, venue, funding_time, original_symbol, raw_rate,
                    raw_rate_percent, interval_hours, rate_1h_percent, rate_apr, source,
                    synced_at, open_interest
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
                params![
                    row.normalized_symbol,
                    row.venue.as_str(),
                    row.funding_time,
                    row.original_symbol,
                    row.raw_rate,
                    row.raw_rate_percent,
                    row.interval_hours,
                    row.rate_1h_percent,
                    row.rate_apr,
                    row.source.as_str(),
                    row.synced_at,
                    row.open_interest,
                ],
            )?;
        }
        conn.execute("COMMIT", [])?;
        Ok(rows.len())
    }

    pub fn funding_rows(
        &self,
        normalized_symbol: &str,
        venues: Option<&[VenueId]>,
        from_s: Option<i64>,
        to_s: Option<i64>,
        limit: usize,
    ) -> Result<Vec<UnifiedFundingRow>> {
        let conn = self.conn.lock();
        let venue_filter: Option<Vec<String>> =
            venues.map(|vs| vs.iter().map(|v| v.as_str().to_string()).collect());
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM unified_v3
             WHERE normalized_symbol = ?1
               AND (?2 IS NULL OR funding_time >= ?2)
               AND (?3 IS NULL OR funding_time <= ?3)
             ORDER BY funding_time DESC
             LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(
                params![normalized_symbol, from_s, to_s, limit as i64],
                row_to_funding,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        match venue_filter {
            Some(vs) => Ok(rows
                .into_iter()
                .filter(|r| vs.contains(&r.venue.as_str().to_string()))
                .collect()),
            None => Ok(rows),
        }
    }

    /// Earliest `funding_time` on record for (symbol, venue) — used by
    /// the MA engine's daily-window eligibility gate (§4.7).
    pub fn earliest_funding_time(
        &self,
        normalized_symbol: &str,
        venue: VenueId,
    ) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        let result: Option<i64> = conn.query_row(
            "SELECT MIN(funding_time) FROM unified_v3 WHERE normalized_symbol = ?1 AND venue = ?2",
            params![normalized_symbol, venue.as_str()],
            |row| row.get(0),
        )?;
        Ok(result)
    }

    /// All distinct (normalized_symbol, venue) pairs with any history —
    /// the MA engine's outer loop.
    pub fn distinct_symbol_venues(&self) -> Result<Vec<(String, VenueId)>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT DISTINCT normalized_symbol, venue FROM unified_v3")?;
        let rows = stmt
            .query_map([], |row| {
                let symbol: String = row.get(0)?;
                let venue: String = row.get(1)?;
                Ok((symbol, venue))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(symbol, venue)| {
                VenueId::from_str(&venue)
                    .map(|v| (symbol, v))
                    .map_err(anyhow::Error::msg)
            })
            .collect()
    }

    /// `rate_1h_percent` samples in `[from_s, to_s]` for one (symbol,
    /// venue), ascending by time — the MA engine's sample window.
    pub fn rate_samples(
        &self,
        normalized_symbol: &str,
        venue: VenueId,
        from_s: i64,
        to_s: i64,
    ) -> Result<Vec<f64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT rate_1h_percent FROM unified_v3
             WHERE normalized_symbol = ?1 AND venue = ?2 AND funding_time >= ?3 AND funding_time <= ?4
             ORDER BY funding_time ASC",
        )?;
        let rows = stmt
            .query_map(
                params![normalized_symbol, venue.as_str(), from_s, to_s],
                |row| row.get::<_, f64>(0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent row per (symbol, venue) within the last `lookback_s`
    /// seconds — feeds the synthetic `live` window (§4.8).
    pub fn latest_rows_since(&self, since_s: i64) -> Result<Vec<UnifiedFundingRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT u.* FROM unified_v3 u
             JOIN (
                 SELECT normalized_symbol, venue, MAX(funding_time) AS max_ft
                 FROM unified_v3
                 WHERE funding_time >= ?1
                 GROUP BY normalized_symbol, venue
             ) latest ON u.normalized_symbol = latest.normalized_symbol
                 AND u.venue = latest.venue AND u.funding_time = latest.max_ft",
        )?;
        let rows = stmt
            .query_map(params![since_s], row_to_funding)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent known open interest for (symbol, venue), regardless
    /// of how stale — the arbitrage engine's low-OI filter (§4.8) needs
    /// the latest value even outside the `live` window's 15-minute
    /// lookback.
    pub fn latest_open_interest(&self, normalized_symbol: &str, venue: VenueId) -> Result<Option<f64>> {
        let conn = self.conn.lock();
        let result: Option<f64> = conn
            .query_row(
                "SELECT open_interest FROM unified_v3
                 WHERE normalized_symbol = ?1 AND venue = ?2 AND open_interest IS NOT NULL
                 ORDER BY funding_time DESC LIMIT 1",
                params![normalized_symbol, venue.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    pub fn upsert_ma_rows(&self, rows: &[MovingAverageRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        for row in rows {
            conn.execute(
                "INSERT OR REPLACE INTO funding_ma (
                    normalized_symbol, venue, window, ma_rate_1h, ma_apr, sample_count, stddev,
                    min_rate_1h, max_rate_1h, calculated_at, window_start, window_end
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
                params![
                    row.normalized_symbol,
                    row.venue.as_str(),
                    row.window.as_str(),
                    row.ma_rate_1h,
                    row.ma_apr,
                    row.sample_count,
                    row.stddev,
                    row.min_rate_1h,
                    row.max_rate_1h,
                    row.calculated_at,
                    row.window_start,
                    row.window_end,
                ],
            )?;
        }
        conn.execute("COMMIT", [])?;
        Ok(rows.len())
    }

    pub fn upsert_cross_venue_ma_rows(&self, rows: &[CrossVenueMaRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        for row in rows {
            conn.execute(
                "INSERT OR REPLACE INTO funding_ma_cross (
                    normalized_symbol, window, simple_avg_rate_1h, weighted_avg_rate_1h,
                    min_venue_rate_1h, max_venue_rate_1h, spread, venue_count, calculated_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
                params![
                    row.normalized_symbol,
                    row.window.as_str(),
                    row.simple_avg_rate_1h,
                    row.weighted_avg_rate_1h,
                    row.min_venue_rate_1h,
                    row.max_venue_rate_1h,
                    row.spread,
                    row.venue_count,
                    row.calculated_at,
                ],
            )?;
        }
        conn.execute("COMMIT", [])?;
        Ok(rows.len())
    }

    pub fn ma_rows_for_symbol(
        &self,
        normalized_symbol: &str,
        window: Window,
    ) -> Result<Vec<MovingAverageRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM funding_ma WHERE normalized_symbol = ?1 AND window = ?2",
        )?;
        let rows = stmt
            .query_map(params![normalized_symbol, window.as_str()], row_to_ma)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn ma_row(
        &self,
        normalized_symbol: &str,
        venue: VenueId,
        window: Window,
    ) -> Result<Option<MovingAverageRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM funding_ma WHERE normalized_symbol = ?1 AND venue = ?2 AND window = ?3",
        )?;
        let mut rows = stmt.query_map(
            params![normalized_symbol, venue.as_str(), window.as_str()],
            row_to_ma,
        )?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn cross_venue_ma(
        &self,
        normalized_symbol: &str,
        window: Window,
    ) -> Result<Option<CrossVenueMaRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM funding_ma_cross WHERE normalized_symbol = ?1 AND window = ?2",
        )?;
        let mut rows =
            stmt.query_map(params![normalized_symbol, window.as_str()], row_to_cross)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn clear_arbitrage(&self) -> Result<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM arbitrage_v3", [])?)
    }

    pub fn insert_arbitrage_rows(&self, rows: &[ArbitrageRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        for row in rows {
            conn.execute(
                "INSERT OR REPLACE INTO arbitrage_v3 (
                    normalized_symbol, long_venue, short_venue, window, long_rate, short_rate,
                    spread, long_apr, short_apr, spread_apr, stability_score, is_stable,
                    calculated_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
                params![
                    row.normalized_symbol,
                    row.long_venue.as_str(),
                    row.short_venue.as_str(),
                    row.window.as_str(),
                    row.long_rate,
                    row.short_rate,
                    row.spread,
                    row.long_apr,
                    row.short_apr,
                    row.spread_apr,
                    row.stability_score,
                    row.is_stable as i64,
                    row.calculated_at,
                ],
            )?;
        }
        conn.execute("COMMIT", [])?;
        Ok(rows.len())
    }

    pub fn arbitrage_rows(
        &self,
        symbol: Option<&str>,
        window: Option<Window>,
        min_spread_apr: Option<f64>,
        stable_only: bool,
        limit: usize,
    ) -> Result<Vec<ArbitrageRow>> {
        let conn = self.conn.lock();
        let window_str = window.map(|w| w.as_str().to_string());
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM arbitrage_v3
             WHERE (?1 IS NULL OR normalized_symbol = ?1)
               AND (?2 IS NULL OR window = ?2)
               AND (?3 IS NULL OR spread_apr >= ?3)
               AND (?4 = 0 OR is_stable = 1)
             ORDER BY spread_apr DESC
             LIMIT ?5",
        )?;
        let rows = stmt
            .query_map(
                params![symbol, window_str, min_spread_apr, stable_only as i64, limit as i64],
                row_to_arbitrage,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn parse_venue(s: String) -> rusqlite::Result<VenueId> {
    VenueId::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
    })
}

fn parse_window(s: String) -> rusqlite::Result<Window> {
    Window::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
    })
}

fn parse_source(s: String) -> rusqlite::Result<FundingSource> {
    FundingSource::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
    })
}

fn row_to_funding(row: &rusqlite::Row) -> rusqlite::Result<UnifiedFundingRow> {
    Ok(UnifiedFundingRow {
        normalized_symbol: row.get("normalized_symbol")?,
        venue: parse_venue(row.get("venue")?)?,
        funding_time: row.get("funding_time")?,
        original_symbol: row.get("original_symbol")?,
        raw_rate: row.get("raw_rate")?,
        raw_rate_percent: row.get("raw_rate_percent")?,
        interval_hours: row.get("interval_hours")?,
        rate_1h_percent: row.get("rate_1h_percent")?,
        rate_apr: row.get("rate_apr")?,
        source: parse_source(row.get("source")?)?,
        synced_at: row.get("synced_at")?,
        open_interest: row.get("open_interest")?,
    })
}

fn row_to_ma(row: &rusqlite::Row) -> rusqlite::Result<MovingAverageRow> {
    Ok(MovingAverageRow {
        normalized_symbol: row.get("normalized_symbol")?,
        venue: parse_venue(row.get("venue")?)?,
        window: parse_window(row.get("window")?)?,
        ma_rate_1h: row.get("ma_rate_1h")?,
        ma_apr: row.get("ma_apr")?,
        sample_count: row.get("sample_count")?,
        stddev: row.get("stddev")?,
        min_rate_1h: row.get("min_rate_1h")?,
        max_rate_1h: row.get("max_rate_1h")?,
        calculated_at: row.get("calculated_at")?,
        window_start: row.get("window_start")?,
        window_end: row.get("window_end")?,
    })
}

fn row_to_cross(row: &rusqlite::Row) -> rusqlite::Result<CrossVenueMaRow> {
    Ok(CrossVenueMaRow {
        normalized_symbol: row.get("normalized_symbol")?,
        window: parse_window(row.get("window")?)?,
        simple_avg_rate_1h: row.get("simple_avg_rate_1h")?,
        weighted_avg_rate_1h: row.get("weighted_avg_rate_1h")?,
        min_venue_rate_1h: row.get("min_venue_rate_1h")?,
        max_venue_rate_1h: row.get("max_venue_rate_1h")?,
        spread: row.get("spread")?,
        venue_count: row.get("venue_count")?,
        calculated_at: row.get("calculated_at")?,
    })
}

fn row_to_arbitrage(row: &rusqlite::Row) -> rusqlite::Result<ArbitrageRow> {
    Ok(ArbitrageRow {
        normalized_symbol: row.get("normalized_symbol")?,
        long_venue: parse_venue(row.get("long_venue")?)?,
        short_venue: parse_venue(row.get("short_venue")?)?,
        window: parse_window(row.get("window")?)?,
        long_rate: row.get("long_rate")?,
        short_rate: row.get("short_rate")?,
        spread: row.get("spread")?,
        long_apr: row.get("long_apr")?,
        short_apr: row.get("short_apr")?,
        spread_apr: row.get("spread_apr")?,
        stability_score: row.get("stability_score")?,
        is_stable: row.get::<_, i64>("is_stable")? != 0,
        calculated_at: row.get("calculated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(symbol: &str, venue: VenueId, ft: i64, rate_1h: f64) -> UnifiedFundingRow {
        UnifiedFundingRow {
            normalized_symbol: symbol.to_string(),
            venue,
            funding_time: ft,
            original_symbol: format!("{symbol}-PERP"),
            raw_rate: 0.0001,
            raw_rate_percent: 0.01,
            interval_hours: 8.0,
            rate_1h_percent: rate_1h,
            rate_apr: rate_1h * 24.0 * 365.0,
            source: FundingSource::Live,
            synced_at: ft,
            open_interest: Some(1_000_000.0),
        }
    }

    #[test]
    fn high_water_mark_tracks_max_funding_time_per_venue() {
        let store = UnifiedStore::open_in_memory().unwrap();
        assert_eq!(store.last_synced_funding_time(VenueId::Hyperliquid).unwrap(), None);
        store
            .upsert_funding_rows(&[
                sample_row("BTC", VenueId::Hyperliquid, 100, 0.001),
                sample_row("BTC", VenueId::Hyperliquid, 200, 0.002),
            ])
            .unwrap();
        assert_eq!(
            store.last_synced_funding_time(VenueId::Hyperliquid).unwrap(),
            Some(200)
        );
    }

    #[test]
    fn arbitrage_filter_respects_stable_only_and_min_spread() {
        let store = UnifiedStore::open_in_memory().unwrap();
        store
            .insert_arbitrage_rows(&[
                ArbitrageRow {
                    normalized_symbol: "BTC".into(),
                    long_venue: VenueId::Hyperliquid,
                    short_venue: VenueId::Aster,
                    window: Window::H24,
                    long_rate: 0.001,
                    short_rate: 0.003,
                    spread: 0.002,
                    long_apr: 1.0,
                    short_apr: 3.0,
                    spread_apr: 2.0,
                    stability_score: 5,
                    is_stable: true,
                    calculated_at: 1,
                },
                ArbitrageRow {
                    normalized_symbol: "BTC".into(),
                    long_venue: VenueId::Extended,
                    short_venue: VenueId::Lighter,
                    window: Window::H24,
                    long_rate: 0.001,
                    short_rate: 0.0011,
                    spread: 0.0001,
                    long_apr: 1.0,
                    short_apr: 1.1,
                    spread_apr: 0.1,
                    stability_score: 2,
                    is_stable: false,
                    calculated_at: 1,
                },
            ])
            .unwrap();
        let stable = store
            .arbitrage_rows(None, None, None, true, 100)
            .unwrap();
        assert_eq!(stable.len(), 1);
        assert!(stable[0].is_stable);
    }
}
