//! `primary` store: `market_stats` (raw 15s snapshots), `market_stats_1m`
//! (minute aggregates), `market_history` (hour aggregates),
//! `normalized_tokens` (live view), `tracker_status` (collector status).

use crate::domain::{
    CollectorStatus, CollectorStatusTag, HourAggregate, MinuteAggregate, NormalizedToken,
    Snapshot, SnapshotInput, VenueId,
};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS market_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    venue TEXT NOT NULL,
    original_symbol TEXT NOT NULL,
    mark_price REAL NOT NULL,
    index_price REAL NOT NULL,
    open_interest REAL NOT NULL,
    open_interest_usd REAL NOT NULL,
    last_price REAL NOT NULL,
    raw_funding_rate REAL NOT NULL,
    funding_interval_hours REAL NOT NULL,
    volume_24h_base REAL NOT NULL,
    volume_24h_quote REAL NOT NULL,
    low_24h REAL NOT NULL,
    high_24h REAL NOT NULL,
    change_24h_percent REAL NOT NULL,
    recorded_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_market_stats_venue_symbol_id
    ON market_stats(venue, original_symbol, id DESC);
CREATE INDEX IF NOT EXISTS idx_market_stats_recorded_at
    ON market_stats(recorded_at_ms);

CREATE TABLE IF NOT EXISTS market_stats_1m (
    venue TEXT NOT NULL,
    original_symbol TEXT NOT NULL,
    normalized_symbol TEXT NOT NULL,
    min_price REAL NOT NULL,
    avg_price REAL NOT NULL,
    max_price REAL NOT NULL,
    price_volatility_percent REAL NOT NULL,
    volume_24h_base_sum REAL NOT NULL,
    volume_24h_quote_sum REAL NOT NULL,
    avg_oi_usd REAL NOT NULL,
    max_oi_usd REAL NOT NULL,
    avg_funding_rate REAL NOT NULL,
    min_funding_rate REAL NOT NULL,
    max_funding_rate REAL NOT NULL,
    avg_annualized_funding_percent REAL NOT NULL,
    bucket_ts INTEGER NOT NULL,
    sample_count INTEGER NOT NULL,
    PRIMARY KEY (venue, original_symbol, bucket_ts)
);

CREATE INDEX IF NOT EXISTS idx_market_stats_1m_bucket ON market_stats_1m(bucket_ts);

CREATE TABLE IF NOT EXISTS market_history (
    venue TEXT NOT NULL,
    original_symbol TEXT NOT NULL,
    normalized_symbol TEXT NOT NULL,
    min_price REAL NOT NULL,
    avg_price REAL NOT NULL,
    max_price REAL NOT NULL,
    price_volatility_percent REAL NOT NULL,
    volume_24h_base_sum REAL NOT NULL,
    volume_24h_quote_sum REAL NOT NULL,
    avg_oi_usd REAL NOT NULL,
    max_oi_usd REAL NOT NULL,
    avg_funding_rate REAL NOT NULL,
    min_funding_rate REAL NOT NULL,
    max_funding_rate REAL NOT NULL,
    avg_annualized_funding_percent REAL NOT NULL,
    bucket_ts INTEGER NOT NULL,
    sample_count INTEGER NOT NULL,
    PRIMARY KEY (venue, original_symbol, bucket_ts)
);

CREATE INDEX IF NOT EXISTS idx_market_history_symbol
    ON market_history(normalized_symbol, bucket_ts);

CREATE TABLE IF NOT EXISTS normalized_tokens (
    normalized_symbol TEXT NOT NULL,
    venue TEXT NOT NULL,
    mark_price REAL NOT NULL,
    open_interest REAL NOT NULL,
    open_interest_usd REAL NOT NULL,
    raw_funding_rate REAL NOT NULL,
    funding_rate_1h_percent REAL NOT NULL,
    funding_rate_apr_percent REAL NOT NULL,
    atr_14 REAL,
    realized_vol_24h REAL,
    realized_vol_7d REAL,
    bollinger_width REAL,
    updated_at_ms INTEGER NOT NULL,
    PRIMARY KEY (normalized_symbol, venue)
);

CREATE INDEX IF NOT EXISTS idx_normalized_tokens_symbol ON normalized_tokens(normalized_symbol);

CREATE TABLE IF NOT EXISTS tracker_status (
    venue TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    last_message_at INTEGER,
    last_error_message TEXT,
    reconnect_count INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);
"#;

/// `primary` logical store: sole writer of the raw/aggregate market
/// tables, the live view, and collector status.
pub struct PrimaryStore {
    conn: Arc<Mutex<Connection>>,
}

impl super::SqlStore for PrimaryStore {
    const SCHEMA_SQL: &'static str = SCHEMA_SQL;
}

impl PrimaryStore {
    pub fn open(path: &str) -> Result<Self> {
        use super::SqlStore;
        let conn = Self::bootstrap(path).with_context(|| format!("opening primary store {path}"))?;
        info!(path, "primary store ready");
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

    /// Insert a batch of snapshots as a single atomic transaction
    /// (§4.4: `insertBatch` is atomic, no row is half-written).
    pub fn insert_snapshots_batch(&self, rows: &[SnapshotInput]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        let mut inserted = 0usize;
        for row in rows {
            let result = conn.execute(
                "INSERT INTO market_stats (
                    venue, original_symbol, mark_price, index_price, open_interest,
                    open_interest_usd, last_price, raw_funding_rate, funding_interval_hours,
                    volume_24h_base, volume_24h_quote, low_24h, high_24h,
                    change_24h_percent, recorded_at_ms
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
                params![
                    row.venue.as_str(),
                    row.original_symbol,
                    row.mark_price,
                    row.index_price,
                    row.open_interest,
                    row.open_interest_usd,
                    row.last_price,
                    row.raw_funding_rate,
                    row.funding_interval_hours,
                    row.volume_24h_base,
                    row.volume_24h_quote,
                    row.low_24h,
                    row.high_24h,
                    row.change_24h_percent,
                    row.recorded_at_ms,
                ],
            );
            match result {
                Ok(_) => inserted += 1,
                Err(e) => {
                    conn.execute("ROLLBACK", [])?;
                    return Err(e).context("batch snapshot insert failed, rolled back");
                }
            }
        }
        conn.execute("COMMIT", [])?;
        Ok(inserted)
    }

    /// Highest-id row per (venue, original_symbol), optionally filtered
    /// to one symbol.
    pub fn latest_per_symbol(
        &self,
        venue: VenueId,
        symbol_filter: Option<&str>,
    ) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock();
        let sql = "SELECT m.* FROM market_stats m
             JOIN (
                 SELECT original_symbol, MAX(id) AS max_id
                 FROM market_stats
                 WHERE venue = ?1 AND (?2 IS NULL OR original_symbol = ?2)
                 GROUP BY original_symbol
             ) latest ON m.original_symbol = latest.original_symbol AND m.id = latest.max_id
             WHERE m.venue = ?1";
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params![venue.as_str(), symbol_filter], row_to_snapshot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn range_scan(
        &self,
        venue: VenueId,
        symbol: Option<&str>,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM market_stats
             WHERE venue = ?1
               AND (?2 IS NULL OR original_symbol = ?2)
               AND (?3 IS NULL OR recorded_at_ms >= ?3)
               AND (?4 IS NULL OR recorded_at_ms <= ?4)
             ORDER BY recorded_at_ms DESC
             LIMIT ?5",
        )?;
        let rows = stmt
            .query_map(
                params![venue.as_str(), symbol, from_ms, to_ms, limit as i64],
                row_to_snapshot,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_older_than(&self, cutoff_ms: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM market_stats WHERE recorded_at_ms < ?1",
            params![cutoff_ms],
        )?;
        Ok(changed)
    }

    /// Distinct hour-bucket starts (ms) with raw rows older than
    /// `cutoff_ms`, oldest first, capped to `limit` (Stage A batches by
    /// at most 50 hours per run, §4.5).
    pub fn raw_hour_buckets_older_than(&self, cutoff_ms: i64, limit: usize) -> Result<Vec<i64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT (recorded_at_ms / 1000 / 3600) * 3600 AS hour_bucket
             FROM market_stats
             WHERE recorded_at_ms < ?1
             ORDER BY hour_bucket ASC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![cutoff_ms, limit as i64], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Raw snapshots whose minute bucket falls within `[hour_start_s,
    /// hour_start_s + 3600)` and are older than `cutoff_ms` (§4.5: only
    /// snapshots older than 5 minutes are aggregated).
    pub fn snapshots_in_hour(&self, hour_start_s: i64, cutoff_ms: i64) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock();
        let from_ms = hour_start_s * 1000;
        let to_ms = (hour_start_s + 3600) * 1000;
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM market_stats
             WHERE recorded_at_ms >= ?1 AND recorded_at_ms < ?2 AND recorded_at_ms < ?3",
        )?;
        let rows = stmt
            .query_map(params![from_ms, to_ms, cutoff_ms], row_to_snapshot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Deletes only the rows `snapshots_in_hour` aggregated — i.e. the
    /// same `cutoff_ms` bound — so rows newer than 5 minutes old survive
    /// to be picked up by a later pass.
    pub fn delete_snapshots_in_hour(&self, hour_start_s: i64, cutoff_ms: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let from_ms = hour_start_s * 1000;
        let to_ms = (hour_start_s + 3600) * 1000;
        let changed = conn.execute(
            "DELETE FROM market_stats
             WHERE recorded_at_ms >= ?1 AND recorded_at_ms < ?2 AND recorded_at_ms < ?3",
            params![from_ms, to_ms, cutoff_ms],
        )?;
        Ok(changed)
    }

    pub fn upsert_minute_aggregates(&self, rows: &[MinuteAggregate]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        for row in rows {
            conn.execute(
                "INSERT OR REPLACE INTO market_stats_1m (
                    venue, original_symbol, normalized_symbol, min_price, avg_price, max_price,
                    price_volatility_percent, volume_24h_base_sum, volume_24h_quote_sum,
                    avg_oi_usd, max_oi_usd, avg_funding_rate, min_funding_rate, max_funding_rate,
                    avg_annualized_funding_percent, bucket_ts, sample_count
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
                params![
                    row.venue.as_str(),
                    row.original_symbol,
                    row.normalized_symbol,
                    row.min_price,
                    row.avg_price,
                    row.max_price,
                    row.price_volatility_percent,
                    row.volume_24h_base_sum,
                    row.volume_24h_quote_sum,
                    row.avg_oi_usd,
                    row.max_oi_usd,
                    row.avg_funding_rate,
                    row.min_funding_rate,
                    row.max_funding_rate,
                    row.avg_annualized_funding_percent,
                    row.bucket_ts,
                    row.sample_count,
                ],
            )?;
        }
        conn.execute("COMMIT", [])?;
        Ok(rows.len())
    }

    pub fn minute_aggregates_older_than(&self, cutoff_ts: i64) -> Result<Vec<MinuteAggregate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM market_stats_1m WHERE bucket_ts < ?1 ORDER BY bucket_ts ASC",
        )?;
        let rows = stmt
            .query_map(params![cutoff_ts], row_to_minute)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_minute_aggregates(
        &self,
        keys: &[(VenueId, String, i64)],
    ) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        let mut deleted = 0usize;
        for (venue, symbol, bucket_ts) in keys {
            deleted += conn.execute(
                "DELETE FROM market_stats_1m WHERE venue = ?1 AND original_symbol = ?2 AND bucket_ts = ?3",
                params![venue.as_str(), symbol, bucket_ts],
            )?;
        }
        conn.execute("COMMIT", [])?;
        Ok(deleted)
    }

    pub fn upsert_hour_aggregates(&self, rows: &[HourAggregate]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        for row in rows {
            conn.execute(
                "INSERT OR REPLACE INTO market_history (
                    venue, original_symbol, normalized_symbol, min_price, avg_price, max_price,
                    price_volatility_percent, volume_24h_base_sum, volume_24h_quote_sum,
                    avg_oi_usd, max_oi_usd, avg_funding_rate, min_funding_rate, max_funding_rate,
                    avg_annualized_funding_percent, bucket_ts, sample_count
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
                params![
                    row.venue.as_str(),
                    row.original_symbol,
                    row.normalized_symbol,
                    row.min_price,
                    row.avg_price,
                    row.max_price,
                    row.price_volatility_percent,
                    row.volume_24h_base_sum,
                    row.volume_24h_quote_sum,
                    row.avg_oi_usd,
                    row.max_oi_usd,
                    row.avg_funding_rate,
                    row.min_funding_rate,
                    row.max_funding_rate,
                    row.avg_annualized_funding_percent,
                    row.bucket_ts,
                    row.sample_count,
                ],
            )?;
        }
        conn.execute("COMMIT", [])?;
        Ok(rows.len())
    }

    pub fn hour_aggregates_range(
        &self,
        normalized_symbol: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<HourAggregate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM market_history
             WHERE normalized_symbol = ?1 AND bucket_ts >= ?2 AND bucket_ts <= ?3
             ORDER BY bucket_ts ASC",
        )?;
        let rows = stmt
            .query_map(params![normalized_symbol, from_ts, to_ts], row_to_hour)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Hour buckets for one venue newer than `since_ts`, oldest first,
    /// capped to `limit` — the unified sync's per-venue read (§4.6).
    pub fn hour_aggregates_since(
        &self,
        venue: VenueId,
        since_ts: i64,
        limit: usize,
    ) -> Result<Vec<HourAggregate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM market_history
             WHERE venue = ?1 AND bucket_ts > ?2
             ORDER BY bucket_ts ASC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![venue.as_str(), since_ts, limit as i64], row_to_hour)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Raw snapshots in `[from_ms, to_ms]` across every venue — used by
    /// `normalized_data`'s raw-interval dispatch, which reads by
    /// normalized symbol rather than the (venue, symbol) key this table
    /// is otherwise indexed on.
    pub fn raw_snapshots_in_range(&self, from_ms: i64, to_ms: i64, limit: usize) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM market_stats
             WHERE recorded_at_ms >= ?1 AND recorded_at_ms <= ?2
             ORDER BY recorded_at_ms DESC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![from_ms, to_ms, limit as i64], row_to_snapshot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn minute_aggregates_range(
        &self,
        normalized_symbol: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<MinuteAggregate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM market_stats_1m
             WHERE normalized_symbol = ?1 AND bucket_ts >= ?2 AND bucket_ts <= ?3
             ORDER BY bucket_ts ASC",
        )?;
        let rows = stmt
            .query_map(params![normalized_symbol, from_ts, to_ts], row_to_minute)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Snapshots for every (venue, original_symbol) with a raw row in
    /// the last `lookback_ms` milliseconds — Stage C's refresh set.
    pub fn snapshots_since(&self, since_ms: i64) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT * FROM market_stats WHERE recorded_at_ms >= ?1")?;
        let rows = stmt
            .query_map(params![since_ms], row_to_snapshot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn upsert_normalized_tokens(&self, rows: &[NormalizedToken]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;
        for row in rows {
            conn.execute(
                "INSERT OR REPLACE INTO normalized_tokens (
                    normalized_symbol, venue, mark_price, open_interest, open_interest_usd,
                    raw_funding_rate, funding_rate_1h_percent, funding_rate_apr_percent,
                    atr_14, realized_vol_24h, realized_vol_7d, bollinger_width, updated_at_ms
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
                params![
                    row.normalized_symbol,
                    row.venue.as_str(),
                    row.mark_price,
                    row.open_interest,
                    row.open_interest_usd,
                    row.raw_funding_rate,
                    row.funding_rate_1h_percent,
                    row.funding_rate_apr_percent,
                    row.atr_14,
                    row.realized_vol_24h,
                    row.realized_vol_7d,
                    row.bollinger_width,
                    row.updated_at_ms,
                ],
            )?;
        }
        conn.execute("COMMIT", [])?;
        Ok(rows.len())
    }

    pub fn normalized_tokens_for_symbol(
        &self,
        normalized_symbol: &str,
    ) -> Result<Vec<NormalizedToken>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM normalized_tokens WHERE normalized_symbol = ?1")?;
        let rows = stmt
            .query_map(params![normalized_symbol], row_to_normalized_token)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_normalized_tokens(&self, limit: usize) -> Result<Vec<NormalizedToken>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT * FROM normalized_tokens ORDER BY normalized_symbol ASC, venue ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_normalized_token)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn upsert_collector_status(&self, status: &CollectorStatus) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO tracker_status (venue, status, last_message_at, last_error_message, reconnect_count, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(venue) DO UPDATE SET
                status = excluded.status,
                last_message_at = COALESCE(excluded.last_message_at, tracker_status.last_message_at),
                last_error_message = excluded.last_error_message,
                reconnect_count = excluded.reconnect_count,
                updated_at = excluded.updated_at",
            params![
                status.venue.as_str(),
                status.status.as_str(),
                status.last_message_at,
                status.last_error_message,
                status.reconnect_count,
                status.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn collector_status(&self, venue: VenueId) -> Result<Option<CollectorStatus>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT * FROM tracker_status WHERE venue = ?1")?;
        let mut rows = stmt.query_map(params![venue.as_str()], row_to_status)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn all_collector_statuses(&self) -> Result<Vec<CollectorStatus>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT * FROM tracker_status ORDER BY venue ASC")?;
        let rows = stmt
            .query_map([], row_to_status)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn parse_venue(s: String) -> rusqlite::Result<VenueId> {
    VenueId::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
    })
}

fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<Snapshot> {
    Ok(Snapshot {
        id: row.get("id")?,
        venue: parse_venue(row.get("venue")?)?,
        original_symbol: row.get("original_symbol")?,
        mark_price: row.get("mark_price")?,
        index_price: row.get("index_price")?,
        open_interest: row.get("open_interest")?,
        open_interest_usd: row.get("open_interest_usd")?,
        last_price: row.get("last_price")?,
        raw_funding_rate: row.get("raw_funding_rate")?,
        funding_interval_hours: row.get("funding_interval_hours")?,
        volume_24h_base: row.get("volume_24h_base")?,
        volume_24h_quote: row.get("volume_24h_quote")?,
        low_24h: row.get("low_24h")?,
        high_24h: row.get("high_24h")?,
        change_24h_percent: row.get("change_24h_percent")?,
        recorded_at_ms: row.get("recorded_at_ms")?,
    })
}

fn row_to_minute(row: &rusqlite::Row) -> rusqlite::Result<MinuteAggregate> {
    Ok(MinuteAggregate {
        venue: parse_venue(row.get("venue")?)?,
        original_symbol: row.get("original_symbol")?,
        normalized_symbol: row.get("normalized_symbol")?,
        min_price: row.get("min_price")?,
        avg_price: row.get("avg_price")?,
        max_price: row.get("max_price")?,
        price_volatility_percent: row.get("price_volatility_percent")?,
        volume_24h_base_sum: row.get("volume_24h_base_sum")?,
        volume_24h_quote_sum: row.get("volume_24h_quote_sum")?,
        avg_oi_usd: row.get("avg_oi_usd")?,
        max_oi_usd: row.get("max_oi_usd")?,
        avg_funding_rate: row.get("avg_funding_rate")?,
        min_funding_rate: row.get("min_funding_rate")?,
        max_funding_rate: row.get("max_funding_rate")?,
        avg_annualized_funding_percent: row.get("avg_annualized_funding_percent")?,
        bucket_ts: row.get("bucket_ts")?,
        sample_count: row.get("sample_count")?,
    })
}

fn row_to_hour(row: &rusqlite::Row) -> rusqlite::Result<HourAggregate> {
    Ok(HourAggregate {
        venue: parse_venue(row.get("venue")?)?,
        original_symbol: row.get("original_symbol")?,
        normalized_symbol: row.get("normalized_symbol")?,
        min_price: row.get("min_price")?,
        avg_price: row.get("avg_price")?,
        max_price: row.get("max_price")?,
        price_volatility_percent: row.get("price_volatility_percent")?,
        volume_24h_base_sum: row.get("volume_24h_base_sum")?,
        volume_24h_quote_sum: row.get("volume_24h_quote_sum")?,
        avg_oi_usd: row.get("avg_oi_usd")?,
        max_oi_usd: row.get("max_oi_usd")?,
        avg_funding_rate: row.get("avg_funding_rate")?,
        min_funding_rate: row.get("min_funding_rate")?,
        max_funding_rate: row.get("max_funding_rate")?,
        avg_annualized_funding_percent: row.get("avg_annualized_funding_percent")?,
        bucket_ts: row.get("bucket_ts")?,
        sample_count: row.get("sample_count")?,
    })
}

fn row_to_normalized_token(row: &rusqlite::Row) -> rusqlite::Result<NormalizedToken> {
    Ok(NormalizedToken {
        normalized_symbol: row.get("normalized_symbol")?,
        venue: parse_venue(row.get("venue")?)?,
        mark_price: row.get("mark_price")?,
        open_interest: row.get("open_interest")?,
        open_interest_usd: row.get("open_interest_usd")?,
        raw_funding_rate: row.get("raw_funding_rate")?,
        funding_rate_1h_percent: row.get("funding_rate_1h_percent")?,
        funding_rate_apr_percent: row.get("funding_rate_apr_percent")?,
        atr_14: row.get("atr_14")?,
        realized_vol_24h: row.get("realized_vol_24h")?,
        realized_vol_7d: row.get("realized_vol_7d")?,
        bollinger_width: row.get("bollinger_width")?,
        updated_at_ms: row.get("updated_at_ms")?,
    })
}

fn row_to_status(row: &rusqlite::Row) -> rusqlite::Result<CollectorStatus> {
    let status_str: String = row.get("status")?;
    let status = CollectorStatusTag::from_str(&status_str).unwrap_or_else(|e| {
        warn!(status = status_str, error = %e, "unknown collector status tag in tracker_status");
        CollectorStatusTag::Error
    });
    Ok(CollectorStatus {
        venue: parse_venue(row.get("venue")?)?,
        status,
        last_message_at: row.get("last_message_at")?,
        last_error_message: row.get("last_error_message")?,
        reconnect_count: row.get("reconnect_count")?,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input(venue: VenueId, symbol: &str, mark: f64, oi: f64, ts: i64) -> SnapshotInput {
        SnapshotInput::new(
            venue, symbol, mark, mark, oi, mark, 0.0001, 8.0, 100.0, 100.0, mark, mark, 0.0, ts,
        )
    }

    #[test]
    fn insert_batch_computes_open_interest_usd() {
        let store = PrimaryStore::open_in_memory().unwrap();
        let rows = vec![sample_input(
            VenueId::Hyperliquid,
            "BTC-USD-PERP",
            100_000.0,
            2.0,
            1_700_000_000_000,
        )];
        store.insert_snapshots_batch(&rows).unwrap();
        let latest = store
            .latest_per_symbol(VenueId::Hyperliquid, None)
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].open_interest_usd, 200_000.0);
    }

    #[test]
    fn latest_per_symbol_returns_highest_id_row() {
        let store = PrimaryStore::open_in_memory().unwrap();
        store
            .insert_snapshots_batch(&[sample_input(
                VenueId::Lighter,
                "ETH-USD-PERP",
                3000.0,
                1.0,
                1_700_000_000_000,
            )])
            .unwrap();
        store
            .insert_snapshots_batch(&[sample_input(
                VenueId::Lighter,
                "ETH-USD-PERP",
                3100.0,
                1.0,
                1_700_000_015_000,
            )])
            .unwrap();
        let latest = store.latest_per_symbol(VenueId::Lighter, None).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].mark_price, 3100.0);
    }

    #[test]
    fn delete_older_than_removes_only_stale_rows() {
        let store = PrimaryStore::open_in_memory().unwrap();
        store
            .insert_snapshots_batch(&[
                sample_input(VenueId::Aster, "BTCUSDT", 100.0, 1.0, 1_000),
                sample_input(VenueId::Aster, "BTCUSDT", 101.0, 1.0, 2_000_000),
            ])
            .unwrap();
        let deleted = store.delete_older_than(1_000_000).unwrap();
        assert_eq!(deleted, 1);
        let remaining = store
            .range_scan(VenueId::Aster, None, None, None, 10)
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].recorded_at_ms, 2_000_000);
    }
}
