//! Persisted row types and closed enums shared across every component.
//!
//! Table layout (bit-exact names, kept stable across versions):
//! `market_stats`, `market_stats_1m`, `market_history`, `normalized_tokens`,
//! `tracker_status`, `unified_v3`, `funding_ma`, `funding_ma_cross`,
//! `funding_ma_cache`, `arbitrage_v3`.

mod venue;
mod window;

pub use venue::VenueId;
pub use window::Window;

use serde::{Deserialize, Serialize};

/// One row per (venue, original symbol) raw 15-second observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub venue: VenueId,
    pub original_symbol: String,
    pub mark_price: f64,
    pub index_price: f64,
    pub open_interest: f64,
    pub open_interest_usd: f64,
    pub last_price: f64,
    pub raw_funding_rate: f64,
    pub funding_interval_hours: f64,
    pub volume_24h_base: f64,
    pub volume_24h_quote: f64,
    pub low_24h: f64,
    pub high_24h: f64,
    pub change_24h_percent: f64,
    pub recorded_at_ms: i64,
}

/// A not-yet-persisted snapshot, as produced by a collector flushing
/// its buffer. `open_interest_usd` is always `mark_price * open_interest`
/// (§4.3); callers compute it once in `SnapshotInput::new` so every
/// writer observes the invariant, rather than each venue module having
/// to remember to apply it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotInput {
    pub venue: VenueId,
    pub original_symbol: String,
    pub mark_price: f64,
    pub index_price: f64,
    pub open_interest: f64,
    pub open_interest_usd: f64,
    pub last_price: f64,
    pub raw_funding_rate: f64,
    pub funding_interval_hours: f64,
    pub volume_24h_base: f64,
    pub volume_24h_quote: f64,
    pub low_24h: f64,
    pub high_24h: f64,
    pub change_24h_percent: f64,
    pub recorded_at_ms: i64,
}

impl SnapshotInput {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        venue: VenueId,
        original_symbol: impl Into<String>,
        mark_price: f64,
        index_price: f64,
        open_interest: f64,
        last_price: f64,
        raw_funding_rate: f64,
        funding_interval_hours: f64,
        volume_24h_base: f64,
        volume_24h_quote: f64,
        low_24h: f64,
        high_24h: f64,
        change_24h_percent: f64,
        recorded_at_ms: i64,
    ) -> Self {
        Self {
            venue,
            original_symbol: original_symbol.into(),
            mark_price,
            index_price,
            open_interest,
            open_interest_usd: mark_price * open_interest,
            last_price,
            raw_funding_rate,
            funding_interval_hours,
            volume_24h_base,
            volume_24h_quote,
            low_24h,
            high_24h,
            change_24h_percent,
            recorded_at_ms,
        }
    }
}

/// One row per (venue, original symbol, minute bucket).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinuteAggregate {
    pub venue: VenueId,
    pub original_symbol: String,
    pub normalized_symbol: String,
    pub min_price: f64,
    pub avg_price: f64,
    pub max_price: f64,
    pub price_volatility_percent: f64,
    pub volume_24h_base_sum: f64,
    pub volume_24h_quote_sum: f64,
    pub avg_oi_usd: f64,
    pub max_oi_usd: f64,
    pub avg_funding_rate: f64,
    pub min_funding_rate: f64,
    pub max_funding_rate: f64,
    pub avg_annualized_funding_percent: f64,
    pub bucket_ts: i64,
    pub sample_count: i64,
}

/// One row per (venue, original symbol, hour bucket). Retained indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourAggregate {
    pub venue: VenueId,
    pub original_symbol: String,
    pub normalized_symbol: String,
    pub min_price: f64,
    pub avg_price: f64,
    pub max_price: f64,
    pub price_volatility_percent: f64,
    pub volume_24h_base_sum: f64,
    pub volume_24h_quote_sum: f64,
    pub avg_oi_usd: f64,
    pub max_oi_usd: f64,
    pub avg_funding_rate: f64,
    pub min_funding_rate: f64,
    pub max_funding_rate: f64,
    pub avg_annualized_funding_percent: f64,
    pub bucket_ts: i64,
    pub sample_count: i64,
}

/// Latest-per-venue live view row, upserted every 5 minutes by Stage C.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedToken {
    pub normalized_symbol: String,
    pub venue: VenueId,
    pub mark_price: f64,
    pub open_interest: f64,
    pub open_interest_usd: f64,
    pub raw_funding_rate: f64,
    pub funding_rate_1h_percent: f64,
    pub funding_rate_apr_percent: f64,
    pub atr_14: Option<f64>,
    pub realized_vol_24h: Option<f64>,
    pub realized_vol_7d: Option<f64>,
    pub bollinger_width: Option<f64>,
    pub updated_at_ms: i64,
}

/// Source of a unified funding row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingSource {
    Live,
    Import,
    Migrated,
}

impl FundingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundingSource::Live => "live",
            FundingSource::Import => "import",
            FundingSource::Migrated => "migrated",
        }
    }
}

impl std::str::FromStr for FundingSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(FundingSource::Live),
            "import" => Ok(FundingSource::Import),
            "migrated" => Ok(FundingSource::Migrated),
            other => Err(format!("unknown funding source: {other}")),
        }
    }
}

/// Unique key: (normalized_symbol, venue, funding_time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedFundingRow {
    pub normalized_symbol: String,
    pub venue: VenueId,
    pub funding_time: i64,
    pub original_symbol: String,
    pub raw_rate: f64,
    pub raw_rate_percent: f64,
    pub interval_hours: f64,
    pub rate_1h_percent: f64,
    pub rate_apr: f64,
    pub source: FundingSource,
    pub synced_at: i64,
    pub open_interest: Option<f64>,
}

/// Per-(symbol, venue, window) moving-average row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingAverageRow {
    pub normalized_symbol: String,
    pub venue: VenueId,
    pub window: Window,
    pub ma_rate_1h: f64,
    pub ma_apr: f64,
    pub sample_count: i64,
    pub stddev: f64,
    pub min_rate_1h: f64,
    pub max_rate_1h: f64,
    pub calculated_at: i64,
    pub window_start: i64,
    pub window_end: i64,
}

/// Cross-venue aggregate moving-average row, keyed by (symbol, window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossVenueMaRow {
    pub normalized_symbol: String,
    pub window: Window,
    pub simple_avg_rate_1h: f64,
    pub weighted_avg_rate_1h: f64,
    pub min_venue_rate_1h: f64,
    pub max_venue_rate_1h: f64,
    pub spread: f64,
    pub venue_count: i64,
    pub calculated_at: i64,
}

/// One pairwise cross-venue funding-rate arbitrage opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageRow {
    pub normalized_symbol: String,
    pub long_venue: VenueId,
    pub short_venue: VenueId,
    pub window: Window,
    pub long_rate: f64,
    pub short_rate: f64,
    pub spread: f64,
    pub long_apr: f64,
    pub short_apr: f64,
    pub spread_apr: f64,
    pub stability_score: i64,
    pub is_stable: bool,
    pub calculated_at: i64,
}

/// Collector liveness status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorStatusTag {
    Running,
    Connected,
    Error,
    Stopped,
    Failed,
}

impl CollectorStatusTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorStatusTag::Running => "running",
            CollectorStatusTag::Connected => "connected",
            CollectorStatusTag::Error => "error",
            CollectorStatusTag::Stopped => "stopped",
            CollectorStatusTag::Failed => "failed",
        }
    }
}

impl std::str::FromStr for CollectorStatusTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(CollectorStatusTag::Running),
            "connected" => Ok(CollectorStatusTag::Connected),
            "error" => Ok(CollectorStatusTag::Error),
            "stopped" => Ok(CollectorStatusTag::Stopped),
            "failed" => Ok(CollectorStatusTag::Failed),
            other => Err(format!("unknown collector status: {other}")),
        }
    }
}

/// One row per venue, upserted by the collector and the health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorStatus {
    pub venue: VenueId,
    pub status: CollectorStatusTag,
    pub last_message_at: Option<i64>,
    pub last_error_message: Option<String>,
    pub reconnect_count: i64,
    pub updated_at: i64,
}
