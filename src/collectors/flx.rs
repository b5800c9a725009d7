//! Flx: `GET /api/markets` returns `{result: [...]}` with OI already
//! denominated in USD. 8-hour funding interval.

use crate::collectors::PollingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

const MARKETS_URL: &str = "https://api.flx.exchange/api/markets";

pub struct FlxCollector;

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    result: Vec<MarketEntry>,
}

#[derive(Debug, Deserialize)]
struct MarketEntry {
    market: String,
    #[serde(rename = "markPrice")]
    mark_price: f64,
    #[serde(rename = "indexPrice")]
    index_price: f64,
    #[serde(rename = "openInterestUsd")]
    open_interest_usd: f64,
    #[serde(rename = "lastPrice")]
    last_price: f64,
    #[serde(rename = "fundingRate8h")]
    funding_rate_8h: f64,
    #[serde(rename = "volume24hBase")]
    volume_24h_base: f64,
    #[serde(rename = "volume24hQuote")]
    volume_24h_quote: f64,
    #[serde(rename = "low24h")]
    low_24h: f64,
    #[serde(rename = "high24h")]
    high_24h: f64,
    #[serde(rename = "change24hPercent")]
    change_24h_percent: f64,
}

#[async_trait]
impl PollingCollector for FlxCollector {
    fn venue(&self) -> VenueId {
        VenueId::Flx
    }

    async fn poll_once(&self, client: &reqwest::Client, now_ms: i64) -> Result<Vec<SnapshotInput>> {
        let body: MarketsResponse = client
            .get(MARKETS_URL)
            .send()
            .await
            .context("flx markets request failed")?
            .json()
            .await
            .context("flx markets parse failed")?;

        // OI arrives pre-multiplied by price; back out a base-asset
        // quantity so `SnapshotInput::new` can recompute the USD figure
        // the same way every other venue does, keeping one invariant
        // site instead of two code paths.
        let rows = body
            .result
            .into_iter()
            .map(|m| {
                let open_interest = if m.mark_price != 0.0 {
                    m.open_interest_usd / m.mark_price
                } else {
                    0.0
                };
                SnapshotInput::new(
                    VenueId::Flx,
                    m.market,
                    m.mark_price,
                    m.index_price,
                    open_interest,
                    m.last_price,
                    m.funding_rate_8h,
                    8.0,
                    m.volume_24h_base,
                    m.volume_24h_quote,
                    m.low_24h,
                    m.high_24h,
                    m.change_24h_percent,
                    now_ms,
                )
            })
            .collect();
        Ok(rows)
    }
}
