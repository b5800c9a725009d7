//! Extended: `GET /api/v1/info/markets` returns `{status, data: [...]}`.
//! 1-hour funding interval, raw rate in decimal form.

use crate::collectors::PollingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

const MARKETS_URL: &str = "https://api.extended.exchange/api/v1/info/markets";

pub struct ExtendedCollector;

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    data: Vec<MarketEntry>,
}

#[derive(Debug, Deserialize)]
struct MarketEntry {
    name: String,
    #[serde(rename = "markPrice")]
    mark_price: f64,
    #[serde(rename = "indexPrice")]
    index_price: f64,
    #[serde(rename = "openInterest")]
    open_interest: f64,
    #[serde(rename = "lastPrice")]
    last_price: f64,
    #[serde(rename = "fundingRate")]
    funding_rate: f64,
    #[serde(rename = "volume24h")]
    volume_24h: f64,
    #[serde(rename = "low24h")]
    low_24h: f64,
    #[serde(rename = "high24h")]
    high_24h: f64,
    #[serde(rename = "priceChangePercent24h")]
    price_change_percent_24h: f64,
}

#[async_trait]
impl PollingCollector for ExtendedCollector {
    fn venue(&self) -> VenueId {
        VenueId::Extended
    }

    async fn poll_once(&self, client: &reqwest::Client, now_ms: i64) -> Result<Vec<SnapshotInput>> {
        let body: MarketsResponse = client
            .get(MARKETS_URL)
            .send()
            .await
            .context("extended markets request failed")?
            .json()
            .await
            .context("extended markets parse failed")?;

        let rows = body
            .data
            .into_iter()
            .map(|m| {
                SnapshotInput::new(
                    VenueId::Extended,
                    m.name,
                    m.mark_price,
                    m.index_price,
                    m.open_interest,
                    m.last_price,
                    m.funding_rate,
                    1.0,
                    m.volume_24h,
                    m.volume_24h * m.mark_price,
                    m.low_24h,
                    m.high_24h,
                    m.price_change_percent_24h,
                    now_ms,
                )
            })
            .collect();
        Ok(rows)
    }
}
