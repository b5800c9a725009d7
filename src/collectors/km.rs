//! Km: `GET /markets/summary` returns `{data: [...]}`. 8-hour funding
//! interval.

use crate::collectors::PollingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

const SUMMARY_URL: &str = "https://api.km.exchange/markets/summary";

pub struct KmCollector;

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    data: Vec<MarketEntry>,
}

#[derive(Debug, Deserialize)]
struct MarketEntry {
    symbol: String,
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
    #[serde(rename = "baseVolume")]
    base_volume: f64,
    #[serde(rename = "quoteVolume")]
    quote_volume: f64,
    #[serde(rename = "low")]
    low_24h: f64,
    #[serde(rename = "high")]
    high_24h: f64,
    #[serde(rename = "changePercent")]
    change_percent: f64,
}

#[async_trait]
impl PollingCollector for KmCollector {
    fn venue(&self) -> VenueId {
        VenueId::Km
    }

    async fn poll_once(&self, client: &reqwest::Client, now_ms: i64) -> Result<Vec<SnapshotInput>> {
        let body: SummaryResponse = client
            .get(SUMMARY_URL)
            .send()
            .await
            .context("km summary request failed")?
            .json()
            .await
            .context("km summary parse failed")?;

        let rows = body
            .data
            .into_iter()
            .map(|m| {
                SnapshotInput::new(
                    VenueId::Km,
                    m.symbol,
                    m.mark_price,
                    m.index_price,
                    m.open_interest,
                    m.last_price,
                    m.funding_rate,
                    8.0,
                    m.base_volume,
                    m.quote_volume,
                    m.low_24h,
                    m.high_24h,
                    m.change_percent,
                    now_ms,
                )
            })
            .collect();
        Ok(rows)
    }
}
