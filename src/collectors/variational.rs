//! Variational: `GET /v1/funding` returns a bare array. 8-hour funding
//! interval, per §4.2's rule table; downstream consumers additionally
//! treat low-OI Variational rows as illiquid noise (§4.8).

use crate::collectors::PollingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

const FUNDING_URL: &str = "https://api.variational.io/v1/funding";

pub struct VariationalCollector;

#[derive(Debug, Deserialize)]
struct MarketEntry {
    symbol: String,
    #[serde(rename = "markPrice")]
    mark_price: f64,
    #[serde(rename = "indexPrice")]
    index_price: f64,
    #[serde(rename = "openInterestUsd")]
    open_interest_usd: f64,
    #[serde(rename = "lastPrice")]
    last_price: f64,
    rate: f64,
    #[serde(rename = "volume24hBase")]
    volume_24h_base: f64,
    #[serde(rename = "volume24hQuote")]
    volume_24h_quote: f64,
    #[serde(rename = "low24h")]
    low_24h: f64,
    #[serde(rename = "high24h")]
    high_24h: f64,
    #[serde(rename = "changePercent24h")]
    change_percent_24h: f64,
}

#[async_trait]
impl PollingCollector for VariationalCollector {
    fn venue(&self) -> VenueId {
        VenueId::Variational
    }

    async fn poll_once(&self, client: &reqwest::Client, now_ms: i64) -> Result<Vec<SnapshotInput>> {
        let markets: Vec<MarketEntry> = client
            .get(FUNDING_URL)
            .send()
            .await
            .context("variational funding request failed")?
            .json()
            .await
            .context("variational funding parse failed")?;

        let rows = markets
            .into_iter()
            .map(|m| {
                let open_interest = if m.mark_price != 0.0 {
                    m.open_interest_usd / m.mark_price
                } else {
                    0.0
                };
                SnapshotInput::new(
                    VenueId::Variational,
                    m.symbol,
                    m.mark_price,
                    m.index_price,
                    open_interest,
                    m.last_price,
                    m.rate,
                    8.0,
                    m.volume_24h_base,
                    m.volume_24h_quote,
                    m.low_24h,
                    m.high_24h,
                    m.change_percent_24h,
                    now_ms,
                )
            })
            .collect();
        Ok(rows)
    }
}
