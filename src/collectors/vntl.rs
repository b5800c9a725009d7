//! Vntl: `GET /v2/perp/markets` returns a bare array. 8-hour funding
//! interval.

use crate::collectors::PollingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

const MARKETS_URL: &str = "https://api.vntl.exchange/v2/perp/markets";

pub struct VntlCollector;

#[derive(Debug, Deserialize)]
struct MarketEntry {
    symbol: String,
    mark_price: f64,
    index_price: f64,
    open_interest: f64,
    last_price: f64,
    funding_rate: f64,
    volume_24h: f64,
    volume_24h_quote: f64,
    low_24h: f64,
    high_24h: f64,
    change_24h: f64,
}

#[async_trait]
impl PollingCollector for VntlCollector {
    fn venue(&self) -> VenueId {
        VenueId::Vntl
    }

    async fn poll_once(&self, client: &reqwest::Client, now_ms: i64) -> Result<Vec<SnapshotInput>> {
        let markets: Vec<MarketEntry> = client
            .get(MARKETS_URL)
            .send()
            .await
            .context("vntl markets request failed")?
            .json()
            .await
            .context("vntl markets parse failed")?;

        let rows = markets
            .into_iter()
            .map(|m| {
                SnapshotInput::new(
                    VenueId::Vntl,
                    m.symbol,
                    m.mark_price,
                    m.index_price,
                    m.open_interest,
                    m.last_price,
                    m.funding_rate,
                    8.0,
                    m.volume_24h,
                    m.volume_24h_quote,
                    m.low_24h,
                    m.high_24h,
                    m.change_24h,
                    now_ms,
                )
            })
            .collect();
        Ok(rows)
    }
}
