//! Xyz: `GET /markets` returns a bare array with short field names.
//! 8-hour funding interval.

use crate::collectors::PollingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

const MARKETS_URL: &str = "https://api.xyz.exchange/markets";

pub struct XyzCollector;

#[derive(Debug, Deserialize)]
struct MarketEntry {
    ticker: String,
    mark: f64,
    index: f64,
    oi: f64,
    last: f64,
    funding: f64,
    vol_base: f64,
    vol_quote: f64,
    low: f64,
    high: f64,
    change_pct: f64,
}

#[async_trait]
impl PollingCollector for XyzCollector {
    fn venue(&self) -> VenueId {
        VenueId::Xyz
    }

    async fn poll_once(&self, client: &reqwest::Client, now_ms: i64) -> Result<Vec<SnapshotInput>> {
        let markets: Vec<MarketEntry> = client
            .get(MARKETS_URL)
            .send()
            .await
            .context("xyz markets request failed")?
            .json()
            .await
            .context("xyz markets parse failed")?;

        let rows = markets
            .into_iter()
            .map(|m| {
                SnapshotInput::new(
                    VenueId::Xyz,
                    m.ticker,
                    m.mark,
                    m.index,
                    m.oi,
                    m.last,
                    m.funding,
                    8.0,
                    m.vol_base,
                    m.vol_quote,
                    m.low,
                    m.high,
                    m.change_pct,
                    now_ms,
                )
            })
            .collect();
        Ok(rows)
    }
}
