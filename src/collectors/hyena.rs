//! Hyena: `GET /v1/markets` returns `{markets: [...]}` with
//! snake_case fields. 8-hour funding interval.

use crate::collectors::PollingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

const MARKETS_URL: &str = "https://api.hyena.exchange/v1/markets";

pub struct HyenaCollector;

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    markets: Vec<MarketEntry>,
}

#[derive(Debug, Deserialize)]
struct MarketEntry {
    symbol: String,
    mark_price: f64,
    index_price: f64,
    open_interest: f64,
    last_price: f64,
    funding_rate: f64,
    volume_24h_base: f64,
    volume_24h_quote: f64,
    low_24h: f64,
    high_24h: f64,
    change_24h_percent: f64,
}

#[async_trait]
impl PollingCollector for HyenaCollector {
    fn venue(&self) -> VenueId {
        VenueId::Hyena
    }

    async fn poll_once(&self, client: &reqwest::Client, now_ms: i64) -> Result<Vec<SnapshotInput>> {
        let body: MarketsResponse = client
            .get(MARKETS_URL)
            .send()
            .await
            .context("hyena markets request failed")?
            .json()
            .await
            .context("hyena markets parse failed")?;

        let rows = body
            .markets
            .into_iter()
            .map(|m| {
                SnapshotInput::new(
                    VenueId::Hyena,
                    m.symbol,
                    m.mark_price,
                    m.index_price,
                    m.open_interest,
                    m.last_price,
                    m.funding_rate,
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
