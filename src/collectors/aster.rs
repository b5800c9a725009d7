//! Aster: Binance-futures-shaped REST API. Funding interval varies per
//! symbol (the only variable-interval venue, §4.2), carried in
//! `fundingIntervalHours` on each ticker entry.

use crate::collectors::PollingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

const TICKER_URL: &str = "https://fapi.asterdex.com/fapi/v1/ticker24hr";
const PREMIUM_URL: &str = "https://fapi.asterdex.com/fapi/v1/premiumIndex";

pub struct AsterCollector;

#[derive(Debug, Deserialize)]
struct Ticker24h {
    symbol: String,
    #[serde(rename = "lastPrice", deserialize_with = "de_f64")]
    last_price: f64,
    #[serde(rename = "lowPrice", deserialize_with = "de_f64")]
    low_price: f64,
    #[serde(rename = "highPrice", deserialize_with = "de_f64")]
    high_price: f64,
    #[serde(rename = "priceChangePercent", deserialize_with = "de_f64")]
    price_change_percent: f64,
    #[serde(rename = "volume", deserialize_with = "de_f64")]
    volume: f64,
    #[serde(rename = "quoteVolume", deserialize_with = "de_f64")]
    quote_volume: f64,
}

#[derive(Debug, Deserialize)]
struct PremiumIndex {
    symbol: String,
    #[serde(rename = "markPrice", deserialize_with = "de_f64")]
    mark_price: f64,
    #[serde(rename = "indexPrice", deserialize_with = "de_f64")]
    index_price: f64,
    #[serde(rename = "lastFundingRate", deserialize_with = "de_f64")]
    last_funding_rate: f64,
    #[serde(rename = "fundingIntervalHours", default = "default_interval")]
    funding_interval_hours: f64,
}

fn default_interval() -> f64 {
    8.0
}

fn de_f64<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    s.parse().map_err(serde::de::Error::custom)
}

#[async_trait]
impl PollingCollector for AsterCollector {
    fn venue(&self) -> VenueId {
        VenueId::Aster
    }

    async fn poll_once(&self, client: &reqwest::Client, now_ms: i64) -> Result<Vec<SnapshotInput>> {
        let tickers: Vec<Ticker24h> = client
            .get(TICKER_URL)
            .send()
            .await
            .context("aster ticker24hr request failed")?
            .json()
            .await
            .context("aster ticker24hr parse failed")?;
        let premiums: Vec<PremiumIndex> = client
            .get(PREMIUM_URL)
            .send()
            .await
            .context("aster premiumIndex request failed")?
            .json()
            .await
            .context("aster premiumIndex parse failed")?;

        let premiums_by_symbol: std::collections::HashMap<String, PremiumIndex> =
            premiums.into_iter().map(|p| (p.symbol.clone(), p)).collect();

        let rows = tickers
            .into_iter()
            .filter_map(|t| {
                let p = premiums_by_symbol.get(&t.symbol)?;
                Some(SnapshotInput::new(
                    VenueId::Aster,
                    t.symbol.clone(),
                    p.mark_price,
                    p.index_price,
                    0.0,
                    t.last_price,
                    p.last_funding_rate,
                    p.funding_interval_hours,
                    t.volume,
                    t.quote_volume,
                    t.low_price,
                    t.high_price,
                    t.price_change_percent,
                    now_ms,
                ))
            })
            .collect();
        Ok(rows)
    }
}
