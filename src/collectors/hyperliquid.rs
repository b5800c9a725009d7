//! Hyperliquid: `POST /info` with `{"type": "metaAndAssetCtxs"}`
//! returns a two-element array — market metadata, then one context per
//! market in the same order. 8-hour funding interval.

use crate::collectors::PollingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

const INFO_URL: &str = "https://api.hyperliquid.xyz/info";

pub struct HyperliquidCollector;

#[derive(Debug, Deserialize)]
struct Universe {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    universe: Vec<Universe>,
}

#[derive(Debug, Deserialize)]
struct AssetCtx {
    #[serde(rename = "markPx", deserialize_with = "de_f64")]
    mark_px: f64,
    #[serde(rename = "oraclePx", deserialize_with = "de_f64")]
    oracle_px: f64,
    #[serde(rename = "midPx", deserialize_with = "de_f64_opt", default)]
    mid_px: Option<f64>,
    #[serde(deserialize_with = "de_f64")]
    funding: f64,
    #[serde(rename = "openInterest", deserialize_with = "de_f64")]
    open_interest: f64,
    #[serde(rename = "dayNtlVlm", deserialize_with = "de_f64")]
    day_ntl_vlm: f64,
    #[serde(rename = "prevDayPx", deserialize_with = "de_f64")]
    prev_day_px: f64,
}

fn de_f64<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn de_f64_opt<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(d)?;
    opt.map(|s| s.parse().map_err(serde::de::Error::custom))
        .transpose()
}

#[async_trait]
impl PollingCollector for HyperliquidCollector {
    fn venue(&self) -> VenueId {
        VenueId::Hyperliquid
    }

    async fn poll_once(&self, client: &reqwest::Client, now_ms: i64) -> Result<Vec<SnapshotInput>> {
        let body: (MetaResponse, Vec<AssetCtx>) = client
            .post(INFO_URL)
            .json(&serde_json::json!({ "type": "metaAndAssetCtxs" }))
            .send()
            .await
            .context("hyperliquid info request failed")?
            .json()
            .await
            .context("hyperliquid info response parse failed")?;

        let (meta, ctxs) = body;
        let rows = meta
            .universe
            .into_iter()
            .zip(ctxs.into_iter())
            .map(|(market, ctx)| {
                let change_pct = if ctx.prev_day_px != 0.0 {
                    (ctx.mark_px - ctx.prev_day_px) / ctx.prev_day_px * 100.0
                } else {
                    0.0
                };
                SnapshotInput::new(
                    VenueId::Hyperliquid,
                    market.name,
                    ctx.mark_px,
                    ctx.oracle_px,
                    ctx.open_interest,
                    ctx.mid_px.unwrap_or(ctx.mark_px),
                    ctx.funding,
                    8.0,
                    0.0,
                    ctx.day_ntl_vlm,
                    ctx.mark_px,
                    ctx.mark_px,
                    change_pct,
                    now_ms,
                )
            })
            .collect();
        Ok(rows)
    }
}
