//! Lighter: streams a `market_stats` channel over a single websocket.
//! 1-hour funding interval with the rate already expressed in percent
//! (§4.2's "1-hour-interval, raw in %" family).

use crate::collectors::StreamingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const WS_URL: &str = "wss://mainnet.zklighter.elliot.ai/stream";

pub struct LighterCollector;

#[derive(Debug, Deserialize)]
struct MarketStatsMessage {
    channel: String,
    #[serde(default)]
    market_stats: Vec<MarketStat>,
}

#[derive(Debug, Deserialize)]
struct MarketStat {
    symbol: String,
    mark_price: f64,
    index_price: f64,
    open_interest: f64,
    last_trade_price: f64,
    funding_rate: f64,
    daily_base_token_volume: f64,
    daily_quote_token_volume: f64,
    low: f64,
    high: f64,
    daily_price_change: f64,
}

#[async_trait]
impl StreamingCollector for LighterCollector {
    fn venue(&self) -> VenueId {
        VenueId::Lighter
    }

    fn ws_url(&self) -> &str {
        WS_URL
    }

    fn subscribe_payload(&self) -> Option<String> {
        Some(r#"{"type":"subscribe","channel":"market_stats/all"}"#.to_string())
    }

    fn apply_message(
        &self,
        text: &str,
        buffer: &mut HashMap<String, SnapshotInput>,
        now_ms: i64,
    ) -> Result<()> {
        let msg: MarketStatsMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(_) => return Ok(()), // acks/pings have a different shape
        };
        if msg.channel != "market_stats" {
            return Ok(());
        }
        for stat in msg.market_stats {
            buffer.insert(
                stat.symbol.clone(),
                SnapshotInput::new(
                    VenueId::Lighter,
                    stat.symbol,
                    stat.mark_price,
                    stat.index_price,
                    stat.open_interest,
                    stat.last_trade_price,
                    stat.funding_rate,
                    1.0,
                    stat.daily_base_token_volume,
                    stat.daily_quote_token_volume,
                    stat.low,
                    stat.high,
                    stat.daily_price_change,
                    now_ms,
                ),
            );
        }
        Ok(())
    }
}
