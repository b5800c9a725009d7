//! Paradex: streams a `markets_summary` channel. Preventive reconnect
//! every 45s pre-empts the venue's 60s server-side idle timeout
//! (§4.3). 8-hour funding interval.

use crate::collectors::StreamingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const WS_URL: &str = "wss://ws.api.prod.paradex.trade/v1";

pub struct ParadexCollector;

#[derive(Debug, Deserialize)]
struct RpcMessage {
    method: Option<String>,
    params: Option<RpcParams>,
}

#[derive(Debug, Deserialize)]
struct RpcParams {
    channel: String,
    data: MarketSummary,
}

#[derive(Debug, Deserialize)]
struct MarketSummary {
    symbol: String,
    mark_price: f64,
    underlying_price: f64,
    open_interest: f64,
    last_traded_price: f64,
    funding_rate: f64,
    volume_24h: f64,
    #[serde(default)]
    quote_volume_24h: f64,
    low_24h: f64,
    high_24h: f64,
    price_change_rate_24h: f64,
}

#[async_trait]
impl StreamingCollector for ParadexCollector {
    fn venue(&self) -> VenueId {
        VenueId::Paradex
    }

    fn ws_url(&self) -> &str {
        WS_URL
    }

    fn preventive_reconnect(&self) -> Option<Duration> {
        Some(Duration::from_secs(45))
    }

    fn subscribe_payload(&self) -> Option<String> {
        Some(
            r#"{"jsonrpc":"2.0","method":"subscribe","params":{"channel":"markets_summary"},"id":1}"#
                .to_string(),
        )
    }

    fn apply_message(
        &self,
        text: &str,
        buffer: &mut HashMap<String, SnapshotInput>,
        now_ms: i64,
    ) -> Result<()> {
        let msg: RpcMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(_) => return Ok(()),
        };
        let Some(method) = msg.method else { return Ok(()) };
        if method != "subscription" {
            return Ok(());
        }
        let Some(params) = msg.params else { return Ok(()) };
        if params.channel != "markets_summary" {
            return Ok(());
        }
        let m = params.data;
        buffer.insert(
            m.symbol.clone(),
            SnapshotInput::new(
                VenueId::Paradex,
                m.symbol,
                m.mark_price,
                m.underlying_price,
                m.open_interest,
                m.last_traded_price,
                m.funding_rate,
                8.0,
                m.volume_24h,
                m.quote_volume_24h,
                m.low_24h,
                m.high_24h,
                m.price_change_rate_24h * 100.0,
                now_ms,
            ),
        );
        Ok(())
    }
}
