//! EdgeX: streams a `ticker` channel. 4-hour funding interval (the one
//! venue between the 8h and 1h families, §4.2).

use crate::collectors::StreamingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const WS_URL: &str = "wss://quote.edgex.exchange/api/v1/public/ws";

pub struct EdgeXCollector;

#[derive(Debug, Deserialize)]
struct TickerMessage {
    #[serde(rename = "type")]
    msg_type: String,
    content: Option<TickerContent>,
}

#[derive(Debug, Deserialize)]
struct TickerContent {
    #[serde(rename = "contractName")]
    contract_name: String,
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
    #[serde(rename = "turnover24h")]
    turnover_24h: f64,
    #[serde(rename = "lowPrice24h")]
    low_price_24h: f64,
    #[serde(rename = "highPrice24h")]
    high_price_24h: f64,
    #[serde(rename = "priceChangePercent")]
    price_change_percent: f64,
}

#[async_trait]
impl StreamingCollector for EdgeXCollector {
    fn venue(&self) -> VenueId {
        VenueId::EdgeX
    }

    fn ws_url(&self) -> &str {
        WS_URL
    }

    fn subscribe_payload(&self) -> Option<String> {
        Some(r#"{"type":"subscribe","channel":"ticker.all"}"#.to_string())
    }

    fn apply_message(
        &self,
        text: &str,
        buffer: &mut HashMap<String, SnapshotInput>,
        now_ms: i64,
    ) -> Result<()> {
        let msg: TickerMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(_) => return Ok(()),
        };
        if msg.msg_type != "ticker" {
            return Ok(());
        }
        let Some(c) = msg.content else { return Ok(()) };
        buffer.insert(
            c.contract_name.clone(),
            SnapshotInput::new(
                VenueId::EdgeX,
                c.contract_name,
                c.mark_price,
                c.index_price,
                c.open_interest,
                c.last_price,
                c.funding_rate,
                4.0,
                c.volume_24h,
                c.turnover_24h,
                c.low_price_24h,
                c.high_price_24h,
                c.price_change_percent,
                now_ms,
            ),
        );
        Ok(())
    }
}
