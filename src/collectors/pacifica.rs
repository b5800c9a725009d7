//! Pacifica: streams a `prices` channel. 1-hour funding interval, raw
//! rate in decimal form (§4.2).

use crate::collectors::StreamingCollector;
use crate::domain::{SnapshotInput, VenueId};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const WS_URL: &str = "wss://ws.pacifica.fi/ws";

pub struct PacificaCollector;

#[derive(Debug, Deserialize)]
struct PricesMessage {
    channel: String,
    data: Vec<PriceEntry>,
}

#[derive(Debug, Deserialize)]
struct PriceEntry {
    symbol: String,
    mark: f64,
    oracle: f64,
    #[serde(default)]
    open_interest: f64,
    mid: f64,
    funding: f64,
    volume_24h: f64,
    #[serde(default)]
    volume_24h_quote: f64,
    low_24h: f64,
    high_24h: f64,
    change_24h: f64,
}

#[async_trait]
impl StreamingCollector for PacificaCollector {
    fn venue(&self) -> VenueId {
        VenueId::Pacifica
    }

    fn ws_url(&self) -> &str {
        WS_URL
    }

    fn subscribe_payload(&self) -> Option<String> {
        Some(r#"{"method":"subscribe","params":{"source":"prices"}}"#.to_string())
    }

    fn apply_message(
        &self,
        text: &str,
        buffer: &mut HashMap<String, SnapshotInput>,
        now_ms: i64,
    ) -> Result<()> {
        let msg: PricesMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(_) => return Ok(()),
        };
        if msg.channel != "prices" {
            return Ok(());
        }
        for p in msg.data {
            buffer.insert(
                p.symbol.clone(),
                SnapshotInput::new(
                    VenueId::Pacifica,
                    p.symbol,
                    p.mark,
                    p.oracle,
                    p.open_interest,
                    p.mid,
                    p.funding,
                    1.0,
                    p.volume_24h,
                    p.volume_24h_quote,
                    p.low_24h,
                    p.high_24h,
                    p.change_24h,
                    now_ms,
                ),
            );
        }
        Ok(())
    }
}
