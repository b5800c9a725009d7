//! One long-lived actor per venue (§4.3), driven by `supervisor::run`.
//!
//! Each venue module implements [`PollingCollector`] or
//! [`StreamingCollector`] and nothing else — the tick timer, backoff
//! state machine, buffer flush, and status reporting all live in
//! `supervisor` and are shared by every venue, the same way the
//! teacher's `AppState` spawns one task per scraper and lets each
//! scraper module own only its own parsing logic.

pub mod aster;
pub mod edgex;
pub mod extended;
pub mod flx;
pub mod hyena;
pub mod hyperliquid;
pub mod km;
pub mod lighter;
pub mod paradex;
pub mod pacifica;
pub mod session;
pub mod status;
pub mod supervisor;
pub mod variational;
pub mod vntl;
pub mod xyz;

use crate::domain::{SnapshotInput, VenueId};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Management commands accepted on a collector's command channel.
/// All four are idempotent (§4.3); anything but `Stop` implicitly
/// starts the collector if it isn't running.
#[derive(Debug, Clone)]
pub enum Command {
    Start,
    Stop,
    Status(tokio::sync::oneshot::Sender<CollectorStatusSnapshot>),
    Debug(tokio::sync::oneshot::Sender<String>),
}

#[derive(Debug, Clone)]
pub struct CollectorStatusSnapshot {
    pub venue: VenueId,
    pub state: String,
    pub reconnect_count: u32,
    pub last_message_at: Option<i64>,
}

/// A venue hit on each `:00/:15/:30/:45` tick. `poll_once` performs one
/// request and returns every symbol's reading; the supervisor handles
/// timing, buffering, and persistence.
#[async_trait]
pub trait PollingCollector: Send + Sync {
    fn venue(&self) -> VenueId;

    async fn poll_once(&self, client: &reqwest::Client, now_ms: i64) -> Result<Vec<SnapshotInput>>;
}

/// A venue with a persistent streaming subscription. The supervisor
/// owns the connect/subscribe/reconnect state machine; the venue
/// module only knows its URL and how to turn one message into buffer
/// updates.
#[async_trait]
pub trait StreamingCollector: Send + Sync {
    fn venue(&self) -> VenueId;

    fn ws_url(&self) -> &str;

    /// Preventive reconnect interval, if this venue's server enforces
    /// one (paradex: 45s, pre-empting a 60s timeout).
    fn preventive_reconnect(&self) -> Option<std::time::Duration> {
        None
    }

    /// The outbound subscribe message sent right after connecting, if any.
    fn subscribe_payload(&self) -> Option<String> {
        None
    }

    /// Apply one inbound text message to the in-memory buffer, keyed
    /// by original symbol. Unrecognized message shapes (acks, pings)
    /// are silently ignored, not errors.
    fn apply_message(
        &self,
        text: &str,
        buffer: &mut HashMap<String, SnapshotInput>,
        now_ms: i64,
    ) -> Result<()>;
}
