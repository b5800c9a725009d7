//! Collector-status upsert helper, shared by every venue's
//! status-reporting task (§4.3).

use crate::domain::{CollectorStatus, CollectorStatusTag, VenueId};
use crate::storage::PrimaryStore;
use anyhow::Result;

pub fn mark_running(store: &PrimaryStore, venue: VenueId, now_ms: i64) -> Result<()> {
    upsert(store, venue, CollectorStatusTag::Running, Some(now_ms), None, 0, now_ms)
}

pub fn mark_message_received(store: &PrimaryStore, venue: VenueId, now_ms: i64) -> Result<()> {
    let reconnects = store
        .collector_status(venue)?
        .map(|s| s.reconnect_count)
        .unwrap_or(0);
    upsert(
        store,
        venue,
        CollectorStatusTag::Connected,
        Some(now_ms),
        None,
        reconnects,
        now_ms,
    )
}

pub fn mark_error(store: &PrimaryStore, venue: VenueId, message: impl Into<String>, now_ms: i64) -> Result<()> {
    let reconnects = store
        .collector_status(venue)?
        .map(|s| s.reconnect_count)
        .unwrap_or(0);
    upsert(
        store,
        venue,
        CollectorStatusTag::Error,
        None,
        Some(message.into()),
        reconnects,
        now_ms,
    )
}

pub fn mark_reconnecting(store: &PrimaryStore, venue: VenueId, reconnect_count: i64, now_ms: i64) -> Result<()> {
    upsert(
        store,
        venue,
        CollectorStatusTag::Connected,
        None,
        Some(format!("reconnect attempt {reconnect_count}")),
        reconnect_count,
        now_ms,
    )
}

pub fn mark_failed(store: &PrimaryStore, venue: VenueId, reconnect_count: i64, now_ms: i64) -> Result<()> {
    upsert(
        store,
        venue,
        CollectorStatusTag::Failed,
        None,
        Some("reconnect attempts exhausted".to_string()),
        reconnect_count,
        now_ms,
    )
}

pub fn mark_stopped(store: &PrimaryStore, venue: VenueId, now_ms: i64) -> Result<()> {
    let reconnects = store
        .collector_status(venue)?
        .map(|s| s.reconnect_count)
        .unwrap_or(0);
    upsert(store, venue, CollectorStatusTag::Stopped, None, None, reconnects, now_ms)
}

fn upsert(
    store: &PrimaryStore,
    venue: VenueId,
    status: CollectorStatusTag,
    last_message_at: Option<i64>,
    last_error_message: Option<String>,
    reconnect_count: i64,
    updated_at: i64,
) -> Result<()> {
    store.upsert_collector_status(&CollectorStatus {
        venue,
        status,
        last_message_at,
        last_error_message,
        reconnect_count,
        updated_at,
    })
}
