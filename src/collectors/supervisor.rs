//! Drives one venue's collector: tick timer (polling) or
//! connect/subscribe/reconnect state machine (streaming), a 15s buffer
//! flush, and status reporting — generalized out of
//! `src/main.rs`'s per-scraper `tokio::spawn` fan-out and
//! `scrapers/binance_session.rs`'s reconnect loop.

use crate::collectors::session::{BackoffCalculator, SessionConfig, SessionState, TransitionReason};
use crate::collectors::{status, Command, PollingCollector, StreamingCollector};
use crate::domain::{SnapshotInput, VenueId};
use crate::storage::PrimaryStore;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Sampling grid: every 15 seconds, aligned to wall-clock second 0/15/30/45.
const TICK_SECS: u64 = 15;

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Duration until the next `TICK_SECS`-aligned wall-clock boundary.
fn until_next_grid_tick() -> Duration {
    let now = now_ms();
    let period_ms = (TICK_SECS * 1000) as i64;
    let remainder = now.rem_euclid(period_ms);
    let wait_ms = period_ms - remainder;
    Duration::from_millis(wait_ms.max(1) as u64)
}

async fn sleep_until_next_tick() {
    tokio::time::sleep(until_next_grid_tick()).await;
}

/// Run a polling collector: each aligned tick issues one request,
/// persists the full reply as one batch, and reports status. Failures
/// never stop the loop (§4.3).
pub async fn run_polling(
    collector: Arc<dyn PollingCollector>,
    store: Arc<PrimaryStore>,
    mut commands: mpsc::Receiver<Command>,
) {
    let venue = collector.venue();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client");
    let mut running = true;
    let _ = status::mark_running(&store, venue, now_ms());

    loop {
        if !running {
            match commands.recv().await {
                Some(Command::Start) => {
                    running = true;
                    let _ = status::mark_running(&store, venue, now_ms());
                }
                Some(Command::Stop) | None => continue,
                Some(Command::Status(reply)) => {
                    let _ = reply.send(snapshot(venue, "STOPPED", 0, None));
                }
                Some(Command::Debug(reply)) => {
                    let _ = reply.send(format!("{venue}: stopped"));
                }
            }
            continue;
        }

        tokio::select! {
            _ = sleep_until_next_tick() => {
                let ts = now_ms();
                match collector.poll_once(&client, ts).await {
                    Ok(rows) if rows.is_empty() => {}
                    Ok(rows) => {
                        if let Err(e) = store.insert_snapshots_batch(&rows) {
                            error!(venue = %venue, error = %e, "failed to persist polled batch");
                            let _ = status::mark_error(&store, venue, e.to_string(), ts);
                        } else {
                            let _ = status::mark_message_received(&store, venue, ts);
                        }
                    }
                    Err(e) => {
                        warn!(venue = %venue, error = %e, "poll failed, retrying next tick");
                        let _ = status::mark_error(&store, venue, e.to_string(), ts);
                    }
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Start) => {}
                    Some(Command::Stop) => {
                        running = false;
                        let _ = status::mark_stopped(&store, venue, now_ms());
                    }
                    Some(Command::Status(reply)) => {
                        let _ = reply.send(snapshot(venue, "RUNNING", 0, None));
                    }
                    Some(Command::Debug(reply)) => {
                        let _ = reply.send(format!("{venue}: polling collector, tick={TICK_SECS}s"));
                    }
                    None => break,
                }
            }
        }
    }
}

/// Run a streaming collector through `SessionState`'s full lifecycle,
/// reconnecting with jittered backoff and flushing its buffer every
/// 15s independent of message cadence (§4.3).
pub async fn run_streaming(
    collector: Arc<dyn StreamingCollector>,
    store: Arc<PrimaryStore>,
    mut commands: mpsc::Receiver<Command>,
) {
    let venue = collector.venue();
    let mut session_config = SessionConfig::default();
    if let Some(refresh) = collector.preventive_reconnect() {
        session_config = session_config.with_proactive_refresh(refresh.as_secs());
    }
    let mut backoff = BackoffCalculator::new(session_config.clone());
    let mut state = SessionState::Init;
    let mut running = true;
    let buffer: Arc<std::sync::Mutex<HashMap<String, SnapshotInput>>> =
        Arc::new(std::sync::Mutex::new(HashMap::new()));

    let _ = status::mark_running(&store, venue, now_ms());

    loop {
        if !running {
            match commands.recv().await {
                Some(Command::Start) => {
                    running = true;
                    state = SessionState::Init;
                    backoff.reset();
                }
                Some(Command::Status(reply)) => {
                    let _ = reply.send(snapshot(venue, &state.to_string(), backoff.attempt(), None));
                }
                Some(Command::Debug(reply)) => {
                    let _ = reply.send(format!("{venue}: stopped"));
                }
                _ => {}
            }
            continue;
        }

        state = SessionState::Connecting;
        info!(venue = %venue, state = %state, reason = %TransitionReason::Started, "connecting");

        let connect_result = tokio_tungstenite::connect_async(collector.ws_url()).await;
        let (ws, _) = match connect_result {
            Ok(pair) => pair,
            Err(e) => {
                warn!(venue = %venue, error = %e, reason = %TransitionReason::ConnectError, "connect failed");
                let _ = status::mark_error(&store, venue, e.to_string(), now_ms());
                if backoff.exhausted() {
                    error!(venue = %venue, reason = %TransitionReason::ReconnectExhausted, "giving up");
                    let _ = status::mark_failed(&store, venue, backoff.attempt() as i64, now_ms());
                    return;
                }
                let wait = backoff.next_backoff();
                let _ = status::mark_reconnecting(&store, venue, backoff.attempt() as i64, now_ms());
                tokio::time::sleep(wait).await;
                continue;
            }
        };

        state = SessionState::Subscribing;
        let (mut write, mut read) = ws.split();
        if let Some(payload) = collector.subscribe_payload() {
            if let Err(e) = write.send(tokio_tungstenite::tungstenite::Message::Text(payload)).await {
                warn!(venue = %venue, error = %e, "subscribe send failed");
                continue;
            }
        }
        state = SessionState::Streaming;
        backoff.reset();
        info!(venue = %venue, state = %state, reason = %TransitionReason::SubscribeSuccess, "streaming");

        let mut flush_interval = tokio::time::interval(Duration::from_secs(TICK_SECS));
        flush_interval.reset_at(Instant::now() + until_next_grid_tick());
        let reconnect_deadline = session_config
            .proactive_refresh_secs
            .map(|secs| tokio::time::sleep(Duration::from_secs(secs)));
        tokio::pin!(reconnect_deadline);

        'stream: loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(tokio_tungstenite::tungstenite::Message::Text(text))) => {
                            let ts = now_ms();
                            let mut guard = buffer.lock().unwrap();
                            if let Err(e) = collector.apply_message(&text, &mut guard, ts) {
                                warn!(venue = %venue, error = %e, "failed to parse message");
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(venue = %venue, error = %e, reason = %TransitionReason::NetworkError, "stream error");
                            break 'stream;
                        }
                        None => {
                            warn!(venue = %venue, reason = %TransitionReason::StreamClosed, "stream closed by peer");
                            break 'stream;
                        }
                    }
                }
                _ = flush_interval.tick() => {
                    let rows: Vec<SnapshotInput> = {
                        let mut guard = buffer.lock().unwrap();
                        guard.drain().map(|(_, v)| v).collect()
                    };
                    if !rows.is_empty() {
                        let ts = now_ms();
                        match store.insert_snapshots_batch(&rows) {
                            Ok(_) => { let _ = status::mark_message_received(&store, venue, ts); }
                            Err(e) => {
                                error!(venue = %venue, error = %e, "failed to persist streamed batch");
                                let _ = status::mark_error(&store, venue, e.to_string(), ts);
                            }
                        }
                    }
                }
                _ = async {
                    if let Some(sleep) = reconnect_deadline.as_mut().as_pin_mut() {
                        sleep.await
                    } else {
                        std::future::pending().await
                    }
                }, if session_config.proactive_refresh_secs.is_some() => {
                    info!(venue = %venue, reason = %TransitionReason::ProactiveRefresh, "proactive reconnect");
                    break 'stream;
                }
                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Stop) => {
                            running = false;
                            let _ = status::mark_stopped(&store, venue, now_ms());
                            break 'stream;
                        }
                        Some(Command::Status(reply)) => {
                            let _ = reply.send(snapshot(venue, &state.to_string(), backoff.attempt(), Some(now_ms())));
                        }
                        Some(Command::Debug(reply)) => {
                            let _ = reply.send(format!("{venue}: {state}, attempt={}", backoff.attempt()));
                        }
                        Some(Command::Start) => {}
                        None => { running = false; break 'stream; }
                    }
                }
            }
        }

        if running {
            state = SessionState::Reconnecting;
            let wait = backoff.next_backoff();
            let _ = status::mark_reconnecting(&store, venue, backoff.attempt() as i64, now_ms());
            tokio::time::sleep(wait).await;
        }
    }
}

fn snapshot(
    venue: VenueId,
    state: &str,
    reconnect_count: u32,
    last_message_at: Option<i64>,
) -> crate::collectors::CollectorStatusSnapshot {
    crate::collectors::CollectorStatusSnapshot {
        venue,
        state: state.to_string(),
        reconnect_count,
        last_message_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_tick_never_waits_longer_than_the_period() {
        let wait = until_next_grid_tick();
        assert!(wait <= Duration::from_secs(TICK_SECS));
    }
}
