//! Reconnect/backoff state machine shared by every streaming collector.
//!
//! Adapted from the teacher's Binance session manager
//! (`scrapers/binance_session.rs`): same `SessionState` transitions,
//! same jittered exponential backoff, same proactive-refresh idea —
//! trimmed to what a read-only market-data subscription needs (no
//! circuit-breaker endpoint rotation, no post-reconnect resync
//! coordination, since every venue here exposes exactly one endpoint
//! and snapshots are idempotent by nature).

use std::time::Duration;

/// Per-venue streaming session tuning. Defaults suit a market-stats
/// channel with no authentication; `proactive_refresh_secs` is the one
/// field venues are expected to override (paradex pre-empts a 60s
/// server timeout at 45s).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
    pub max_reconnect_attempts: u32,
    pub proactive_refresh_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 200,
            backoff_max_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.3,
            max_reconnect_attempts: 10,
            proactive_refresh_secs: None,
        }
    }
}

impl SessionConfig {
    pub fn with_proactive_refresh(mut self, secs: u64) -> Self {
        self.proactive_refresh_secs = Some(secs);
        self
    }
}

/// Connection state machine states (§4.3: `Init → Connecting →
/// Subscribing → Streaming → Reconnecting → Shutdown`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Connecting,
    Subscribing,
    Streaming,
    Reconnecting,
    Shutdown,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Subscribing => write!(f, "SUBSCRIBING"),
            Self::Streaming => write!(f, "STREAMING"),
            Self::Reconnecting => write!(f, "RECONNECTING"),
            Self::Shutdown => write!(f, "SHUTDOWN"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Reason for a state transition, carried into the `tracing` event so
/// reconnect storms are diagnosable after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    Started,
    ConnectSuccess,
    SubscribeSuccess,
    ConnectError,
    StreamClosed,
    NetworkError,
    ProactiveRefresh,
    ReconnectExhausted,
    StopRequested,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::ConnectSuccess => write!(f, "connect_ok"),
            Self::SubscribeSuccess => write!(f, "subscribe_ok"),
            Self::ConnectError => write!(f, "connect_error"),
            Self::StreamClosed => write!(f, "stream_closed"),
            Self::NetworkError => write!(f, "network_error"),
            Self::ProactiveRefresh => write!(f, "proactive_refresh"),
            Self::ReconnectExhausted => write!(f, "reconnect_exhausted"),
            Self::StopRequested => write!(f, "stop_requested"),
        }
    }
}

/// Exponential backoff with jitter (thundering-herd prevention across
/// the 4 streaming venues reconnecting at once).
#[derive(Debug)]
pub struct BackoffCalculator {
    config: SessionConfig,
    attempt: u32,
}

impl BackoffCalculator {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, attempt: 0 }
    }

    pub fn next_backoff(&mut self) -> Duration {
        let base = (self.config.backoff_base_ms as f64)
            * self.config.backoff_multiplier.powi(self.attempt as i32);
        let capped = base.min(self.config.backoff_max_ms as f64);
        let jitter_range = capped * self.config.jitter_factor;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_ms = (capped + jitter).max(self.config.backoff_base_ms as f64);
        self.attempt += 1;
        Duration::from_millis(final_ms as u64)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.config.max_reconnect_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let mut calc = BackoffCalculator::new(SessionConfig {
            jitter_factor: 0.0,
            ..SessionConfig::default()
        });
        let first = calc.next_backoff();
        let second = calc.next_backoff();
        assert!(second >= first);
        for _ in 0..20 {
            calc.next_backoff();
        }
        assert!(calc.next_backoff() <= Duration::from_millis(30_000));
    }

    #[test]
    fn exhaustion_trips_after_max_attempts() {
        let mut calc = BackoffCalculator::new(SessionConfig {
            max_reconnect_attempts: 3,
            ..SessionConfig::default()
        });
        assert!(!calc.exhausted());
        for _ in 0..3 {
            calc.next_backoff();
        }
        assert!(calc.exhausted());
        calc.reset();
        assert!(!calc.exhausted());
    }
}
