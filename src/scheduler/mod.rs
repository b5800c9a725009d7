//! Two cron-style schedules (§5, §9): a 5-minute tick running Stage A,
//! Stage C, the unified sync, and both derive engines in sequence, and
//! an hourly tick running Stage B. Modeled on the teacher's
//! `tokio::spawn` + `tokio::time::interval` loop idiom in `main.rs`
//! rather than a generic job-scheduler crate — each loop is a single
//! spawned task, one tick source, logging and continuing past a
//! failing step instead of aborting the whole pass (§7: "scheduled-
//! task failure ... pass aborts, idempotent recovery" means the *pass*
//! stops, not the scheduler).

use crate::derive::{arbitrage, moving_average};
use crate::domain::VenueId;
use crate::rollup::{stage_a, stage_b, stage_c};
use crate::storage::{PrimaryStore, UnifiedStore};
use crate::unify;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

const FIVE_MINUTE_SCHEDULE_SECS: u64 = 5 * 60;
const HOURLY_SCHEDULE_SECS: u64 = 60 * 60;

fn now_s() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Spawns the two schedule loops and returns their handles so the
/// caller (the `aggregator` binary) can hold onto them for the
/// lifetime of the process.
pub fn spawn(primary: Arc<PrimaryStore>, unified: Arc<UnifiedStore>) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(five_minute_loop(primary.clone(), unified.clone())),
        tokio::spawn(hourly_loop(primary)),
    ]
}

async fn five_minute_loop(primary: Arc<PrimaryStore>, unified: Arc<UnifiedStore>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(FIVE_MINUTE_SCHEDULE_SECS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        run_five_minute_pass(&primary, &unified).await;
    }
}

async fn hourly_loop(primary: Arc<PrimaryStore>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(HOURLY_SCHEDULE_SECS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        run_hourly_pass(&primary).await;
    }
}

/// Stage A, Stage C, unified sync, moving averages, arbitrage — in
/// that order, since the arbitrage engine reads the moving-average
/// engine's output and the sync step must land before either derive
/// engine runs.
async fn run_five_minute_pass(primary: &PrimaryStore, unified: &UnifiedStore) {
    match stage_a::run(primary, now_ms()).await {
        Ok(stats) => info!(buckets = stats.buckets_written, rows_deleted = stats.rows_deleted, "stage_a complete"),
        Err(err) => error!(error = %err, "stage_a failed"),
    }

    match stage_c::run(primary, now_ms()).await {
        Ok(stats) => info!(buckets = stats.buckets_written, "stage_c complete"),
        Err(err) => error!(error = %err, "stage_c failed"),
    }

    match unify::sync::run(primary, unified, VenueId::all(), now_s()).await {
        Ok(stats) => info!(rows_synced = stats.rows_synced, filtered = stats.rows_filtered_rate, "unified sync complete"),
        Err(err) => error!(error = %err, "unified sync failed"),
    }

    match moving_average::run(unified, now_s()).await {
        Ok(stats) => info!(per_venue_rows = stats.per_venue_rows, cross_venue_rows = stats.cross_venue_rows, "moving average engine complete"),
        Err(err) => error!(error = %err, "moving average engine failed"),
    }

    match arbitrage::run(unified, now_s()).await {
        Ok(stats) => info!(rows_written = stats.rows_written, "arbitrage engine complete"),
        Err(err) => error!(error = %err, "arbitrage engine failed"),
    }
}

async fn run_hourly_pass(primary: &PrimaryStore) {
    match stage_b::run(primary, now_ms()).await {
        Ok(stats) => info!(buckets = stats.buckets_written, "stage_b complete"),
        Err(err) => error!(error = %err, "stage_b failed"),
    }
}
