//! Three cron-scheduled, idempotent passes over `PrimaryStore` (§4.5):
//! 15s raw → 1m aggregate, 1m → 1h aggregate, and a live-view refresh.
//! Each stage is a free function returning `RollupStats` for structured
//! logging, grounded on `signals/db_storage.rs`'s batch-transaction
//! idiom and `arbitrage/engine.rs`'s `Result`-returning pass structure.

pub mod stage_a;
pub mod stage_b;
pub mod stage_c;

/// Bucket/row counters logged by the caller after each pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollupStats {
    pub buckets_written: usize,
    pub rows_deleted: usize,
}
