//! Read-only query operations over `PrimaryStore`/`UnifiedStore` (§4.9),
//! wrapped by the thin axum handlers in `api::routes`.

pub mod arbitrage;
pub mod funding;
pub mod ma;
pub mod markets;
pub mod normalized_data;

/// Hard cap on raw/range endpoints (§6).
pub const MAX_RAW_LIMIT: usize = 10_000;
/// Hard cap on MA/arbitrage/bulk endpoints (§6).
pub const MAX_MA_LIMIT: usize = 1_000;
