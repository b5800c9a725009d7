//! Per-venue high-water-mark sync into the unified cross-venue funding
//! table (§4.6).

pub mod sync;
