//! Funding-rate aggregator: one collector task per venue feeds a raw
//! snapshot store, a three-stage rollup pipeline compacts it, a cross-
//! venue sync folds venues into one unified funding table, and two
//! derive engines compute moving averages and arbitrage spreads. A
//! thin read-only axum API exposes all of it. See `README`/spec for the
//! full component breakdown; each module below corresponds to one
//! `[MODULE]` block.

pub mod api;
pub mod collectors;
pub mod config;
pub mod derive;
pub mod domain;
pub mod error;
pub mod normalize;
pub mod query;
pub mod rollup;
pub mod scheduler;
pub mod storage;
pub mod unify;
