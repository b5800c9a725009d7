//! Moving-average and arbitrage engines (§4.7/§4.8), both reading from
//! and writing to `UnifiedStore` only. Run in that order by the
//! scheduler since the arbitrage engine consumes the MA engine's output.

pub mod arbitrage;
pub mod moving_average;
