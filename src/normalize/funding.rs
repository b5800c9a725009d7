//! Per-venue funding-rate encoding → (hourly %, annualized %) conversion.
//!
//! Implements the venue→parameter table alternative to a SQL `CASE`
//! block described in DESIGN NOTES §9: `VenueId::funding_params`
//! carries the interval and raw-encoding flag, and this module is one
//! small match over those parameters plus arithmetic.

use crate::domain::VenueId;

const HOURS_PER_YEAR: f64 = 24.0 * 365.0;

/// Result of converting one venue's raw funding rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingRates {
    pub hourly_percent: f64,
    pub annualized_percent: f64,
}

/// Convert `raw` (the venue-native funding rate) into hourly/annualized
/// percentages. Never fails — out-of-range results are dropped by
/// downstream consumers (the unified sync's `|raw| ≤ 10%` filter, §4.2),
/// not by this function.
///
/// `interval_hours_override` supplies the per-payload interval for
/// variable-interval venues (Aster); it is ignored for every other
/// venue family, which use their own fixed interval.
pub fn normalize_funding(
    raw: f64,
    venue: VenueId,
    interval_hours_override: Option<f64>,
) -> FundingRates {
    let params = venue.funding_params();
    let interval_hours = if params.variable_interval {
        interval_hours_override.unwrap_or(params.default_interval_hours)
    } else {
        params.default_interval_hours
    };

    let hourly = raw / interval_hours;
    let annualized = if params.raw_in_percent {
        hourly * HOURS_PER_YEAR
    } else {
        hourly * HOURS_PER_YEAR * 100.0
    };
    let hourly_percent = if params.raw_in_percent {
        hourly
    } else {
        hourly * 100.0
    };

    FundingRates {
        hourly_percent,
        annualized_percent: annualized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_hour_venues_scale_by_24x365x100() {
        let r = normalize_funding(0.0008, VenueId::Hyperliquid, None);
        let expected_hourly = (0.0008 / 8.0) * 100.0;
        assert!((r.hourly_percent - expected_hourly).abs() < 1e-9);
        assert!((r.annualized_percent - expected_hourly * 24.0 * 365.0).abs() < 1e-6);
    }

    #[test]
    fn edgex_uses_four_hour_interval() {
        let r = normalize_funding(0.0004, VenueId::EdgeX, None);
        let expected_hourly = (0.0004 / 4.0) * 100.0;
        assert!((r.hourly_percent - expected_hourly).abs() < 1e-9);
    }

    #[test]
    fn lighter_raw_is_already_percent_and_skips_the_extra_hundred() {
        // Scenario 4 in the spec: raw 0.0012 at 1h interval.
        let r = normalize_funding(0.0012, VenueId::Lighter, None);
        assert!((r.hourly_percent - 0.0012).abs() < 1e-12);
        let expected_annualized = 0.0012 * 24.0 * 365.0;
        assert!((r.annualized_percent - expected_annualized).abs() < 1e-9);
        assert!((r.annualized_percent - 10.512).abs() < 1e-3);
    }

    #[test]
    fn extended_and_pacifica_use_decimal_one_hour_raw() {
        let r = normalize_funding(0.0001, VenueId::Extended, None);
        assert!((r.hourly_percent - 0.01).abs() < 1e-9);
        let r2 = normalize_funding(0.0001, VenueId::Pacifica, None);
        assert_eq!(r.hourly_percent, r2.hourly_percent);
    }

    #[test]
    fn aster_defaults_to_eight_hours_but_honors_an_override() {
        let default = normalize_funding(0.0008, VenueId::Aster, None);
        let overridden = normalize_funding(0.0008, VenueId::Aster, Some(4.0));
        assert!(overridden.hourly_percent > default.hourly_percent);
    }
}
