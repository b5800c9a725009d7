use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Closed set of the ~13 supported perpetual-futures venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueId {
    Hyperliquid,
    Hyena,
    Xyz,
    Flx,
    Vntl,
    Km,
    Variational,
    Paradex,
    EdgeX,
    Lighter,
    Extended,
    Pacifica,
    Aster,
}

impl VenueId {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueId::Hyperliquid => "hyperliquid",
            VenueId::Hyena => "hyena",
            VenueId::Xyz => "xyz",
            VenueId::Flx => "flx",
            VenueId::Vntl => "vntl",
            VenueId::Km => "km",
            VenueId::Variational => "variational",
            VenueId::Paradex => "paradex",
            VenueId::EdgeX => "edgex",
            VenueId::Lighter => "lighter",
            VenueId::Extended => "extended",
            VenueId::Pacifica => "pacifica",
            VenueId::Aster => "aster",
        }
    }

    pub fn all() -> &'static [VenueId] {
        &[
            VenueId::Hyperliquid,
            VenueId::Hyena,
            VenueId::Xyz,
            VenueId::Flx,
            VenueId::Vntl,
            VenueId::Km,
            VenueId::Variational,
            VenueId::Paradex,
            VenueId::EdgeX,
            VenueId::Lighter,
            VenueId::Extended,
            VenueId::Pacifica,
            VenueId::Aster,
        ]
    }

    /// True for collectors that hold a persistent streaming subscription
    /// rather than polling on the `:00/:15/:30/:45` grid.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            VenueId::Lighter | VenueId::Paradex | VenueId::Pacifica | VenueId::EdgeX
        )
    }

    /// `(funding_interval_hours, raw_rate_is_already_in_percent)` — the
    /// venue-parameter table referenced by DESIGN NOTES §9 as the
    /// alternative to a SQL `CASE` for funding-rate annualization.
    /// `None` interval hours means "variable, supplied per-payload".
    pub fn funding_params(&self) -> VenueFundingParams {
        match self {
            VenueId::Hyperliquid
            | VenueId::Hyena
            | VenueId::Xyz
            | VenueId::Flx
            | VenueId::Vntl
            | VenueId::Km
            | VenueId::Variational
            | VenueId::Paradex => VenueFundingParams {
                default_interval_hours: 8.0,
                raw_in_percent: false,
                variable_interval: false,
            },
            VenueId::EdgeX => VenueFundingParams {
                default_interval_hours: 4.0,
                raw_in_percent: false,
                variable_interval: false,
            },
            VenueId::Lighter => VenueFundingParams {
                default_interval_hours: 1.0,
                raw_in_percent: true,
                variable_interval: false,
            },
            VenueId::Extended | VenueId::Pacifica => VenueFundingParams {
                default_interval_hours: 1.0,
                raw_in_percent: false,
                variable_interval: false,
            },
            VenueId::Aster => VenueFundingParams {
                default_interval_hours: 8.0,
                raw_in_percent: false,
                variable_interval: true,
            },
        }
    }
}

/// Per-venue funding-rate encoding parameters (§4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VenueFundingParams {
    /// Used as-is unless `variable_interval` and an override is supplied.
    pub default_interval_hours: f64,
    /// `true` when the venue already expresses the raw rate as a
    /// percentage rather than a decimal fraction (e.g. Lighter).
    pub raw_in_percent: bool,
    /// `true` for venues (Aster) whose payload carries its own interval.
    pub variable_interval: bool,
}

impl FromStr for VenueId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hyperliquid" => Ok(VenueId::Hyperliquid),
            "hyena" => Ok(VenueId::Hyena),
            "xyz" => Ok(VenueId::Xyz),
            "flx" => Ok(VenueId::Flx),
            "vntl" => Ok(VenueId::Vntl),
            "km" => Ok(VenueId::Km),
            "variational" => Ok(VenueId::Variational),
            "paradex" => Ok(VenueId::Paradex),
            "edgex" => Ok(VenueId::EdgeX),
            "lighter" => Ok(VenueId::Lighter),
            "extended" => Ok(VenueId::Extended),
            "pacifica" => Ok(VenueId::Pacifica),
            "aster" => Ok(VenueId::Aster),
            other => Err(format!("unknown venue: {other}")),
        }
    }
}

impl std::fmt::Display for VenueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_venue_tag() {
        for venue in VenueId::all() {
            let parsed: VenueId = venue.as_str().parse().unwrap();
            assert_eq!(parsed, *venue);
        }
    }

    #[test]
    fn streaming_venues_match_spec_list() {
        assert!(VenueId::Lighter.is_streaming());
        assert!(VenueId::Paradex.is_streaming());
        assert!(VenueId::Pacifica.is_streaming());
        assert!(VenueId::EdgeX.is_streaming());
        assert!(!VenueId::Hyperliquid.is_streaming());
        assert!(!VenueId::Aster.is_streaming());
    }
}
