use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Moving-average / arbitrage window tag. `Live` is the synthetic
/// window the arbitrage engine derives from the most recent unified
/// row per (symbol, venue) within the last 15 minutes (§4.8); it is
/// not a moving-average window and never appears in `funding_ma`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "3d")]
    D3,
    #[serde(rename = "7d")]
    D7,
    #[serde(rename = "14d")]
    D14,
    #[serde(rename = "30d")]
    D30,
    Live,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::H24 => "24h",
            Window::D3 => "3d",
            Window::D7 => "7d",
            Window::D14 => "14d",
            Window::D30 => "30d",
            Window::Live => "live",
        }
    }

    /// The five moving-average windows, in the canonical order used to
    /// compute the arbitrage stability score (§4.8 / §4.7).
    pub fn ma_windows() -> &'static [Window] {
        &[Window::H24, Window::D3, Window::D7, Window::D14, Window::D30]
    }

    /// MA + the synthetic `live` window, the full stability-score set.
    pub fn arbitrage_windows() -> &'static [Window] {
        &[
            Window::H24,
            Window::D3,
            Window::D7,
            Window::D14,
            Window::D30,
            Window::Live,
        ]
    }

    pub fn length_seconds(&self) -> i64 {
        match self {
            Window::H24 => 24 * 3600,
            Window::D3 => 3 * 24 * 3600,
            Window::D7 => 7 * 24 * 3600,
            Window::D14 => 14 * 24 * 3600,
            Window::D30 => 30 * 24 * 3600,
            Window::Live => 15 * 60,
        }
    }

    /// Minimum sample-count threshold below which a (symbol, venue,
    /// window) combination is not written (§4.7).
    pub fn min_sample_count(&self) -> i64 {
        match self {
            Window::H24 => 3,
            Window::D3 => 6,
            Window::D7 => 14,
            Window::D14 => 28,
            Window::D30 => 60,
            Window::Live => 1,
        }
    }

    /// Daily windows (≥3d) are subject to the first-seen eligibility
    /// gate in §4.7; 24h and the synthetic live window are not.
    pub fn requires_eligibility_gate(&self) -> bool {
        matches!(self, Window::D3 | Window::D7 | Window::D14 | Window::D30)
    }
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Window::H24),
            "3d" => Ok(Window::D3),
            "7d" => Ok(Window::D7),
            "14d" => Ok(Window::D14),
            "30d" => Ok(Window::D30),
            "live" => Ok(Window::Live),
            other => Err(format!("unknown window: {other}")),
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_match_spec_table() {
        assert_eq!(Window::H24.min_sample_count(), 3);
        assert_eq!(Window::D3.min_sample_count(), 6);
        assert_eq!(Window::D7.min_sample_count(), 14);
        assert_eq!(Window::D14.min_sample_count(), 28);
        assert_eq!(Window::D30.min_sample_count(), 60);
    }

    #[test]
    fn only_daily_windows_require_the_eligibility_gate() {
        assert!(!Window::H24.requires_eligibility_gate());
        assert!(Window::D3.requires_eligibility_gate());
        assert!(Window::D30.requires_eligibility_gate());
        assert!(!Window::Live.requires_eligibility_gate());
    }
}
