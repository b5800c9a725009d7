//! Venue-native symbol → canonical base-asset normalizer. Pure, total,
//! idempotent; never performs I/O and never fails.

/// Normalize a venue-native symbol into its canonical base asset.
///
/// Step order matters and must not be reordered: prefix stripping (a)
/// runs before suffix stripping (b), which runs before the leading
/// `1000` strip (c), which runs before `/`/`_` removal (d). Leading
/// `k`/`K` (e.g. `kBONK`) is deliberately left alone — see DESIGN NOTES
/// in the spec for why.
pub fn normalize(original: &str) -> String {
    if original.is_empty() {
        return String::new();
    }

    let after_prefix = strip_venue_prefix(original);
    let mut upper = after_prefix.to_ascii_uppercase();
    upper = strip_suffix_family(&upper);
    upper = strip_leading_thousand(&upper);
    strip_separators(&upper)
}

/// (a) Strip a lowercase `<prefix>:` if present, e.g. `hyena:ETH` → `ETH`.
fn strip_venue_prefix(s: &str) -> &str {
    match s.find(':') {
        Some(idx) => {
            let prefix = &s[..idx];
            if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_lowercase()) {
                &s[idx + 1..]
            } else {
                s
            }
        }
        None => s,
    }
}

/// (b) Strip one trailing suffix from `-USD-PERP`, `-PERP`, `-USD`,
/// `USDT`, `USD` (longest match first; `USD` only when ≥2 chars remain).
fn strip_suffix_family(s: &str) -> String {
    if let Some(rest) = s.strip_suffix("-USD-PERP") {
        return rest.to_string();
    }
    if let Some(rest) = s.strip_suffix("-PERP") {
        return rest.to_string();
    }
    if let Some(rest) = s.strip_suffix("-USD") {
        return rest.to_string();
    }
    if let Some(rest) = s.strip_suffix("USDT") {
        return rest.to_string();
    }
    if let Some(rest) = s.strip_suffix("USD") {
        if rest.chars().count() >= 2 {
            return rest.to_string();
        }
    }
    s.to_string()
}

/// (c) Strip a leading `1000` when immediately followed by a letter,
/// e.g. `1000PEPE` → `PEPE`. `1INCH` is untouched (no `1000` prefix).
fn strip_leading_thousand(s: &str) -> String {
    if let Some(rest) = s.strip_prefix("1000") {
        if rest.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            return rest.to_string();
        }
    }
    s.to_string()
}

/// (d) Strip `/` and `_` separators.
fn strip_separators(s: &str) -> String {
    s.chars().filter(|c| *c != '/' && *c != '_').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_empty_string() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn collapses_every_venue_spelling_of_btc() {
        assert_eq!(normalize("BTC-USD-PERP"), "BTC");
        assert_eq!(normalize("BTCUSDT"), "BTC");
        assert_eq!(normalize("BTCUSD"), "BTC");
        assert_eq!(normalize("hyena:BTC"), "BTC");
    }

    #[test]
    fn strips_leading_thousand_but_not_plain_leading_digit() {
        assert_eq!(normalize("1000PEPE"), "PEPE");
        assert_eq!(normalize("PEPE"), "PEPE");
        assert_eq!(normalize("1INCH"), "1INCH");
    }

    #[test]
    fn strips_separators() {
        assert_eq!(normalize("BTC/USDT"), "BTC");
        assert_eq!(normalize("BTC_USD"), "BTC");
    }

    #[test]
    fn does_not_strip_leading_k() {
        // Open question in the spec resolved: k-prefixed tokens stay distinct.
        assert_eq!(normalize("kBONK"), "KBONK");
    }

    #[test]
    fn is_idempotent_over_arbitrary_inputs() {
        let cases = [
            "BTC-USD-PERP",
            "BTCUSDT",
            "BTCUSD",
            "hyena:ETH",
            "1000PEPE",
            "1INCH",
            "BTC/USDT",
            "BTC_USD",
            "kBONK",
            "",
            "USD",
            "USDT",
        ];
        for case in cases {
            let once = normalize(case);
            let twice = normalize(&once);
            assert_eq!(once, twice, "normalize not idempotent for {case:?}");
        }
    }

    #[test]
    fn short_usd_suffix_is_preserved() {
        // "USD" alone would leave <2 chars if stripped, so it's left intact.
        assert_eq!(normalize("USD"), "USD");
    }
}
