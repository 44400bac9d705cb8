//! Composite duration parsing: `"5d3h28m5s"` style strings.
//!
//! Accepts one or more `<number><unit>` pairs, case-insensitive, with
//! optional embedded whitespace between pairs. Units are `s`, `m`, `h`,
//! `d`, `w`. Numbers may be fractional (`1.5h`).

use regex::Regex;
use serde::{de, Deserialize, Deserializer};
use std::sync::OnceLock;
use std::time::Duration;

fn pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([smhdw])").unwrap()
    })
}

/// Parses a composite duration string such as `"5d3h28m5s"`.
///
/// Returns an error if the string contains no recognisable `<number><unit>`
/// pairs, or if it contains trailing characters that aren't whitespace and
/// don't belong to a pair.
pub fn parse(input: &str) -> Result<Duration, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty duration string".to_string());
    }

    let re = pair_re();
    let mut total = Duration::ZERO;
    let mut consumed = 0usize;
    let mut matched_any = false;

    for caps in re.captures_iter(trimmed) {
        matched_any = true;
        // Group 0 is always present for any match a regex produces.
        let whole_len = caps.get(0).map(|m| m.as_str().len()).unwrap_or(0);
        consumed += whole_len;

        let amount: f64 = caps[1]
            .parse()
            .map_err(|_| format!("invalid number in duration: {}", &caps[1]))?;
        let unit = caps[2].to_ascii_lowercase();
        let seconds = match unit.as_str() {
            "s" => amount,
            "m" => amount * 60.0,
            "h" => amount * 3600.0,
            "d" => amount * 86400.0,
            "w" => amount * 604_800.0,
            other => return Err(format!("unknown duration unit: {}", other)),
        };
        total += Duration::from_secs_f64(seconds);
    }

    if !matched_any {
        return Err(format!("no duration pairs found in: {}", input));
    }

    // Every non-whitespace character must have belonged to a matched pair.
    let non_whitespace: usize = trimmed.chars().filter(|c| !c.is_whitespace()).count();
    if consumed != non_whitespace {
        return Err(format!("unparsed trailing content in duration: {}", input));
    }

    Ok(total)
}

/// Renders a `Duration` back into a human-readable composite string, in
/// descending unit order, skipping zero components (used for
/// `status_timeframe`).
pub fn format(d: Duration) -> String {
    let mut secs = d.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, unit_secs) in [("w", 604_800), ("d", 86400), ("h", 3600), ("m", 60), ("s", 1)] {
        let count = secs / unit_secs;
        if count > 0 {
            out.push_str(&format!("{}{}", count, unit));
            secs %= unit_secs;
        }
    }
    out
}

/// `serde` deserialization helper for config fields that hold composite
/// duration strings.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(de::Error::custom)
}

/// Same as [`deserialize`] but for an `Option<Duration>` field (used for
/// `ttl`, which may be entirely absent).
pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| parse(&s).map_err(de::Error::custom)).transpose()
}

#[cfg(test)]
#[path = "duration_test.rs"]
mod tests;
