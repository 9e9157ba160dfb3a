//! Duration string parsing and wire encoding.
//!
//! Config files and query parameters use human-readable duration strings
//! (`"30s"`, `"5m"`, `"24h"`, `"7d"`). The JSON API encodes durations as
//! integer nanoseconds.

use std::time::Duration;

/// Parse a duration string with units `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`
/// and the extension `d` = 24h.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let (value, unit) = split_unit(s)?;
    let value: f64 = value
        .parse()
        .map_err(|_| format!("invalid duration value in '{input}'"))?;
    if value < 0.0 || !value.is_finite() {
        return Err(format!("invalid duration value in '{input}'"));
    }

    let nanos = match unit {
        "ns" => value,
        "us" | "µs" => value * 1_000.0,
        "ms" => value * 1_000_000.0,
        "s" => value * 1_000_000_000.0,
        "m" => value * 60.0 * 1_000_000_000.0,
        "h" => value * 3_600.0 * 1_000_000_000.0,
        "d" => value * 86_400.0 * 1_000_000_000.0,
        other => return Err(format!("unknown duration unit '{other}' in '{input}'")),
    };

    Ok(Duration::from_nanos(nanos as u64))
}

fn split_unit(s: &str) -> Result<(&str, &str), String> {
    let idx = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .ok_or_else(|| format!("missing unit in duration '{s}'"))?;
    Ok((&s[..idx], &s[idx..]))
}

/// Format a duration compactly for log lines and reports (`1.50s`, `250ms`).
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos >= 1_000_000_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else if nanos >= 1_000_000 {
        format!("{}ms", nanos / 1_000_000)
    } else if nanos >= 1_000 {
        format!("{}µs", nanos / 1_000)
    } else {
        format!("{nanos}ns")
    }
}

/// Serde helpers encoding `std::time::Duration` as integer nanoseconds.
pub mod serde_ns {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}

/// Serde helpers for `Option<Duration>`, also nanosecond-encoded.
pub mod serde_ns_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        d: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => serializer.serialize_some(&(d.as_nanos() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let nanos = Option::<u64>::deserialize(deserializer)?;
        Ok(nanos.map(Duration::from_nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("500ns").unwrap(), Duration::from_nanos(500));
    }

    #[test]
    fn parses_day_extension() {
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(7 * 86_400));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn parses_fractional_values() {
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1_500));
        assert_eq!(parse_duration("0.5h").unwrap(), Duration::from_secs(1_800));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(parse_duration(" 30s ").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10w").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn formats_readably() {
        assert_eq!(format_duration(Duration::from_millis(1_500)), "1.50s");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_micros(42)), "42µs");
        assert_eq!(format_duration(Duration::from_nanos(99)), "99ns");
    }

    #[test]
    fn nanosecond_serde_round_trips() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "super::serde_ns")]
            d: Duration,
        }

        let w = Wrapper {
            d: Duration::from_millis(1_234),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"d":1234000000}"#);

        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.d, w.d);
    }

    #[test]
    fn optional_nanosecond_serde_round_trips() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "super::serde_ns_opt")]
            d: Option<Duration>,
        }

        let some = Wrapper {
            d: Some(Duration::from_secs(2)),
        };
        let json = serde_json::to_string(&some).unwrap();
        assert_eq!(json, r#"{"d":2000000000}"#);
        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.d, some.d);

        let none: Wrapper = serde_json::from_str(r#"{"d":null}"#).unwrap();
        assert_eq!(none.d, None);
    }
}
