//! Utility functions for duration strings
//!
//! Durations in the configuration file are written as a sequence of
//! `<integer><unit>` groups, e.g. `30s`, `1m30s` or `500ms`. Supported units
//! are `h`, `m`, `s`, `ms`, `us` (or `µs`) and `ns`. A bare `0` means zero.

use std::time::Duration;

use crate::error::{KogiaError, KogiaResult};

/// Parse a duration string like "30s", "1m30s" or "250ms"
pub fn parse_duration(input: &str) -> KogiaResult<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(KogiaError::invalid_duration(input, "empty duration"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(KogiaError::invalid_duration(
                input,
                "expected a number before each unit",
            ));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| KogiaError::invalid_duration(input, "number out of range"))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "s" => Some(Duration::from_secs(value)),
            "ms" => Some(Duration::from_millis(value)),
            "us" | "µs" => Some(Duration::from_micros(value)),
            "ns" => Some(Duration::from_nanos(value)),
            "" => {
                return Err(KogiaError::invalid_duration(input, "missing unit"));
            }
            other => {
                return Err(KogiaError::invalid_duration(
                    input.to_string(),
                    format!("unknown unit '{}'", other),
                ));
            }
        };

        total = part
            .and_then(|p| total.checked_add(p))
            .ok_or_else(|| KogiaError::invalid_duration(input, "duration out of range"))?;
    }

    Ok(total)
}

/// Render a duration in the same notation [`parse_duration`] accepts
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }

    let secs = duration.as_secs();
    let nanos = duration.subsec_nanos();
    let parts = [
        (secs / 3600, "h"),
        (secs % 3600 / 60, "m"),
        (secs % 60, "s"),
        (u64::from(nanos / 1_000_000), "ms"),
        (u64::from(nanos / 1_000 % 1_000), "us"),
        (u64::from(nanos % 1_000), "ns"),
    ];

    parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect()
}

/// Serde adapter for `Duration` fields written as duration strings
pub mod duration_str {
    use std::fmt;
    use std::time::Duration;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DurationVisitor)
    }

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration string such as \"30s\" or \"1m30s\"")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            super::parse_duration(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            if v == 0 {
                Ok(Duration::ZERO)
            } else {
                Err(E::custom(format!("duration {} is missing a unit", v)))
            }
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            if v == 0 {
                Ok(Duration::ZERO)
            } else {
                Err(E::custom(format!("duration {} is missing a unit", v)))
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<Duration, E> {
            Ok(Duration::ZERO)
        }
    }
}
