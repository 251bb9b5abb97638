// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

/// Deserialize a duration from either:
/// - A string like "1s", "500ms", "30min", etc.
/// - A plain integer, interpreted as seconds
/// - An object with secs and nanos fields (for backward compatibility)
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DurationVisitor)
}

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(
            "a duration string like '1s', seconds as integer or an object with secs and nanos fields",
        )
    }

    fn visit_str<E>(self, value: &str) -> Result<Duration, E>
    where
        E: de::Error,
    {
        parse(value).map_err(de::Error::custom)
    }

    fn visit_u64<E>(self, value: u64) -> Result<Duration, E>
    where
        E: de::Error,
    {
        Ok(Duration::from_secs(value))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Duration, E>
    where
        E: de::Error,
    {
        u64::try_from(value)
            .map(Duration::from_secs)
            .map_err(|_| de::Error::custom(format!("negative duration: {value}")))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let (a, b) = (map.next_entry()?, map.next_entry()?);
        match (a, b) {
            (Some(a), Some(b)) => {
                let ((k1, v1), (k2, v2)): ((String, u64), (String, u64)) = (a, b);
                match (&k1 as &str, &k2 as &str) {
                    ("secs", "nanos") => Ok(Duration::new(v1, v2 as u32)),
                    ("nanos", "secs") => Ok(Duration::new(v2, v1 as u32)),
                    (a, b) => Err(serde::de::Error::custom(format!(
                        "unexpected keys {a}, {b}"
                    ))),
                }
            }
            _ => Err(serde::de::Error::custom("insufficient data for a duration")),
        }
    }
}

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = format_duration(duration);
    serializer.serialize_str(&s)
}

/// Same as the parent module but for `Option<Duration>` fields.
pub mod option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(deserialize_with = "super::deserialize")] Duration);

        let wrapped: Option<Wrapper> = Option::deserialize(deserializer)?;
        Ok(wrapped.map(|Wrapper(d)| d))
    }

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => super::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }
}

/// Parses a duration like `500ms`, `30s`, `30min` or `1h`.
///
/// A number without unit is treated as seconds.
pub fn parse(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let value: String = s.chars().take_while(|c| c.is_numeric()).collect();
    let value: u64 = value
        .parse()
        .map_err(|_| format!("Invalid number in duration: {s}"))?;
    let unit_part: String = s.chars().skip_while(|c| c.is_numeric()).collect();

    #[allow(clippy::type_complexity)]
    let supported_units: &[(&'static str, Box<dyn Fn(u64) -> Option<Duration>>)] = &[
        ("ns", Box::new(|v| Some(Duration::from_nanos(v)))),
        ("us", Box::new(|v| Some(Duration::from_micros(v)))),
        ("µs", Box::new(|v| Some(Duration::from_micros(v)))),
        ("ms", Box::new(|v| Some(Duration::from_millis(v)))),
        ("", Box::new(|v| Some(Duration::from_secs(v)))),
        ("s", Box::new(|v| Some(Duration::from_secs(v)))),
        ("m", Box::new(|v| v.checked_mul(60).map(Duration::from_secs))),
        ("min", Box::new(|v| v.checked_mul(60).map(Duration::from_secs))),
        ("h", Box::new(|v| v.checked_mul(60 * 60).map(Duration::from_secs))),
    ];
    for (u, f) in supported_units {
        if u == &unit_part.trim() {
            return f(value).ok_or_else(|| format!("Duration out of range: {s}"));
        }
    }
    let supported_units = supported_units
        .iter()
        .map(|(k, _)| k)
        .filter(|k| !k.is_empty())
        .fold(String::default(), |a, b| {
            if a.is_empty() {
                b.to_string()
            } else {
                format!("{a}, {b}")
            }
        });
    Err(format!(
        "Unknown duration unit '{unit_part}' only '{supported_units}' are supported",
    ))
}

fn format_duration(duration: &Duration) -> String {
    if duration.as_nanos().is_multiple_of(1_000_000) {
        let ms = duration.as_millis();
        if !ms.is_multiple_of(1000) {
            format!("{ms}ms")
        } else if ms > 0 && ms.is_multiple_of(60 * 60 * 1000) {
            format!("{}h", ms / (60 * 60 * 1000))
        } else if ms > 0 && ms.is_multiple_of(60 * 1000) {
            format!("{}min", ms / (60 * 1000))
        } else {
            format!("{}s", ms / 1000)
        }
    } else {
        format!("{}ns", duration.as_nanos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!(parse("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse("30min").unwrap(), Duration::from_secs(30 * 60));
        assert_eq!(parse("2h").unwrap(), Duration::from_secs(2 * 60 * 60));
        assert_eq!(parse("42").unwrap(), Duration::from_secs(42));
        assert!(parse("5 fortnights").is_err());
        assert!(parse("s").is_err());
    }

    #[test]
    fn rejects_overflowing_values() {
        assert!(parse("999999999999999999min").is_err());
        assert!(parse("999999999999999999m").is_err());
        assert!(parse("999999999999999999h").is_err());
        assert_eq!(
            parse("999999999999999999s").unwrap(),
            Duration::from_secs(999_999_999_999_999_999)
        );
    }

    #[test]
    fn formats_with_largest_unit() {
        assert_eq!(format_duration(&Duration::from_secs(30 * 60)), "30min");
        assert_eq!(format_duration(&Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(&Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(&Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(&Duration::from_nanos(10)), "10ns");
        assert_eq!(format_duration(&Duration::ZERO), "0s");
    }

    #[test]
    fn deserialize_map_format() {
        #[derive(serde::Deserialize)]
        struct T(#[serde(deserialize_with = "deserialize")] Duration);
        let json = r#"{"secs": 3600, "nanos": 500000000}"#;
        let T(duration) = serde_json::from_str(json).unwrap();
        assert_eq!(duration, Duration::new(3600, 500_000_000));
    }
}
