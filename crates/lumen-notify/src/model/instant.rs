//! Serde adapter for timestamps.
//!
//! Stored records carry instants as RFC 3339 strings with any offset, as
//! epoch milliseconds, or as `{seconds, nanoseconds}` objects. All of them
//! decode to a UTC instant; serialization always emits an RFC 3339 UTC
//! string with millisecond precision.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInstant {
    Text(String),
    Millis(i64),
    Parts {
        seconds: i64,
        #[serde(default)]
        nanoseconds: u32,
    },
}

/// Canonical text form of an instant.
pub fn format(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serialize as canonical text.
pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(at))
}

/// Deserialize from any supported stored representation.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    match RawInstant::deserialize(deserializer)? {
        RawInstant::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{text}': {e}"))),
        RawInstant::Millis(millis) => DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {millis}"))),
        RawInstant::Parts {
            seconds,
            nanoseconds,
        } => DateTime::from_timestamp(seconds, nanoseconds)
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {seconds}s"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(deserialize_with = "deserialize")]
        at: DateTime<Utc>,
    }

    fn parse(value: serde_json::Value) -> DateTime<Utc> {
        serde_json::from_value::<Wrapper>(json!({ "at": value }))
            .unwrap()
            .at
    }

    #[test]
    fn test_representations_agree() {
        let expected = parse(json!("2026-10-18T10:00:00Z"));
        assert_eq!(parse(json!("2026-10-18T12:00:00+02:00")), expected);
        assert_eq!(parse(json!(expected.timestamp_millis())), expected);
        assert_eq!(
            parse(json!({"seconds": expected.timestamp(), "nanoseconds": 0})),
            expected
        );
        assert_eq!(format(&expected), "2026-10-18T10:00:00.000Z");
    }

    #[test]
    fn test_garbage_rejected() {
        let result = serde_json::from_value::<Wrapper>(json!({"at": "yesterday"}));
        assert!(result.is_err());
    }
}
