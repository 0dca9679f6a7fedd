//! Filter evaluation and ordering over JSON document bodies.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use lumen_core::types::query::{FieldValue, Filter};

/// Whether a document body satisfies every filter.
pub(crate) fn matches(data: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(field, expected) => data
            .get(field)
            .and_then(|v| compare(v, expected))
            .is_some_and(Ordering::is_eq),
        Filter::Gt(field, expected) => data
            .get(field)
            .and_then(|v| compare(v, expected))
            .is_some_and(Ordering::is_gt),
        Filter::In(field, candidates) => data.get(field).is_some_and(|v| {
            candidates
                .iter()
                .any(|c| compare(v, c).is_some_and(Ordering::is_eq))
        }),
    })
}

/// Compare a stored value against a filter operand. `None` if the types
/// are not comparable.
fn compare(stored: &Value, expected: &FieldValue) -> Option<Ordering> {
    match expected {
        FieldValue::Bool(b) => stored.as_bool().map(|v| v.cmp(b)),
        FieldValue::Int(i) => stored.as_i64().map(|v| v.cmp(i)),
        FieldValue::Str(s) => stored.as_str().map(|v| v.cmp(s.as_str())),
        FieldValue::Timestamp(t) => as_instant(stored).map(|v| v.cmp(t)),
    }
}

/// Interpret a stored value as an instant: RFC 3339 string, epoch millis,
/// or a `{seconds, nanoseconds}` object.
pub(crate) fn as_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(parts) => {
            let seconds = parts.get("seconds")?.as_i64()?;
            let nanos = parts
                .get("nanoseconds")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
        }
        _ => None,
    }
}

/// Total order used for `order_by`. Instants compare as instants so mixed
/// offsets sort correctly.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    if let (Some(x), Some(y)) = (as_instant(a), as_instant(b)) {
        return x.cmp(&y);
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
