use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde_json::{Map, Value};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Snapshots are stamped in UTC+8 regardless of the host timezone.
fn beijing() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix())
}

/// Current time as `YYYY-MM-DD HH:MM:SS` in UTC+8.
pub fn now_formatted() -> String {
    format_datetime(Utc::now())
}

/// Formats a unix timestamp in UTC+8. Out-of-range values format as the epoch.
pub fn format_unix_time(secs: i64) -> String {
    format_datetime(DateTime::from_timestamp(secs, 0).unwrap_or_default())
}

fn format_datetime(time: DateTime<Utc>) -> String {
    time.with_timezone(&beijing())
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Lenient integer coercion for upstream numbers.
///
/// Integers pass through, booleans become 0/1, floats are truncated and
/// strings made only of ASCII digits are parsed. Integers outside the `i64`
/// range and everything else are `None`.
pub fn safe_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64),
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// First candidate that is a non-empty string.
pub fn first_non_empty_str<'a>(candidates: &[Option<&'a Value>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|v| v.and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// First candidate that is a JSON object.
pub fn first_object<'a>(candidates: &[Option<&'a Value>]) -> Option<&'a Map<String, Value>> {
    candidates.iter().find_map(|v| v.and_then(Value::as_object))
}

/// First candidate that is a JSON integer (no string coercion).
pub fn first_integer(candidates: &[Option<&Value>]) -> Option<i64> {
    candidates.iter().find_map(|v| v.and_then(Value::as_i64))
}

/// Human-readable viewer text such as "1.7万+". Numbers are stringified.
pub fn display_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
