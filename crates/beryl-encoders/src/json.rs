//! JSON wire conventions.
//!
//! Map key order is preserved end to end (serde_json's `preserve_order`
//! feature); this module carries the remaining conventions: datetimes are
//! emitted at whole-second precision, and numeric sequences serialize as
//! plain JSON arrays.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Format a datetime for the wire, dropping sub-second precision.
///
/// # Examples
///
/// ```
/// use beryl_encoders::json::format_datetime;
/// use chrono::{TimeZone, Utc};
///
/// let dt = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap()
///     + chrono::Duration::microseconds(123456);
/// assert_eq!(format_datetime(&dt), "2024-05-01T12:30:45+00:00");
/// ```
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
	dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parse an RFC 3339 string and re-emit it at whole-second precision.
pub fn normalize_datetime(raw: &str) -> Result<String, String> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| format_datetime(&dt.with_timezone(&Utc)))
		.map_err(|e| format!("invalid datetime: {e}"))
}

/// Serialize a numeric slice as a JSON array value.
pub fn number_array<T: Copy + Into<f64>>(values: &[T]) -> Value {
	Value::Array(
		values
			.iter()
			.map(|v| {
				serde_json::Number::from_f64((*v).into())
					.map(Value::Number)
					.unwrap_or(Value::Null)
			})
			.collect(),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_normalize_strips_microseconds() {
		let normalized = normalize_datetime("2024-05-01T12:30:45.123456Z").unwrap();
		assert_eq!(normalized, "2024-05-01T12:30:45+00:00");
	}

	#[rstest]
	fn test_normalize_converts_offset_to_utc() {
		let normalized = normalize_datetime("2024-05-01T14:30:45+02:00").unwrap();
		assert_eq!(normalized, "2024-05-01T12:30:45+00:00");
	}

	#[rstest]
	fn test_normalize_rejects_garbage() {
		assert!(normalize_datetime("yesterday").is_err());
	}

	#[rstest]
	fn test_number_array() {
		let value = number_array(&[1.5f64, 2.0, 3.25]);
		assert_eq!(value, serde_json::json!([1.5, 2.0, 3.25]));
	}

	#[rstest]
	fn test_map_order_is_preserved() {
		// preserve_order keeps insertion order on the wire.
		let mut map = serde_json::Map::new();
		map.insert("zebra".into(), Value::from(1));
		map.insert("alpha".into(), Value::from(2));
		map.insert("middle".into(), Value::from(3));

		let rendered = serde_json::to_string(&Value::Object(map)).unwrap();
		assert_eq!(rendered, r#"{"zebra":1,"alpha":2,"middle":3}"#);
	}
}
