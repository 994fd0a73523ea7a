//! The `Entry` type: a single timestamped key/value assignment, and its
//! on-disk line format.

use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

use crate::json_value::Value;

/// `(datetime, key, value)` — the unit of synchronization.
///
/// `datetime` is an ISO-8601 UTC string at second resolution
/// (`%Y-%m-%dT%H:%M:%S`, no fractional seconds, no timezone suffix), chosen
/// so lexicographic string order equals chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
	pub datetime: String,
	pub key: Value,
	pub value: Value,
}

impl Entry {
	pub fn new(datetime: impl Into<String>, key: Value, value: Value) -> Self {
		Entry { datetime: datetime.into(), key, value }
	}

	/// Stamp an entry with the current UTC time at second resolution.
	pub fn now(key: Value, value: Value) -> Self {
		Entry { datetime: format_now(), key, value }
	}
}

/// Format the current UTC time the way entries are timestamped.
pub fn format_now() -> String {
	chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

// Serialized as a bare 3-element JSON array, not an object, per the wire
// format: `[datetime, key, value]`.
impl Serialize for Entry {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut tup = serializer.serialize_tuple(3)?;
		tup.serialize_element(&self.datetime)?;
		tup.serialize_element(&self.key)?;
		tup.serialize_element(&self.value)?;
		tup.end()
	}
}

/// Parse one log line into an `Entry`. Returns `None` (caller logs a
/// warning) if the line is not valid JSON, not a 3-element array, or the
/// first element is not a string.
pub fn parse_entry_line(line: &str) -> Option<Entry> {
	let value: Value = serde_json::from_str(line.trim_end_matches(['\n', '\r'])).ok()?;
	let arr = value.as_array()?;
	if arr.len() != 3 {
		return None;
	}
	let datetime = arr[0].as_str()?.to_string();
	Some(Entry { datetime, key: arr[1].clone(), value: arr[2].clone() })
}

/// Serialize an entry to its single-line wire form, without a trailing
/// newline (callers append one when writing).
pub fn serialize_entry_line(entry: &Entry) -> String {
	// Entry's Serialize impl never fails for well-formed JSON values.
	serde_json::to_string(entry).expect("entry serialization cannot fail")
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn round_trips_through_line_format() {
		let entry = Entry::new("2024-01-02T03:04:05", json!("name"), json!("Work"));
		let line = serialize_entry_line(&entry);
		assert_eq!(line, r#"["2024-01-02T03:04:05","name","Work"]"#);
		assert_eq!(parse_entry_line(&line), Some(entry));
	}

	#[test]
	fn rejects_non_array_lines() {
		assert_eq!(parse_entry_line(r#"{"a":1}"#), None);
		assert_eq!(parse_entry_line("not json"), None);
	}

	#[test]
	fn rejects_wrong_length_arrays() {
		assert_eq!(parse_entry_line(r#"["a","b"]"#), None);
		assert_eq!(parse_entry_line(r#"["a","b","c","d"]"#), None);
	}

	#[test]
	fn rejects_non_string_datetime() {
		assert_eq!(parse_entry_line(r#"[1,"b","c"]"#), None);
	}

	#[test]
	fn now_has_second_resolution_iso8601_shape() {
		let dt = format_now();
		assert_eq!(dt.len(), 19);
		assert_eq!(dt.as_bytes()[10], b'T');
	}
}

// vim: ts=4
