//! URL-style encoding of Unicode path segments to filesystem-safe names.
//!
//! A DecSync path is an ordered list of Unicode strings; each segment is
//! encoded independently so it can be used as a single filesystem component,
//! then segments are joined with `/` to form a relative path.

/// Encode a single path segment. Every byte of the segment's UTF-8
/// representation that is not ASCII alphanumeric or one of `-_.~` is
/// replaced with `%XX` (uppercase hex). A leading `.` in the result is
/// rewritten to `%2E` so encoded names never collide with hidden files.
pub fn encode_segment(segment: &str) -> String {
	let mut out = String::with_capacity(segment.len());
	for &b in segment.as_bytes() {
		if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
			out.push(b as char);
		} else {
			out.push('%');
			out.push_str(&format!("{:02X}", b));
		}
	}
	if out.starts_with('.') {
		out.replace_range(0..1, "%2E");
	}
	out
}

/// Encode an ordered path into a `/`-joined relative path string.
pub fn encode_path<S: AsRef<str>>(path: &[S]) -> String {
	path.iter().map(|s| encode_segment(s.as_ref())).collect::<Vec<_>>().join("/")
}

/// Decode a single encoded segment. Returns `None` if a `%` is not followed
/// by exactly two hex digits, or if the decoded bytes are not valid UTF-8.
pub fn decode_segment(segment: &str) -> Option<String> {
	let bytes = segment.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;
	while i < bytes.len() {
		if bytes[i] == b'%' {
			if i + 3 > bytes.len() {
				return None;
			}
			let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
			let byte = u8::from_str_radix(hex, 16).ok()?;
			out.push(byte);
			i += 3;
		} else {
			out.push(bytes[i]);
			i += 1;
		}
	}
	String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encodes_alphanumerics_and_unreserved_chars_literally() {
		assert_eq!(encode_segment("abc-_.~XYZ09"), "abc-_.~XYZ09");
	}

	#[test]
	fn encodes_space_and_slash() {
		assert_eq!(encode_segment("a b/c"), "a%20b%2Fc");
	}

	#[test]
	fn rewrites_leading_dot() {
		assert_eq!(encode_segment(".hidden"), "%2Ehidden");
	}

	#[test]
	fn encodes_non_ascii_utf8_byte_by_byte() {
		// 'é' is 0xC3 0xA9 in UTF-8.
		assert_eq!(encode_segment("é"), "%C3%A9");
	}

	#[test]
	fn round_trips_arbitrary_unicode() {
		for s in ["hello", "a b/c", ".hidden", "日本語", "100%", "a%b"] {
			let encoded = encode_segment(s);
			assert_eq!(decode_segment(&encoded).as_deref(), Some(s));
			assert!(!encoded.starts_with('.'));
		}
	}

	#[test]
	fn decode_rejects_truncated_percent_escape() {
		assert_eq!(decode_segment("abc%2"), None);
		assert_eq!(decode_segment("abc%"), None);
	}

	#[test]
	fn decode_rejects_non_hex_escape() {
		assert_eq!(decode_segment("abc%ZZ"), None);
	}

	#[test]
	fn encode_path_joins_segments_with_slash() {
		let path = vec!["info".to_string(), "a b".to_string()];
		assert_eq!(encode_path(&path), "info/a%20b");
	}
}

// vim: ts=4
