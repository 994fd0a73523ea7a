//! Internal error type for DecSync helpers.
//!
//! Per the engine's best-effort design, no public method surfaces these to
//! callers: every public operation logs and moves on instead of returning
//! `Result`. This type exists purely so internal I/O/parsing helpers can use
//! `?` instead of threading `Option`/bool sentinels everywhere.

use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum DecsyncError {
	/// Filesystem I/O failure.
	Io(io::Error),

	/// A JSON value failed to parse or had an unexpected shape.
	Json { message: String },

	/// Anything else (undecodable path segment, missing listener, ...).
	Other { message: String },
}

impl fmt::Display for DecsyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DecsyncError::Io(e) => write!(f, "I/O error: {}", e),
			DecsyncError::Json { message } => write!(f, "JSON error: {}", message),
			DecsyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for DecsyncError {}

impl From<io::Error> for DecsyncError {
	fn from(e: io::Error) -> Self {
		DecsyncError::Io(e)
	}
}

impl From<serde_json::Error> for DecsyncError {
	fn from(e: serde_json::Error) -> Self {
		DecsyncError::Json { message: e.to_string() }
	}
}

impl From<String> for DecsyncError {
	fn from(message: String) -> Self {
		DecsyncError::Other { message }
	}
}

pub type Result<T> = std::result::Result<T, DecsyncError>;

// vim: ts=4
