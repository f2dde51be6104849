//! Error type shared by every Cubist crate.
//!
//! Payloads are kept as strings so the error is `Clone`: a failed bootstrap is
//! stored once and handed to every later snapshot request.

use std::fmt;

pub type CuResult<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
	NotFound(String),
	/// Two entities share the same reconciliation key
	DuplicateKey(String),
	Parse(String),
	ValidationError(String),
	/// Error reported by a source connector or an executor
	Connector(String),
	Internal(String),

	// externals
	Io(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::NotFound(what) => write!(f, "not found: {}", what),
			Error::DuplicateKey(key) => write!(f, "duplicate key: {}", key),
			Error::Parse(msg) => write!(f, "parse error: {}", msg),
			Error::ValidationError(msg) => write!(f, "invalid settings: {}", msg),
			Error::Connector(msg) => write!(f, "connector error: {}", msg),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(msg) => write!(f, "io error: {}", msg),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Error::Io(err.to_string())
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Parse(format!("json: {}", err))
	}
}

impl From<serde_yaml::Error> for Error {
	fn from(err: serde_yaml::Error) -> Self {
		Error::Parse(format!("yaml: {}", err))
	}
}

impl From<csv::Error> for Error {
	fn from(err: csv::Error) -> Self {
		Error::Parse(format!("csv: {}", err))
	}
}

// vim: ts=4
