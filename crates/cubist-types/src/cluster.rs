//! Cluster descriptor
//!
//! A cluster is one configured query-engine endpoint hosting zero or more
//! sources. Durations are configured in milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::prelude::*;

/// Reserved cluster name for file-backed data cubes
pub const NATIVE_CLUSTER: &str = "native";

/// Whether a cluster's source list is scanned for new sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceListScan {
	#[serde(rename = "disable")]
	Disable,
	#[default]
	#[serde(rename = "auto")]
	Auto,
}

fn default_kind() -> String {
	"druid".into()
}

fn default_timeout() -> u64 {
	40_000
}

fn default_introspection_strategy() -> String {
	"segment-metadata-fallback".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
	pub name: String,
	#[serde(rename = "type", default = "default_kind")]
	pub kind: String,
	#[serde(default)]
	pub url: String,
	/// Request timeout handed to the connector (ms)
	#[serde(default = "default_timeout")]
	pub timeout: u64,
	#[serde(default)]
	pub source_list_scan: SourceListScan,
	/// Scan the source list on every refresh, regardless of the interval
	#[serde(default)]
	pub source_list_refresh_on_load: bool,
	/// 0 disables periodic source list scans (ms)
	#[serde(default)]
	pub source_list_refresh_interval: u64,
	/// Reintrospect known sources on every refresh, regardless of the interval
	#[serde(default)]
	pub source_reintrospect_on_load: bool,
	/// 0 disables periodic reintrospection (ms)
	#[serde(default)]
	pub source_reintrospect_interval: u64,
	#[serde(default = "default_introspection_strategy")]
	pub introspection_strategy: String,
	#[serde(default)]
	pub guard_data_cubes: bool,
}

impl Cluster {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: default_kind(),
			url: String::new(),
			timeout: default_timeout(),
			source_list_scan: SourceListScan::Auto,
			source_list_refresh_on_load: false,
			source_list_refresh_interval: 0,
			source_reintrospect_on_load: false,
			source_reintrospect_interval: 0,
			introspection_strategy: default_introspection_strategy(),
			guard_data_cubes: false,
		}
	}

	pub fn validate(&self) -> CuResult<()> {
		if self.name.is_empty() {
			return Err(Error::ValidationError("cluster must have a name".into()));
		}
		if self.name == NATIVE_CLUSTER {
			return Err(Error::ValidationError(format!(
				"cluster name '{}' is reserved",
				NATIVE_CLUSTER
			)));
		}
		Ok(())
	}

	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout)
	}

	pub fn source_list_refresh_interval(&self) -> Option<Duration> {
		non_zero_millis(self.source_list_refresh_interval)
	}

	pub fn source_reintrospect_interval(&self) -> Option<Duration> {
		non_zero_millis(self.source_reintrospect_interval)
	}

	pub fn scans_source_list(&self) -> bool {
		self.source_list_scan == SourceListScan::Auto
	}
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
	(ms > 0).then(|| Duration::from_millis(ms))
}


// vim: ts=4
