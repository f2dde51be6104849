//! Externals and the connector seam
//!
//! An `External` is one discovered source as seen through a cluster connector:
//! its attribute list plus an executor able to answer metadata probes. The
//! connector and executor traits are implemented outside this workspace for
//! concrete query engines.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc};

use crate::cluster::Cluster;
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttributeType {
	Time,
	String,
	Number,
	Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeInfo {
	pub name: String,
	#[serde(rename = "type")]
	pub kind: AttributeType,
}

impl AttributeInfo {
	pub fn new(name: impl Into<String>, kind: AttributeType) -> Self {
		Self { name: name.into(), kind }
	}
}

/// Result of introspecting one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Introspection {
	pub attributes: Vec<AttributeInfo>,
}

/// Query-capable handle attached to a data cube.
///
/// Only metadata probes live here; analytical queries belong to the query
/// engine, which is not part of this workspace.
#[async_trait]
pub trait Executor: Send + Sync + Debug {
	/// Latest value of `time_attribute`, `None` when the source is empty
	async fn max_time(&self, time_attribute: &str) -> CuResult<Option<DateTime<Utc>>>;
}

/// Connection to one cluster
#[async_trait]
pub trait SourceConnector: Send + Sync {
	/// Verifies the cluster is reachable
	async fn check_connection(&self) -> CuResult<()> {
		Ok(())
	}

	async fn list_sources(&self) -> CuResult<Vec<String>>;

	async fn introspect(&self, source: &str, strategy: &str) -> CuResult<Introspection>;

	/// Executor bound to one source
	fn executor(&self, source: &str) -> Arc<dyn Executor>;
}

/// Builds the connector for a configured cluster
pub trait ConnectorFactory: Send + Sync {
	fn connector(&self, cluster: &Cluster) -> CuResult<Arc<dyn SourceConnector>>;
}

/// One source's live schema and executor
#[derive(Clone)]
pub struct External {
	pub source: String,
	pub attributes: Vec<AttributeInfo>,
	pub executor: Option<Arc<dyn Executor>>,
}

impl External {
	pub fn new(source: impl Into<String>) -> Self {
		Self { source: source.into(), attributes: Vec::new(), executor: None }
	}

	pub fn with_attributes(mut self, attributes: Vec<AttributeInfo>) -> Self {
		self.attributes = attributes;
		self
	}

	pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
		self.executor = Some(executor);
		self
	}

	/// Introspection finished: attributes known and an executor attached
	pub fn is_ready(&self) -> bool {
		!self.attributes.is_empty() && self.executor.is_some()
	}

	pub fn same_schema(&self, other: &External) -> bool {
		self.source == other.source && self.attributes == other.attributes
	}
}

impl Debug for External {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("External")
			.field("source", &self.source)
			.field("attributes", &self.attributes)
			.field("executor", &self.executor.is_some())
			.finish()
	}
}


// vim: ts=4
