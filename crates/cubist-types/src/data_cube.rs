//! Data cube descriptor
//!
//! A data cube is one named, queryable dataset definition. It is backed either
//! by a local file (native) or by a source living on a configured cluster.
//! Every "mutation" returns a new value; the settings snapshot swaps whole
//! cubes by name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, sync::Arc};

use crate::cluster::{Cluster, NATIVE_CLUSTER};
use crate::dataset::{Dataset, DatasetExecutor, Row};
use crate::external::{AttributeInfo, AttributeType, Executor, External};
use crate::prelude::*;

/// Where a data cube's rows come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataCubeSource {
	/// Local file, resolved against the anchor directory
	Native { path: String },
	/// Source hosted on a configured cluster
	Clustered { cluster: String, source: String },
}

impl DataCubeSource {
	pub fn cluster_name(&self) -> &str {
		match self {
			DataCubeSource::Native { .. } => NATIVE_CLUSTER,
			DataCubeSource::Clustered { cluster, .. } => cluster,
		}
	}

	pub fn source_name(&self) -> &str {
		match self {
			DataCubeSource::Native { path } => path,
			DataCubeSource::Clustered { source, .. } => source,
		}
	}
}

/// How introspected attributes flow into dimensions and measures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntrospectionMode {
	/// Never introspect, use the declared attributes as they are
	None,
	#[default]
	NoAutofill,
	AutofillDimensionsOnly,
	AutofillMeasuresOnly,
	AutofillAll,
}

impl IntrospectionMode {
	fn fills_dimensions(self) -> bool {
		matches!(self, IntrospectionMode::AutofillDimensionsOnly | IntrospectionMode::AutofillAll)
	}

	fn fills_measures(self) -> bool {
		matches!(self, IntrospectionMode::AutofillMeasuresOnly | IntrospectionMode::AutofillAll)
	}
}

/// Policy for determining a data cube's latest event time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "lowercase")]
pub enum RefreshRule {
	Fixed {
		time: DateTime<Utc>,
	},
	Realtime,
	#[default]
	Query,
}

impl RefreshRule {
	pub fn is_query(&self) -> bool {
		matches!(self, RefreshRule::Query)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
	String,
	Time,
	Boolean,
	Number,
}

impl From<AttributeType> for DimensionKind {
	fn from(kind: AttributeType) -> Self {
		match kind {
			AttributeType::Time => DimensionKind::Time,
			AttributeType::String => DimensionKind::String,
			AttributeType::Number => DimensionKind::Number,
			AttributeType::Boolean => DimensionKind::Boolean,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	pub formula: String,
	#[serde(default = "default_dimension_kind")]
	pub kind: DimensionKind,
}

fn default_dimension_kind() -> DimensionKind {
	DimensionKind::String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	pub formula: String,
}

/// Static row filter applied to native datasets: keep rows whose attribute is
/// one of `values`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetFilter {
	pub attribute: String,
	pub values: Vec<String>,
}

impl SubsetFilter {
	pub fn matches(&self, row: &Row) -> bool {
		row.get(&self.attribute)
			.and_then(crate::dataset::Value::to_text)
			.is_some_and(|text| self.values.iter().any(|v| *v == text))
	}
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "DataCubeConfig", into = "DataCubeConfig")]
pub struct DataCube {
	pub name: String,
	pub title: Option<String>,
	pub source: DataCubeSource,
	pub introspection: IntrospectionMode,
	pub attributes: Vec<AttributeInfo>,
	pub time_attribute: String,
	pub dimensions: Vec<Dimension>,
	pub measures: Vec<Measure>,
	pub refresh_rule: RefreshRule,
	pub subset: Option<SubsetFilter>,
	/// Attached once the backing source is introspected or loaded
	pub executor: Option<Arc<dyn Executor>>,
}

impl DataCube {
	pub fn new(name: impl Into<String>, source: DataCubeSource) -> Self {
		Self {
			name: name.into(),
			title: None,
			source,
			introspection: IntrospectionMode::default(),
			attributes: Vec::new(),
			time_attribute: default_time_attribute(),
			dimensions: Vec::new(),
			measures: Vec::new(),
			refresh_rule: RefreshRule::default(),
			subset: None,
			executor: None,
		}
	}

	/// Synthesizes a cube for an auto-discovered source
	pub fn from_cluster_and_external(name: &str, cluster: &Cluster, external: &External) -> Self {
		let source = DataCubeSource::Clustered {
			cluster: cluster.name.clone(),
			source: external.source.clone(),
		};
		let mut cube = DataCube::new(name, source);
		cube.title = Some(external.source.clone());
		cube.introspection = IntrospectionMode::AutofillAll;
		cube.refresh_rule = RefreshRule::Query;
		cube.update_with_external(external)
	}

	pub fn cluster_name(&self) -> &str {
		self.source.cluster_name()
	}

	pub fn is_native(&self) -> bool {
		matches!(self.source, DataCubeSource::Native { .. })
	}

	pub fn is_queryable(&self) -> bool {
		self.executor.is_some()
	}

	pub fn introspection(&self) -> IntrospectionMode {
		self.introspection
	}

	/// External carrying the declared schema, used when introspection is suppressed
	pub fn to_external(&self) -> External {
		External::new(self.source.source_name()).with_attributes(self.attributes.clone())
	}

	/// Merges a freshly introspected schema and its executor
	pub fn update_with_external(&self, external: &External) -> DataCube {
		let mut cube = self.clone();
		if cube.introspection != IntrospectionMode::None {
			cube.attributes.clone_from(&external.attributes);
		}
		cube.executor.clone_from(&external.executor);
		cube.autofill();
		cube
	}

	/// Merges a freshly loaded file dataset
	pub fn update_with_dataset(&self, dataset: Dataset) -> DataCube {
		let mut cube = self.clone();
		if cube.introspection != IntrospectionMode::None {
			cube.attributes.clone_from(&dataset.attributes);
		}
		cube.executor = Some(Arc::new(DatasetExecutor::new(Arc::new(dataset))));
		cube.autofill();
		cube
	}

	/// Latest event time according to the attached executor
	pub async fn query_max_time(&self) -> CuResult<DateTime<Utc>> {
		let executor = self
			.executor
			.as_ref()
			.ok_or_else(|| Error::NotFound(format!("executor for data cube '{}'", self.name)))?;
		executor
			.max_time(&self.time_attribute)
			.await?
			.ok_or_else(|| Error::NotFound(format!("max time for data cube '{}'", self.name)))
	}

	fn autofill(&mut self) {
		let mode = self.introspection;
		if mode.fills_dimensions() {
			for attr in &self.attributes {
				if attr.kind == AttributeType::Number && attr.name != self.time_attribute {
					continue;
				}
				if self.dimensions.iter().any(|d| d.name == attr.name) {
					continue;
				}
				let kind = if attr.name == self.time_attribute {
					DimensionKind::Time
				} else {
					attr.kind.into()
				};
				self.dimensions.push(Dimension {
					name: attr.name.clone(),
					title: None,
					formula: format!("${}", attr.name),
					kind,
				});
			}
		}
		if mode.fills_measures() {
			if !self.measures.iter().any(|m| m.name == "count") {
				self.measures.push(Measure {
					name: "count".into(),
					title: Some("Count".into()),
					formula: "$main.count()".into(),
				});
			}
			for attr in self.attributes.iter().filter(|a| a.kind == AttributeType::Number) {
				if self.measures.iter().any(|m| m.name == attr.name) {
					continue;
				}
				self.measures.push(Measure {
					name: attr.name.clone(),
					title: None,
					formula: format!("$main.sum(${})", attr.name),
				});
			}
		}
	}

	pub fn validate(&self) -> CuResult<()> {
		if self.name.is_empty() {
			return Err(Error::ValidationError("data cube must have a name".into()));
		}
		if self.source.source_name().is_empty() {
			return Err(Error::ValidationError(format!(
				"data cube '{}' must have a source",
				self.name
			)));
		}
		if self.introspection == IntrospectionMode::None
			&& !self.is_native()
			&& self.attributes.is_empty()
		{
			return Err(Error::ValidationError(format!(
				"data cube '{}': introspection is disabled but no attributes are declared",
				self.name
			)));
		}
		if self.subset.is_some() && !self.is_native() {
			return Err(Error::ValidationError(format!(
				"data cube '{}': subset filters are only supported on native cubes",
				self.name
			)));
		}
		Ok(())
	}
}

impl PartialEq for DataCube {
	fn eq(&self, other: &Self) -> bool {
		let same_executor = match (&self.executor, &other.executor) {
			(Some(a), Some(b)) => Arc::ptr_eq(a, b),
			(None, None) => true,
			_ => false,
		};
		same_executor
			&& self.name == other.name
			&& self.title == other.title
			&& self.source == other.source
			&& self.introspection == other.introspection
			&& self.attributes == other.attributes
			&& self.time_attribute == other.time_attribute
			&& self.dimensions == other.dimensions
			&& self.measures == other.measures
			&& self.refresh_rule == other.refresh_rule
			&& self.subset == other.subset
	}
}

impl Debug for DataCube {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DataCube")
			.field("name", &self.name)
			.field("source", &self.source)
			.field("introspection", &self.introspection)
			.field("attributes", &self.attributes.len())
			.field("dimensions", &self.dimensions.len())
			.field("measures", &self.measures.len())
			.field("refresh_rule", &self.refresh_rule)
			.field("queryable", &self.is_queryable())
			.finish()
	}
}

fn default_time_attribute() -> String {
	"time".into()
}

// Config representation
//***********************
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataCubeConfig {
	name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	title: Option<String>,
	cluster_name: String,
	source: String,
	#[serde(default)]
	introspection: IntrospectionMode,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	attributes: Vec<AttributeInfo>,
	#[serde(default = "default_time_attribute")]
	time_attribute: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	dimensions: Vec<Dimension>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	measures: Vec<Measure>,
	#[serde(default)]
	refresh_rule: RefreshRule,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	subset: Option<SubsetFilter>,
}

impl TryFrom<DataCubeConfig> for DataCube {
	type Error = Error;

	fn try_from(config: DataCubeConfig) -> CuResult<Self> {
		let source = if config.cluster_name == NATIVE_CLUSTER {
			DataCubeSource::Native { path: config.source }
		} else {
			DataCubeSource::Clustered { cluster: config.cluster_name, source: config.source }
		};
		let cube = DataCube {
			name: config.name,
			title: config.title,
			source,
			introspection: config.introspection,
			attributes: config.attributes,
			time_attribute: config.time_attribute,
			dimensions: config.dimensions,
			measures: config.measures,
			refresh_rule: config.refresh_rule,
			subset: config.subset,
			executor: None,
		};
		cube.validate()?;
		Ok(cube)
	}
}

impl From<DataCube> for DataCubeConfig {
	fn from(cube: DataCube) -> Self {
		let (cluster_name, source) = match cube.source {
			DataCubeSource::Native { path } => (NATIVE_CLUSTER.to_string(), path),
			DataCubeSource::Clustered { cluster, source } => (cluster, source),
		};
		DataCubeConfig {
			name: cube.name,
			title: cube.title,
			cluster_name,
			source,
			introspection: cube.introspection,
			attributes: cube.attributes,
			time_attribute: cube.time_attribute,
			dimensions: cube.dimensions,
			measures: cube.measures,
			refresh_rule: cube.refresh_rule,
			subset: cube.subset,
		}
	}
}


// vim: ts=4
