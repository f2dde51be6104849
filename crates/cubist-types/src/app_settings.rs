//! Top-level settings snapshot

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::cluster::{Cluster, NATIVE_CLUSTER};
use crate::data_cube::{DataCube, DataCubeSource};
use crate::prelude::*;

/// Presentation settings passed through to the UI untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub timezones: Vec<String>,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Immutable snapshot of clusters, data cubes, and customization.
///
/// Every change produces a new value, nothing is mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
	#[serde(default)]
	pub clusters: Vec<Cluster>,
	#[serde(default)]
	pub data_cubes: Vec<DataCube>,
	#[serde(default)]
	pub customization: Customization,
}

impl AppSettings {
	pub fn cluster(&self, name: &str) -> Option<&Cluster> {
		self.clusters.iter().find(|c| c.name == name)
	}

	pub fn data_cube(&self, name: &str) -> Option<&DataCube> {
		self.data_cubes.iter().find(|c| c.name == name)
	}

	pub fn data_cubes_for_cluster<'a>(
		&'a self,
		cluster_name: &'a str,
	) -> impl Iterator<Item = &'a DataCube> + 'a {
		self.data_cubes.iter().filter(move |c| match &c.source {
			DataCubeSource::Clustered { cluster, .. } => cluster == cluster_name,
			DataCubeSource::Native { .. } => false,
		})
	}

	pub fn native_data_cubes(&self) -> impl Iterator<Item = &DataCube> {
		self.data_cubes.iter().filter(|c| c.is_native())
	}

	/// Replaces the cube with the same name, or appends it
	pub fn add_or_update_data_cube(&self, cube: DataCube) -> AppSettings {
		let mut data_cubes = self.data_cubes.clone();
		match data_cubes.iter_mut().find(|c| c.name == cube.name) {
			Some(existing) => *existing = cube,
			None => data_cubes.push(cube),
		}
		AppSettings { data_cubes, ..self.clone() }
	}

	pub fn delete_data_cube(&self, name: &str) -> AppSettings {
		let data_cubes = self.data_cubes.iter().filter(|c| c.name != name).cloned().collect();
		AppSettings { data_cubes, ..self.clone() }
	}

	pub fn validate(&self) -> CuResult<()> {
		let mut cluster_names = HashSet::new();
		for cluster in &self.clusters {
			cluster.validate()?;
			if !cluster_names.insert(cluster.name.as_str()) {
				return Err(Error::ValidationError(format!(
					"duplicate cluster name '{}'",
					cluster.name
				)));
			}
		}

		let mut cube_names = HashSet::new();
		for cube in &self.data_cubes {
			cube.validate()?;
			if !cube_names.insert(cube.name.as_str()) {
				return Err(Error::ValidationError(format!(
					"duplicate data cube name '{}'",
					cube.name
				)));
			}
			let cluster_name = cube.cluster_name();
			if cluster_name != NATIVE_CLUSTER && !cluster_names.contains(cluster_name) {
				return Err(Error::ValidationError(format!(
					"data cube '{}' refers to unknown cluster '{}'",
					cube.name, cluster_name
				)));
			}
		}
		Ok(())
	}
}


// vim: ts=4
