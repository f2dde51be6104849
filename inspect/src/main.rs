//! Boots a settings manager from a settings file and prints every data cube
//! with its source, whether it is queryable, and its latest known event time.
//!
//! Configuration comes from the environment:
//! - `CUBIST_SETTINGS`: settings file (default `./config.yaml`)
//! - `CUBIST_ANCHOR`: directory native files are resolved against (default:
//!   the settings file's directory)
//! - `CUBIST_TIMEOUT_MS`: how long to wait for the registry (default 30000)
//! - `RUST_LOG`: log filter

#![forbid(unsafe_code)]

use std::{
	env,
	path::{Path, PathBuf},
	process::ExitCode,
	sync::Arc,
	time::Duration,
};
use tracing::{error, info};

use cubist_core::{GetSettingsOptions, SettingsManager, SettingsManagerOptions, SettingsStore};
use cubist_types::{
	AppSettings, Cluster, ConnectorFactory, CuResult, DataCubeSource, Error, SourceConnector,
	Timekeeper,
};

pub struct Config {
	pub settings_path: PathBuf,
	pub anchor_path: PathBuf,
	pub timeout: Duration,
}

impl Config {
	fn from_env() -> Self {
		let settings_path =
			PathBuf::from(env::var("CUBIST_SETTINGS").unwrap_or_else(|_| "./config.yaml".into()));
		let anchor_path = env::var("CUBIST_ANCHOR").map_or_else(
			|_| settings_path.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf),
			PathBuf::from,
		);
		let timeout = env::var("CUBIST_TIMEOUT_MS")
			.ok()
			.and_then(|ms| ms.parse().ok())
			.map_or(Duration::from_secs(30), Duration::from_millis);
		Config { settings_path, anchor_path, timeout }
	}
}

/// No cluster connectors are linked into this binary; clustered cubes are
/// listed as configured but stay unqueryable.
struct NoConnectors;

impl ConnectorFactory for NoConnectors {
	fn connector(&self, cluster: &Cluster) -> CuResult<Arc<dyn SourceConnector>> {
		Err(Error::NotFound(format!("connector for cluster type '{}'", cluster.kind)))
	}
}

fn print_settings(settings: &AppSettings, timekeeper: &Timekeeper) {
	if let Some(title) = &settings.customization.title {
		println!("{}", title);
	}
	println!("{} clusters, {} data cubes", settings.clusters.len(), settings.data_cubes.len());
	for cube in &settings.data_cubes {
		let source = match &cube.source {
			DataCubeSource::Native { path } => format!("file {}", path),
			DataCubeSource::Clustered { cluster, source } => format!("{}/{}", cluster, source),
		};
		let max_time = timekeeper
			.time_for(cube)
			.map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
		println!(
			"{:<24} {:<32} {:<12} {}",
			cube.name,
			source,
			if cube.is_queryable() { "queryable" } else { "unqueryable" },
			max_time
		);
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_target(false)
		.init();

	let config = Config::from_env();
	info!("Loading settings from {}", config.settings_path.display());

	let manager = SettingsManager::new(
		SettingsStore::from_path(config.settings_path),
		Arc::new(NoConnectors),
		SettingsManagerOptions {
			anchor_path: config.anchor_path,
			initial_load_timeout: config.timeout,
			..Default::default()
		},
	);

	let res = manager.get_settings(GetSettingsOptions::default()).await;
	if res.is_ok() {
		manager.check_times_now().await;
	}
	manager.stop();

	match res {
		Ok(settings) => {
			print_settings(&settings, &manager.timekeeper());
			ExitCode::SUCCESS
		}
		Err(err) => {
			error!("Cannot load settings: {}", err);
			ExitCode::FAILURE
		}
	}
}

// vim: ts=4
