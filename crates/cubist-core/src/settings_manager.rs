//! Settings manager. Top-level orchestrator of the data cube registry.
//!
//! Owns the current [`AppSettings`] snapshot, runs one [`ClusterManager`] per
//! cluster and one [`FileManager`] per native data cube, and folds everything
//! they report back into the snapshot. Readers always get a consistent
//! `Arc<AppSettings>`; writers replace it through pure functions under a single
//! write guard.

use futures::{FutureExt, future::join_all};
use parking_lot::{Mutex, RwLock};
use std::{collections::HashSet, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::watch;

use cubist_types::{
	AppSettings, Cluster, ConnectorFactory, DataCube, Dataset, External, IntrospectionMode,
	Timekeeper,
};

use crate::cluster_manager::{ClusterManager, ClusterManagerOptions, ExternalHandler, ManagedExternal};
use crate::file_manager::{FileManager, FileManagerOptions};
use crate::prelude::*;
use crate::settings_store::SettingsStore;
use crate::time_monitor::{self, TimeCheck, TimeMonitor};

pub struct SettingsManagerOptions {
	/// Relative file paths are resolved against this directory
	pub anchor_path: PathBuf,
	/// Default `get_settings()` timeout, zero waits forever
	pub initial_load_timeout: Duration,
	/// How old a max time may get before it is queried again
	pub time_check_interval: Duration,
	pub time_tick: Duration,
}

impl Default for SettingsManagerOptions {
	fn default() -> Self {
		Self {
			anchor_path: PathBuf::from("."),
			initial_load_timeout: Duration::from_secs(30),
			time_check_interval: time_monitor::DEFAULT_CHECK_INTERVAL,
			time_tick: time_monitor::DEFAULT_TICK,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct GetSettingsOptions {
	/// Overrides the configured timeout, `Some(Duration::ZERO)` waits forever
	pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
enum BootState {
	Pending,
	Ready,
	Failed(Error),
}

// Settings state
//****************
/// The part of the manager the cluster and file managers report into
struct SettingsState {
	app_settings: RwLock<Arc<AppSettings>>,
	/// Generated names handed out but not yet installed
	reserved_names: Mutex<HashSet<String>>,
	time_monitor: TimeMonitor,
}

impl SettingsState {
	fn current(&self) -> Arc<AppSettings> {
		self.app_settings.read().clone()
	}

	/// Registers a max time check for queryable cubes with a `query` refresh rule
	fn sync_time_check(&self, cube: &DataCube) {
		if cube.refresh_rule.is_query() && cube.is_queryable() {
			let check_cube = cube.clone();
			let check: TimeCheck = Arc::new(move || {
				let cube = check_cube.clone();
				async move { cube.query_max_time().await }.boxed()
			});
			self.time_monitor.add_check(&cube.name, check);
		} else if self.time_monitor.has_check(&cube.name) {
			self.time_monitor.remove_check(&cube.name);
		}
	}

	fn apply_external_change(&self, cluster: &Cluster, name: &str, external: &External) {
		if !external.is_ready() {
			debug!(data_cube = %name, "External not introspected yet, ignoring");
			return;
		}

		let cube = {
			let mut settings = self.app_settings.write();
			let cube = match settings.data_cube(name) {
				Some(existing) => existing.update_with_external(external),
				None => {
					info!(cluster = %cluster.name, data_cube = %name, "Adding discovered data cube");
					DataCube::from_cluster_and_external(name, cluster, external)
				}
			};
			*settings = Arc::new(settings.add_or_update_data_cube(cube.clone()));
			cube
		};
		self.reserved_names.lock().remove(name);
		self.sync_time_check(&cube);
	}

	fn apply_external_removal(&self, cluster: &Cluster, name: &str) {
		info!(cluster = %cluster.name, data_cube = %name, "Removing data cube");
		{
			let mut settings = self.app_settings.write();
			*settings = Arc::new(settings.delete_data_cube(name));
		}
		self.reserved_names.lock().remove(name);
		self.time_monitor.remove_check(name);
	}

	fn apply_dataset(&self, name: &str, dataset: Dataset) {
		let cube = {
			let mut settings = self.app_settings.write();
			let Some(existing) = settings.data_cube(name) else {
				warn!(data_cube = %name, "Dataset loaded for unknown data cube");
				return;
			};
			let cube = existing.update_with_dataset(dataset);
			*settings = Arc::new(settings.add_or_update_data_cube(cube.clone()));
			cube
		};
		self.sync_time_check(&cube);
	}

	/// URL-safe name derived from the source, suffixed until unique
	fn generate_data_cube_name(&self, external: &External) -> String {
		let settings = self.current();
		let mut reserved = self.reserved_names.lock();
		let name = cubist_types::utils::unique_name(&external.source, |candidate| {
			settings.data_cube(candidate).is_some() || reserved.contains(candidate)
		});
		reserved.insert(name.clone());
		name
	}
}

impl ExternalHandler for SettingsState {
	fn on_external_change(&self, cluster: &Cluster, name: &str, external: &External) {
		self.apply_external_change(cluster, name, external);
	}

	fn on_external_removed(&self, cluster: &Cluster, name: &str, _external: &External) {
		self.apply_external_removal(cluster, name);
	}

	fn generate_external_name(&self, external: &External) -> String {
		self.generate_data_cube_name(external)
	}
}

// Settings manager
//******************
pub struct SettingsManager {
	state: Arc<SettingsState>,
	factory: Arc<dyn ConnectorFactory>,
	anchor_path: PathBuf,
	initial_load_timeout: Duration,
	boot: watch::Receiver<BootState>,
	cluster_managers: RwLock<Vec<Arc<ClusterManager>>>,
	file_managers: RwLock<Vec<Arc<FileManager>>>,
}

impl SettingsManager {
	/// Creates the manager and starts loading `store` in the background.
	///
	/// Must be called from a tokio runtime.
	pub fn new(
		store: SettingsStore,
		factory: Arc<dyn ConnectorFactory>,
		opts: SettingsManagerOptions,
	) -> Arc<Self> {
		let (boot_tx, boot_rx) = watch::channel(BootState::Pending);
		let manager = Arc::new(Self {
			state: Arc::new(SettingsState {
				app_settings: RwLock::new(Arc::new(AppSettings::default())),
				reserved_names: Mutex::new(HashSet::new()),
				time_monitor: TimeMonitor::with_intervals(opts.time_tick, opts.time_check_interval),
			}),
			factory,
			anchor_path: opts.anchor_path,
			initial_load_timeout: opts.initial_load_timeout,
			boot: boot_rx,
			cluster_managers: RwLock::new(Vec::new()),
			file_managers: RwLock::new(Vec::new()),
		});
		manager.state.time_monitor.start();

		let bootstrap = manager.clone();
		tokio::spawn(async move {
			let res = match store.read_settings().await {
				Ok(settings) => bootstrap.revise_settings(settings).await,
				Err(err) => Err(err),
			};
			match res {
				Ok(()) => {
					info!("Settings loaded");
					boot_tx.send_replace(BootState::Ready);
				}
				Err(err) => {
					error!("Fatal settings load error: {}", err);
					boot_tx.send_replace(BootState::Failed(err));
				}
			}
		});

		manager
	}

	/// Installs `settings` and brings up a manager for every cluster and native cube
	pub async fn revise_settings(&self, settings: AppSettings) -> CuResult<()> {
		settings.validate()?;
		let settings = Arc::new(settings);
		let previous = std::mem::replace(&mut *self.state.app_settings.write(), settings.clone());
		for cube in &previous.data_cubes {
			if settings.data_cube(&cube.name).is_none() {
				self.state.time_monitor.remove_check(&cube.name);
			}
		}

		let cluster_managers: Vec<Arc<ClusterManager>> = settings
			.clusters
			.iter()
			.filter_map(|cluster| self.cluster_manager_for(&settings, cluster))
			.collect();
		let file_managers: Vec<Arc<FileManager>> =
			settings.native_data_cubes().map(|cube| Arc::new(self.file_manager_for(cube))).collect();

		let replaced = std::mem::replace(&mut *self.file_managers.write(), file_managers.clone());
		for old in replaced {
			old.destroy();
		}
		*self.cluster_managers.write() = cluster_managers.clone();

		info!(
			clusters = cluster_managers.len(),
			files = file_managers.len(),
			"Initializing data sources"
		);
		let (cluster_results, _) = futures::join!(
			join_all(cluster_managers.iter().map(|manager| manager.init())),
			join_all(file_managers.iter().map(|manager| manager.init())),
		);
		for (manager, res) in cluster_managers.iter().zip(cluster_results) {
			if let Err(err) = res {
				error!(cluster = %manager.cluster().name, "Cluster initialization failed: {}", err);
			}
		}
		Ok(())
	}

	fn cluster_manager_for(&self, settings: &AppSettings, cluster: &Cluster) -> Option<Arc<ClusterManager>> {
		let connector = match self.factory.connector(cluster) {
			Ok(connector) => connector,
			Err(err) => {
				error!(cluster = %cluster.name, "Cannot create connector: {}", err);
				return None;
			}
		};
		let initial_externals = settings
			.data_cubes_for_cluster(&cluster.name)
			.map(|cube| {
				ManagedExternal::new(cube.name.clone(), cube.to_external())
					.suppress_introspection(cube.introspection() == IntrospectionMode::None)
			})
			.collect();

		Some(Arc::new(ClusterManager::new(ClusterManagerOptions {
			cluster: cluster.clone(),
			anchor_path: self.anchor_path.clone(),
			connector,
			initial_externals,
			handler: self.state.clone(),
		})))
	}

	fn file_manager_for(&self, cube: &DataCube) -> FileManager {
		let state = self.state.clone();
		let name = cube.name.clone();
		FileManager::new(FileManagerOptions {
			data_cube: cube.name.clone(),
			anchor_path: self.anchor_path.clone(),
			uri: cube.source.source_name().to_string(),
			time_attribute: cube.time_attribute.clone(),
			subset: cube.subset.clone(),
			on_dataset_change: Arc::new(move |dataset: Dataset| state.apply_dataset(&name, dataset)),
		})
	}

	async fn wait_for_boot(&self) -> CuResult<()> {
		let mut boot = self.boot.clone();
		let state = boot
			.wait_for(|state| !matches!(state, BootState::Pending))
			.await
			.map_err(|_| Error::Internal("settings bootstrap aborted".into()))?;
		match &*state {
			BootState::Failed(err) => Err(err.clone()),
			BootState::Ready | BootState::Pending => Ok(()),
		}
	}

	/// Waits for the initial load, gives every cluster a chance to refresh, and
	/// returns the resulting snapshot.
	///
	/// If this takes longer than the timeout the current snapshot is returned
	/// instead; refreshes keep running in the background. Only a failed initial
	/// load is an error.
	pub async fn get_settings(&self, opts: GetSettingsOptions) -> CuResult<Arc<AppSettings>> {
		let timeout = opts.timeout.unwrap_or(self.initial_load_timeout);
		let ready = async {
			self.wait_for_boot().await?;
			let managers = self.cluster_managers.read().clone();
			let refreshes = managers.into_iter().map(|manager| {
				tokio::spawn(async move {
					manager.refresh().await;
				})
			});
			for res in join_all(refreshes).await {
				if let Err(err) = res {
					error!("Cluster refresh task failed: {}", err);
				}
			}
			Ok::<_, Error>(())
		};

		if timeout.is_zero() {
			ready.await?;
		} else if let Ok(res) = tokio::time::timeout(timeout, ready).await {
			res?;
		} else {
			warn!("Settings not ready after {:?}, returning current snapshot", timeout);
		}
		Ok(self.settings())
	}

	/// Current snapshot, without waiting for anything
	pub fn settings(&self) -> Arc<AppSettings> {
		self.state.current()
	}

	pub fn timekeeper(&self) -> Arc<Timekeeper> {
		self.state.time_monitor.timekeeper()
	}

	/// Whether a max time check is registered for `name`
	pub fn has_time_check(&self, name: &str) -> bool {
		self.state.time_monitor.has_check(name)
	}

	/// Runs one max time round right away
	pub async fn check_times_now(&self) -> bool {
		self.state.time_monitor.check_now().await
	}

	pub fn stop(&self) {
		self.state.time_monitor.stop();
		for manager in self.file_managers.read().iter() {
			manager.destroy();
		}
	}
}

// vim: ts=4
