//! Cluster manager. Owns the lifecycle of the sources living on one cluster.
//!
//! It scans the cluster's source list, introspects the schema of every source
//! it tracks, reintrospects on an interval, and reports what changed through an
//! [`ExternalHandler`]. All passes of one manager are serialized, so a change
//! and a removal for the same source are always delivered in order.

use futures::future::join_all;
use std::{
	collections::HashSet,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};
use tokio::{
	sync::{Mutex, watch},
	time::Instant,
};

use cubist_types::{Cluster, External, SourceConnector};

use crate::prelude::*;
use crate::updater::{self, Change};

/// Receives what a cluster manager learns about its sources
pub trait ExternalHandler: Send + Sync {
	/// A source was introspected for the first time or its schema changed
	fn on_external_change(&self, cluster: &Cluster, name: &str, external: &External);

	/// A tracked source disappeared from the cluster
	fn on_external_removed(&self, cluster: &Cluster, name: &str, external: &External);

	/// Names a newly discovered source
	fn generate_external_name(&self, external: &External) -> String;
}

/// A source tracked under a data cube name
#[derive(Debug, Clone)]
pub struct ManagedExternal {
	pub name: String,
	pub external: External,
	/// Found by scanning rather than configured
	pub auto_discovered: bool,
	/// Never introspect, report `external` as given
	pub suppress_introspection: bool,
	/// Reported at least once
	announced: bool,
}

impl ManagedExternal {
	pub fn new(name: impl Into<String>, external: External) -> Self {
		Self {
			name: name.into(),
			external,
			auto_discovered: false,
			suppress_introspection: false,
			announced: false,
		}
	}

	pub fn suppress_introspection(mut self, suppress: bool) -> Self {
		self.suppress_introspection = suppress;
		self
	}

	fn discovered(name: String, source: &str) -> Self {
		Self { auto_discovered: true, ..Self::new(name, External::new(source)) }
	}
}

pub struct ClusterManagerOptions {
	pub cluster: Cluster,
	pub anchor_path: PathBuf,
	pub connector: Arc<dyn SourceConnector>,
	pub initial_externals: Vec<ManagedExternal>,
	pub handler: Arc<dyn ExternalHandler>,
}

struct ScanState {
	managed: Vec<ManagedExternal>,
	connected: bool,
	last_source_list: Option<Instant>,
	last_introspection: Option<Instant>,
}

pub struct ClusterManager {
	cluster: Cluster,
	anchor_path: PathBuf,
	connector: Arc<dyn SourceConnector>,
	handler: Arc<dyn ExternalHandler>,
	state: Mutex<ScanState>,
	/// Bumped whenever a pass settles
	passes: watch::Sender<u64>,
}

/// Signals waiting refreshes once a pass settles, however it settles
struct PassGuard<'a>(&'a watch::Sender<u64>);

impl Drop for PassGuard<'_> {
	fn drop(&mut self) {
		self.0.send_modify(|passes| *passes = passes.wrapping_add(1));
	}
}

/// Whether a periodic job is due
fn is_due(on_load: bool, interval: Option<Duration>, last: Option<Instant>, now: Instant) -> bool {
	if on_load {
		return true;
	}
	match (interval, last) {
		(Some(interval), Some(last)) => now.duration_since(last) >= interval,
		(Some(_), None) => true,
		(None, _) => false,
	}
}

impl ClusterManager {
	pub fn new(opts: ClusterManagerOptions) -> Self {
		Self {
			cluster: opts.cluster,
			anchor_path: opts.anchor_path,
			connector: opts.connector,
			handler: opts.handler,
			state: Mutex::new(ScanState {
				managed: opts.initial_externals,
				connected: false,
				last_source_list: None,
				last_introspection: None,
			}),
			passes: watch::Sender::new(0),
		}
	}

	pub fn cluster(&self) -> &Cluster {
		&self.cluster
	}

	pub fn anchor_path(&self) -> &Path {
		&self.anchor_path
	}

	/// Names of the data cubes currently tracked on this cluster
	pub async fn managed_names(&self) -> Vec<String> {
		self.state.lock().await.managed.iter().map(|m| m.name.clone()).collect()
	}

	/// Connects and performs one full pass: externals with suppressed
	/// introspection are reported as declared, the source list is scanned, and
	/// every remaining source is introspected.
	///
	/// An unreachable cluster is not an error, the pass is retried on refresh.
	pub async fn init(&self) -> CuResult<()> {
		info!(cluster = %self.cluster.name, "Initializing cluster manager");
		let mut state = self.state.lock().await;
		let _pass = PassGuard(&self.passes);
		self.full_pass(&mut state).await
	}

	/// Catches up with the cluster if a scan or reintrospection is due.
	///
	/// A call made while a pass is in flight joins that pass instead of
	/// queueing a new one.
	pub async fn refresh(&self) {
		let mut settled = self.passes.subscribe();
		let Ok(mut state) = self.state.try_lock() else {
			debug!(cluster = %self.cluster.name, "Pass in flight, joining it");
			let _ = settled.changed().await;
			return;
		};
		let _pass = PassGuard(&self.passes);
		if !state.connected {
			if let Err(err) = self.full_pass(&mut state).await {
				error!(cluster = %self.cluster.name, "Cluster refresh failed: {}", err);
			}
			return;
		}

		let now = Instant::now();
		if self.cluster.scans_source_list()
			&& is_due(
				self.cluster.source_list_refresh_on_load,
				self.cluster.source_list_refresh_interval(),
				state.last_source_list,
				now,
			) {
			if let Err(err) = self.scan_source_list(&mut state).await {
				error!(cluster = %self.cluster.name, "Source list scan failed: {}", err);
			}
		}

		let sources = if is_due(
			self.cluster.source_reintrospect_on_load,
			self.cluster.source_reintrospect_interval(),
			state.last_introspection,
			now,
		) {
			debug!(cluster = %self.cluster.name, "Reintrospecting sources");
			state.last_introspection = Some(now);
			introspectable_sources(&state.managed)
		} else {
			pending_sources(&state.managed)
		};
		self.introspect_sources(&mut state, sources).await;
	}

	async fn full_pass(&self, state: &mut ScanState) -> CuResult<()> {
		if !self.connect(state).await {
			return Ok(());
		}

		self.announce_suppressed(state);
		if self.cluster.scans_source_list() {
			self.scan_source_list(state).await?;
		}

		state.last_introspection = Some(Instant::now());
		let sources = introspectable_sources(&state.managed);
		self.introspect_sources(state, sources).await;
		Ok(())
	}

	async fn connect(&self, state: &mut ScanState) -> bool {
		if state.connected {
			return true;
		}
		match self.connector.check_connection().await {
			Ok(()) => {
				info!(cluster = %self.cluster.name, "Connected to cluster");
				state.connected = true;
				true
			}
			Err(err) => {
				warn!(
					cluster = %self.cluster.name,
					"Cluster unreachable, will retry on next refresh: {}",
					err
				);
				false
			}
		}
	}

	/// Reports externals whose introspection is suppressed, with an executor attached
	fn announce_suppressed(&self, state: &mut ScanState) {
		for managed in state.managed.iter_mut().filter(|m| m.suppress_introspection && !m.announced)
		{
			let executor = self.connector.executor(&managed.external.source);
			managed.external = managed.external.clone().with_executor(executor);
			managed.announced = true;
			self.handler.on_external_change(&self.cluster, &managed.name, &managed.external);
		}
	}

	async fn scan_source_list(&self, state: &mut ScanState) -> CuResult<()> {
		let sources = match self.connector.list_sources().await {
			Ok(mut sources) => {
				let mut seen = HashSet::new();
				sources.retain(|source| seen.insert(source.clone()));
				sources
			}
			Err(err) => {
				warn!(cluster = %self.cluster.name, "Could not list sources: {}", err);
				return Ok(());
			}
		};
		state.last_source_list = Some(Instant::now());
		debug!(cluster = %self.cluster.name, "Found {} sources", sources.len());

		let known = known_sources(&state.managed);
		let mut entered = Vec::new();
		let mut exited = Vec::new();
		for change in updater::diff_by(&known, &sources, Clone::clone, |a, b| a == b)? {
			match change {
				Change::Enter(source) => entered.push(source.clone()),
				Change::Exit(source) => exited.push(source.clone()),
				Change::Update { .. } => {}
			}
		}

		for source in &exited {
			let (gone, kept): (Vec<_>, Vec<_>) =
				std::mem::take(&mut state.managed).into_iter().partition(|m| m.external.source == *source);
			state.managed = kept;
			for managed in gone {
				info!(cluster = %self.cluster.name, data_cube = %managed.name, "Source {} disappeared", source);
				self.handler.on_external_removed(&self.cluster, &managed.name, &managed.external);
			}
		}

		for source in &entered {
			let generated = self.handler.generate_external_name(&External::new(source.as_str()));
			let name = cubist_types::utils::unique_name(&generated, |n| {
				state.managed.iter().any(|m| m.name == n)
			});
			info!(cluster = %self.cluster.name, data_cube = %name, "Discovered new source {}", source);
			state.managed.push(ManagedExternal::discovered(name, source));
		}
		Ok(())
	}

	/// Introspects `sources` concurrently and reports schema changes.
	///
	/// A failing source is logged and keeps its previous state; if it was never
	/// reported it stays pending and is retried on the next refresh.
	async fn introspect_sources(&self, state: &mut ScanState, sources: Vec<String>) {
		if sources.is_empty() {
			return;
		}

		let strategy = self.cluster.introspection_strategy.as_str();
		let results = join_all(sources.into_iter().map(|source| async move {
			let res = self.connector.introspect(&source, strategy).await;
			(source, res)
		}))
		.await;

		for (source, res) in results {
			let introspection = match res {
				Ok(introspection) => introspection,
				Err(err) => {
					warn!(cluster = %self.cluster.name, "Introspection of {} failed: {}", source, err);
					continue;
				}
			};
			let external = External::new(source.as_str())
				.with_attributes(introspection.attributes)
				.with_executor(self.connector.executor(&source));

			for managed in state
				.managed
				.iter_mut()
				.filter(|m| !m.suppress_introspection && m.external.source == source)
			{
				if managed.announced && managed.external.same_schema(&external) {
					continue;
				}
				managed.external = external.clone();
				managed.announced = true;
				self.handler.on_external_change(&self.cluster, &managed.name, &managed.external);
			}
		}
	}
}

/// Distinct sources in first-seen order
fn known_sources(managed: &[ManagedExternal]) -> Vec<String> {
	distinct_sources(managed.iter())
}

fn introspectable_sources(managed: &[ManagedExternal]) -> Vec<String> {
	distinct_sources(managed.iter().filter(|m| !m.suppress_introspection))
}

/// Sources with a managed external that was never reported
fn pending_sources(managed: &[ManagedExternal]) -> Vec<String> {
	distinct_sources(managed.iter().filter(|m| !m.suppress_introspection && !m.announced))
}

fn distinct_sources<'a>(managed: impl Iterator<Item = &'a ManagedExternal>) -> Vec<String> {
	let mut seen = HashSet::new();
	managed
		.map(|m| m.external.source.clone())
		.filter(|source| seen.insert(source.clone()))
		.collect()
}


// vim: ts=4
