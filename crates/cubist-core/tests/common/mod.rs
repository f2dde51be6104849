//! Shared test fixtures
//!
//! `MockCluster` is an in-memory cluster: tests set its sources, schemas, and
//! failures, and read back how often it was called.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::{
	collections::{HashMap, HashSet},
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};
use tokio::sync::watch;

use cubist_core::ExternalHandler;
use cubist_types::{
	AttributeInfo, AttributeType, Cluster, ConnectorFactory, CuResult, Error, Executor, External,
	Introspection, SourceConnector,
};

pub fn setup_test_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

pub fn wiki_attributes() -> Vec<AttributeInfo> {
	vec![
		AttributeInfo::new("time", AttributeType::Time),
		AttributeInfo::new("channel", AttributeType::String),
		AttributeInfo::new("added", AttributeType::Number),
	]
}

pub fn d1() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single().unwrap_or_default()
}

// Mock cluster
//**************
#[derive(Default)]
pub struct MockCluster {
	sources: Mutex<Vec<String>>,
	schemas: Mutex<HashMap<String, Vec<AttributeInfo>>>,
	failing: Mutex<HashSet<String>>,
	max_times: Mutex<HashMap<String, DateTime<Utc>>>,
	list_delay: Mutex<Duration>,
	introspect_gate: Mutex<Option<watch::Receiver<bool>>>,
	unreachable: AtomicBool,
	pub list_calls: AtomicUsize,
	pub introspect_calls: AtomicUsize,
}

impl MockCluster {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Adds a source with the given schema
	pub fn with_source(self: Arc<Self>, source: &str, attributes: Vec<AttributeInfo>) -> Arc<Self> {
		self.set_source(source, attributes);
		self
	}

	pub fn set_source(&self, source: &str, attributes: Vec<AttributeInfo>) {
		let mut sources = self.sources.lock();
		if !sources.iter().any(|s| s == source) {
			sources.push(source.to_string());
		}
		self.schemas.lock().insert(source.to_string(), attributes);
	}

	pub fn drop_source(&self, source: &str) {
		self.sources.lock().retain(|s| s != source);
		self.schemas.lock().remove(source);
	}

	pub fn fail_introspection(&self, source: &str, fail: bool) {
		if fail {
			self.failing.lock().insert(source.to_string());
		} else {
			self.failing.lock().remove(source);
		}
	}

	pub fn set_max_time(&self, source: &str, time: DateTime<Utc>) {
		self.max_times.lock().insert(source.to_string(), time);
	}

	pub fn set_list_delay(&self, delay: Duration) {
		*self.list_delay.lock() = delay;
	}

	/// Holds introspection responses back until `true` is sent on the
	/// returned channel. Schemas are read before the wait.
	pub fn gate_introspection(&self) -> watch::Sender<bool> {
		let (tx, rx) = watch::channel(false);
		*self.introspect_gate.lock() = Some(rx);
		tx
	}

	pub fn set_unreachable(&self, unreachable: bool) {
		self.unreachable.store(unreachable, Ordering::SeqCst);
	}

	pub fn list_calls(&self) -> usize {
		self.list_calls.load(Ordering::SeqCst)
	}

	pub fn introspect_calls(&self) -> usize {
		self.introspect_calls.load(Ordering::SeqCst)
	}
}

#[derive(Debug)]
pub struct MockExecutor {
	max_time: Option<DateTime<Utc>>,
}

#[async_trait]
impl Executor for MockExecutor {
	async fn max_time(&self, _time_attribute: &str) -> CuResult<Option<DateTime<Utc>>> {
		Ok(self.max_time)
	}
}

#[async_trait]
impl SourceConnector for MockCluster {
	async fn check_connection(&self) -> CuResult<()> {
		if self.unreachable.load(Ordering::SeqCst) {
			return Err(Error::Connector("connection refused".into()));
		}
		Ok(())
	}

	async fn list_sources(&self) -> CuResult<Vec<String>> {
		self.list_calls.fetch_add(1, Ordering::SeqCst);
		let delay = *self.list_delay.lock();
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		Ok(self.sources.lock().clone())
	}

	async fn introspect(&self, source: &str, _strategy: &str) -> CuResult<Introspection> {
		self.introspect_calls.fetch_add(1, Ordering::SeqCst);
		if self.failing.lock().contains(source) {
			return Err(Error::Connector(format!("introspection of {} failed", source)));
		}
		let attributes = self
			.schemas
			.lock()
			.get(source)
			.cloned()
			.ok_or_else(|| Error::NotFound(source.to_string()))?;
		let gate = self.introspect_gate.lock().clone();
		if let Some(mut gate) = gate {
			let _ = gate.wait_for(|open| *open).await;
		}
		Ok(Introspection { attributes })
	}

	fn executor(&self, source: &str) -> Arc<dyn Executor> {
		Arc::new(MockExecutor { max_time: self.max_times.lock().get(source).copied() })
	}
}

/// Hands out mock clusters by cluster name
#[derive(Default)]
pub struct MockFactory {
	clusters: HashMap<String, Arc<MockCluster>>,
}

impl MockFactory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_cluster(mut self, name: &str, cluster: Arc<MockCluster>) -> Self {
		self.clusters.insert(name.to_string(), cluster);
		self
	}
}

impl ConnectorFactory for MockFactory {
	fn connector(&self, cluster: &Cluster) -> CuResult<Arc<dyn SourceConnector>> {
		match self.clusters.get(&cluster.name) {
			Some(mock) => Ok(mock.clone()),
			None => Err(Error::NotFound(format!("connector for cluster '{}'", cluster.name))),
		}
	}
}

// Recording handler
//*******************
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
	Changed { name: String, attributes: usize },
	Removed { name: String },
}

/// Records every callback of a cluster manager
#[derive(Default)]
pub struct RecordingHandler {
	pub events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn take(&self) -> Vec<Event> {
		std::mem::take(&mut *self.events.lock())
	}
}

impl ExternalHandler for RecordingHandler {
	fn on_external_change(&self, _cluster: &Cluster, name: &str, external: &External) {
		self.events
			.lock()
			.push(Event::Changed { name: name.to_string(), attributes: external.attributes.len() });
	}

	fn on_external_removed(&self, _cluster: &Cluster, name: &str, _external: &External) {
		self.events.lock().push(Event::Removed { name: name.to_string() });
	}

	fn generate_external_name(&self, external: &External) -> String {
		cubist_types::utils::make_url_safe_name(&external.source)
	}
}

// vim: ts=4
