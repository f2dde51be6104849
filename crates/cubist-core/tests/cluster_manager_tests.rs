//! Cluster manager tests
//!
//! Source discovery, removal, error isolation, and reintrospection against an
//! in-memory cluster. Time is paused so intervals can be stepped through.
#![allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::{path::PathBuf, sync::Arc, time::Duration};

use common::{Event, MockCluster, RecordingHandler, setup_test_logging, wiki_attributes};
use cubist_core::{ClusterManager, ClusterManagerOptions, ManagedExternal};
use cubist_types::{AttributeInfo, AttributeType, Cluster, External, SourceListScan};

fn scanning_cluster() -> Cluster {
	let mut cluster = Cluster::new("druid");
	cluster.source_list_refresh_interval = 10_000;
	cluster
}

fn manager(
	cluster: Cluster,
	mock: &Arc<MockCluster>,
	handler: &Arc<RecordingHandler>,
	initial_externals: Vec<ManagedExternal>,
) -> ClusterManager {
	ClusterManager::new(ClusterManagerOptions {
		cluster,
		anchor_path: PathBuf::from("."),
		connector: mock.clone(),
		initial_externals,
		handler: handler.clone(),
	})
}

fn changed(name: &str, attributes: usize) -> Event {
	Event::Changed { name: name.into(), attributes }
}

#[tokio::test(start_paused = true)]
async fn test_discovers_source_and_skips_early_rescan() {
	setup_test_logging();
	let mock = MockCluster::new().with_source("events", wiki_attributes());
	let handler = RecordingHandler::new();
	let manager = manager(scanning_cluster(), &mock, &handler, Vec::new());

	manager.init().await.expect("init");
	assert_eq!(handler.take(), vec![changed("events", 3)]);
	assert_eq!(mock.list_calls(), 1);

	manager.refresh().await;
	assert_eq!(mock.list_calls(), 1);
	assert!(handler.take().is_empty());

	// Once the interval elapsed the list is scanned again, nothing changed
	tokio::time::advance(Duration::from_millis(10_000)).await;
	manager.refresh().await;
	assert_eq!(mock.list_calls(), 2);
	assert!(handler.take().is_empty());
	assert_eq!(manager.managed_names().await, vec!["events".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_vanished_source_is_removed() {
	setup_test_logging();
	let mock = MockCluster::new()
		.with_source("events", wiki_attributes())
		.with_source("clicks", wiki_attributes());
	let handler = RecordingHandler::new();
	let manager = manager(scanning_cluster(), &mock, &handler, Vec::new());
	manager.init().await.expect("init");
	assert_eq!(handler.take().len(), 2);

	mock.drop_source("clicks");
	tokio::time::advance(Duration::from_millis(10_000)).await;
	manager.refresh().await;
	assert_eq!(handler.take(), vec![Event::Removed { name: "clicks".into() }]);
	assert_eq!(manager.managed_names().await, vec!["events".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_introspection_errors_are_isolated() {
	setup_test_logging();
	let mock = MockCluster::new()
		.with_source("broken", wiki_attributes())
		.with_source("events", wiki_attributes());
	mock.fail_introspection("broken", true);
	let handler = RecordingHandler::new();
	let manager = manager(scanning_cluster(), &mock, &handler, Vec::new());

	manager.init().await.expect("init");
	assert_eq!(handler.take(), vec![changed("events", 3)]);

	// The failed source stays pending and is retried on the next refresh
	mock.fail_introspection("broken", false);
	manager.refresh().await;
	assert_eq!(handler.take(), vec![changed("broken", 3)]);
	assert_eq!(mock.list_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reintrospection_reports_only_schema_changes() {
	setup_test_logging();
	let mut cluster = scanning_cluster();
	cluster.source_list_scan = SourceListScan::Disable;
	cluster.source_reintrospect_interval = 5_000;
	let mock = MockCluster::new().with_source("wiki", wiki_attributes());
	let handler = RecordingHandler::new();
	let initial = vec![ManagedExternal::new("wiki", External::new("wiki"))];
	let manager = manager(cluster, &mock, &handler, initial);

	manager.init().await.expect("init");
	assert_eq!(handler.take(), vec![changed("wiki", 3)]);
	assert_eq!(mock.list_calls(), 0);

	tokio::time::advance(Duration::from_millis(5_000)).await;
	manager.refresh().await;
	assert_eq!(mock.introspect_calls(), 2);
	assert!(handler.take().is_empty());

	let mut attributes = wiki_attributes();
	attributes.push(AttributeInfo::new("deleted", AttributeType::Number));
	mock.set_source("wiki", attributes);
	tokio::time::advance(Duration::from_millis(5_000)).await;
	manager.refresh().await;
	assert_eq!(handler.take(), vec![changed("wiki", 4)]);
}

#[tokio::test(start_paused = true)]
async fn test_suppressed_external_is_reported_as_declared() {
	setup_test_logging();
	let mut cluster = Cluster::new("druid");
	cluster.source_list_scan = SourceListScan::Disable;
	let mock = MockCluster::new().with_source("wiki", wiki_attributes());
	let handler = RecordingHandler::new();
	let declared = External::new("wiki")
		.with_attributes(vec![AttributeInfo::new("time", AttributeType::Time)]);
	let initial = vec![ManagedExternal::new("wiki", declared).suppress_introspection(true)];
	let manager = manager(cluster, &mock, &handler, initial);

	manager.init().await.expect("init");
	assert_eq!(handler.take(), vec![changed("wiki", 1)]);
	assert_eq!(mock.introspect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_cluster_is_retried() {
	setup_test_logging();
	let mock = MockCluster::new().with_source("events", wiki_attributes());
	mock.set_unreachable(true);
	let handler = RecordingHandler::new();
	let manager = manager(scanning_cluster(), &mock, &handler, Vec::new());

	manager.init().await.expect("init");
	assert!(handler.take().is_empty());
	assert_eq!(mock.list_calls(), 0);

	mock.set_unreachable(false);
	manager.refresh().await;
	assert_eq!(handler.take(), vec![changed("events", 3)]);
}

#[tokio::test(start_paused = true)]
async fn test_late_change_is_followed_by_removal() {
	setup_test_logging();
	let mut cluster = scanning_cluster();
	cluster.source_reintrospect_interval = 5_000;
	let mock = MockCluster::new().with_source("events", wiki_attributes());
	let handler = RecordingHandler::new();
	let manager = Arc::new(manager(cluster, &mock, &handler, Vec::new()));
	manager.init().await.expect("init");
	assert_eq!(handler.take(), vec![changed("events", 3)]);

	// A reintrospection picks up a new schema but its response is held back
	let mut attributes = wiki_attributes();
	attributes.push(AttributeInfo::new("deleted", AttributeType::Number));
	mock.set_source("events", attributes);
	let gate = mock.gate_introspection();
	tokio::time::advance(Duration::from_millis(5_000)).await;
	let first = tokio::spawn({
		let manager = manager.clone();
		async move { manager.refresh().await }
	});
	while mock.introspect_calls() < 2 {
		tokio::task::yield_now().await;
	}

	// The source vanishes while the response is in flight and a scan is due
	mock.drop_source("events");
	tokio::time::advance(Duration::from_millis(5_000)).await;
	let second = tokio::spawn({
		let manager = manager.clone();
		async move { manager.refresh().await }
	});
	for _ in 0..5 {
		tokio::task::yield_now().await;
	}
	assert!(!second.is_finished());
	assert_eq!(mock.list_calls(), 1);

	gate.send(true).expect("gate open");
	first.await.expect("first refresh");
	second.await.expect("second refresh");
	manager.refresh().await;

	let events = handler.take();
	assert_eq!(events, vec![changed("events", 4), Event::Removed { name: "events".into() }]);
	assert!(manager.managed_names().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_refreshes_join_pass_in_flight() {
	setup_test_logging();
	let mut cluster = scanning_cluster();
	cluster.source_list_refresh_on_load = true;
	let mock = MockCluster::new().with_source("events", wiki_attributes());
	let handler = RecordingHandler::new();
	let manager = manager(cluster, &mock, &handler, Vec::new());
	manager.init().await.expect("init");
	assert_eq!(mock.list_calls(), 1);

	mock.set_list_delay(Duration::from_secs(5));
	futures::future::join_all((0..8).map(|_| manager.refresh())).await;
	assert_eq!(mock.list_calls(), 2);

	// Once settled, the next refresh runs its own pass
	manager.refresh().await;
	assert_eq!(mock.list_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_generated_names_do_not_collide() {
	setup_test_logging();
	let mock = MockCluster::new()
		.with_source("page views", wiki_attributes())
		.with_source("page_views", wiki_attributes());
	let handler = RecordingHandler::new();
	let manager = manager(scanning_cluster(), &mock, &handler, Vec::new());

	manager.init().await.expect("init");
	let mut names = manager.managed_names().await;
	names.sort();
	assert_eq!(names, vec!["page_views".to_string(), "page_views1".to_string()]);
}

// vim: ts=4
