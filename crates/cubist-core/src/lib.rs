//! Settings reconciliation and data source orchestration for Cubist.
//!
//! The [`SettingsManager`] keeps an always-available snapshot of every
//! cluster and data cube. Cluster managers discover and introspect sources,
//! file managers load native datasets, and the time monitor keeps the latest
//! event time of each cube fresh.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod cluster_manager;
pub mod file_manager;
pub mod prelude;
pub mod settings_manager;
pub mod settings_store;
pub mod time_monitor;
pub mod updater;

pub use cluster_manager::{ClusterManager, ClusterManagerOptions, ExternalHandler, ManagedExternal};
pub use file_manager::{FileFormat, FileManager, FileManagerOptions};
pub use settings_manager::{GetSettingsOptions, SettingsManager, SettingsManagerOptions};
pub use settings_store::{SettingsFormat, SettingsStore};
pub use time_monitor::{TimeCheck, TimeMonitor};

// vim: ts=4
