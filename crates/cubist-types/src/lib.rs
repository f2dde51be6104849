//! Shared value objects, connector traits, and error types for Cubist.
//!
//! Everything here is an immutable descriptor or a seam towards the outside
//! world (cluster connectors, executors). The orchestration lives in
//! `cubist-core`.

pub mod app_settings;
pub mod cluster;
pub mod data_cube;
pub mod dataset;
pub mod error;
pub mod external;
pub mod prelude;
pub mod timekeeper;
pub mod utils;

pub use app_settings::{AppSettings, Customization};
pub use cluster::{Cluster, NATIVE_CLUSTER, SourceListScan};
pub use data_cube::{
	DataCube, DataCubeSource, Dimension, DimensionKind, IntrospectionMode, Measure, RefreshRule,
	SubsetFilter,
};
pub use dataset::{Dataset, DatasetExecutor, Row, Value};
pub use error::{CuResult, Error};
pub use external::{
	AttributeInfo, AttributeType, ConnectorFactory, Executor, External, Introspection,
	SourceConnector,
};
pub use timekeeper::{TimeTag, Timekeeper};

// vim: ts=4
