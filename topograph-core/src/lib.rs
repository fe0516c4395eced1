//! # Topograph Core
//!
//! Core library for the Topograph topology service.
//! Watches workload controllers in a Kubernetes/OpenShift namespace, derives
//! groups and connection edges from their labels and annotations, enriches
//! each workload with its runtime resources, and streams a fresh graph
//! snapshot for every change.

pub mod cluster;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod topology;
pub mod types;

// Re-export commonly used types at the crate root.
pub use cluster::{ClusterConnector, ClusterHandle, ClusterTarget, KubeConnector};
pub use config::{TopographConfig, load_config};
pub use error::{ClusterError, ConfigError, LookupError, PublishError, WatchError};
pub use events::{EventAction, EventFilter, EventSource, EventStream, ResourceEvent};
pub use gateway::{GatewayConfig, GatewayServer, SharedGateway, gateway_router, run_gateway};
pub use topology::{GraphSnapshot, ResourceEnricher, ResourceLookup, TopologySession};
pub use types::{Edge, EnrichedResource, Group, NodeId, WorkloadKind, WorkloadNode};
