//! # Topology Graph Builder
//!
//! Turns a stream of workload change events into successive graph snapshots.
//! Per event: the [`NodeRegistry`] is updated, groups and edges are
//! recomputed from labels and annotations, each node is enriched with its
//! runtime resources, and the assembled [`GraphSnapshot`] is written to the
//! caller as one line of newline-delimited JSON.

pub mod enricher;
pub mod publisher;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod snapshot;

pub use enricher::{LookupKind, ResourceEnricher, ResourceLookup};
pub use publisher::{
    ChannelSink, ErrorFrame, NDJSON_CONTENT_TYPE, PublishOutcome, SnapshotSink, StreamError,
    StreamingPublisher,
};
pub use registry::NodeRegistry;
pub use session::{SessionEnd, SessionReport, TopologySession, WATCH_ERROR_CODE};
pub use snapshot::{GraphSnapshot, NodeData, NodeDisplayData, NodeEntry, assemble};
