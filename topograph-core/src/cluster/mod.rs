//! # Cluster Access
//!
//! Connects to a Kubernetes/OpenShift API server on behalf of one caller and
//! exposes the two collaborators the topology pipeline consumes: an
//! [`EventSource`] for workload changes and a [`ResourceLookup`] for runtime
//! resources.

mod kubernetes;

pub use kubernetes::{KubeConnector, KubeEventSource, KubeResourceLookup};

use crate::error::ClusterError;
use crate::events::EventSource;
use crate::topology::ResourceLookup;
use async_trait::async_trait;
use std::sync::Arc;

/// API server address and credentials supplied by the caller.
#[derive(Clone)]
pub struct ClusterTarget {
    pub host: String,
    pub token: String,
}

impl std::fmt::Debug for ClusterTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterTarget")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Collaborators bound to one cluster connection.
#[derive(Clone)]
pub struct ClusterHandle {
    pub events: Arc<dyn EventSource>,
    pub lookup: Arc<dyn ResourceLookup>,
}

/// Builds cluster handles for incoming requests.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, target: &ClusterTarget) -> Result<ClusterHandle, ClusterError>;
}
