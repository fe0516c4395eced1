//! Fundamental topology types: node identities, workload nodes, groups,
//! edges, and enriched runtime resources.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known label and annotation keys used to correlate workloads.
pub mod labels {
    /// Identity label. Its value is the name other workloads refer to.
    pub const NAME: &str = "app.kubernetes.io/name";

    /// Grouping label. Workloads sharing a value form one application group.
    pub const PART_OF: &str = "app.kubernetes.io/part-of";

    /// Annotation holding a JSON list of identity-label values this workload depends on.
    pub const CONNECTS_TO: &str = "app.openshift.io/connects-to";

    /// Label selector matching resources whose identity label equals `value`.
    pub fn selector_for(value: &str) -> String {
        format!("{NAME}={value}")
    }
}

/// Stable identity of a workload node: base64 of the resource UID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Derive the identity from a resource UID. Reversible byte-for-byte.
    pub fn from_uid(uid: &str) -> Self {
        Self(STANDARD.encode(uid.as_bytes()))
    }

    /// Recover the original UID, if this id was produced by [`NodeId::from_uid`].
    pub fn to_uid(&self) -> Option<String> {
        let bytes = STANDARD.decode(&self.0).ok()?;
        String::from_utf8(bytes).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workload kinds that become topology nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    DeploymentConfig,
}

impl WorkloadKind {
    /// Classify a resource kind string. Returns `None` for unsupported kinds.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "Deployment" => Some(Self::Deployment),
            "DeploymentConfig" => Some(Self::DeploymentConfig),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::DeploymentConfig => "DeploymentConfig",
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The latest observed version of one workload resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadNode {
    pub id: NodeId,
    pub kind: WorkloadKind,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl WorkloadNode {
    /// Value of the identity label, if present and non-empty.
    pub fn identity_label(&self) -> Option<&str> {
        non_empty(self.labels.get(labels::NAME))
    }

    /// Value of the grouping label, if present and non-empty.
    pub fn group_label(&self) -> Option<&str> {
        non_empty(self.labels.get(labels::PART_OF))
    }

    /// Raw connects-to annotation, if present and non-empty.
    pub fn connects_to(&self) -> Option<&str> {
        non_empty(self.annotations.get(labels::CONNECTS_TO))
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// A named cluster of nodes sharing one grouping-label value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub nodes: Vec<NodeId>,
}

impl Group {
    pub fn new(name: impl Into<String>, nodes: Vec<NodeId>) -> Self {
        let name = name.into();
        Self {
            id: format!("group:{name}"),
            name,
            nodes,
        }
    }
}

/// A directed dependency: `source` declares it connects to `target`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

/// A runtime object attributed to a workload node.
///
/// `metadata` and `status` are JSON-encoded and passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedResource {
    pub name: String,
    pub kind: String,
    pub metadata: String,
    pub status: String,
}
