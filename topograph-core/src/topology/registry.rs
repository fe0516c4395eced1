//! The latest observed version of every workload in a session.

use crate::events::{EventAction, ResourceEvent, WatchedObject};
use crate::types::{NodeId, WorkloadKind, WorkloadNode};
use std::collections::BTreeMap;

/// In-memory store of workload nodes keyed by identity. Last write wins.
#[derive(Debug, Default, Clone)]
pub struct NodeRegistry {
    nodes: BTreeMap<NodeId, WorkloadNode>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a change notification and return the affected node.
    ///
    /// Unsupported kinds and objects without a UID or name are logged and
    /// ignored. A delete evicts the node and returns its last known version.
    pub fn apply(&mut self, event: &ResourceEvent) -> Option<WorkloadNode> {
        let node = classify(&event.object)?;
        match event.action {
            EventAction::Applied => {
                tracing::debug!(id = %node.id, kind = %node.kind, name = %node.name, "Upserting node");
                self.nodes.insert(node.id.clone(), node.clone());
                Some(node)
            }
            EventAction::Deleted => {
                let removed = self.nodes.remove(&node.id);
                if removed.is_some() {
                    tracing::debug!(id = %node.id, name = %node.name, "Evicted node");
                }
                removed
            }
        }
    }

    /// Get a node by identity.
    pub fn get(&self, id: &NodeId) -> Option<&WorkloadNode> {
        self.nodes.get(id)
    }

    /// All nodes in identity order.
    pub fn nodes(&self) -> impl Iterator<Item = &WorkloadNode> {
        self.nodes.values()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Turn a watched object into a workload node, if it is a supported kind
/// with the metadata the topology needs.
fn classify(object: &WatchedObject) -> Option<WorkloadNode> {
    let Some(kind) = WorkloadKind::from_kind(&object.kind) else {
        tracing::warn!(kind = %object.kind, "Ignoring unsupported resource kind");
        return None;
    };

    let meta = &object.metadata;
    let (Some(uid), Some(name)) = (meta.uid.as_deref(), meta.name.as_deref()) else {
        tracing::warn!(
            kind = %kind,
            name = meta.name.as_deref().unwrap_or("<unnamed>"),
            "Ignoring resource without uid or name"
        );
        return None;
    };

    Some(WorkloadNode {
        id: NodeId::from_uid(uid),
        kind,
        name: name.to_string(),
        namespace: meta.namespace.clone(),
        labels: meta.labels.clone().unwrap_or_default(),
        annotations: meta.annotations.clone().unwrap_or_default(),
    })
}
