//! Snapshot assembly: one immutable, self-contained graph per event.

use super::registry::NodeRegistry;
use crate::types::{Edge, EnrichedResource, Group, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Node type reported for every workload in the resources map.
pub const WORKLOAD_NODE_TYPE: &str = "workload";

/// A node as listed in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub name: String,
    pub id: NodeId,
}

/// Display hints attached to each node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDisplayData {
    pub url: String,
    pub edit_url: String,
    pub builder_image: String,
    #[serde(default)]
    pub donut_status: HashMap<String, String>,
}

/// Per-node detail: the node's enriched runtime resources plus display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub resources: Vec<EnrichedResource>,
    pub data: NodeDisplayData,
}

/// The unit of output: one complete rendering of the topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeEntry>,
    pub groups: Vec<Group>,
    pub edges: Vec<Edge>,
    pub resources: BTreeMap<NodeId, NodeData>,
}

impl GraphSnapshot {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Combine registry contents, resolved relationships and enrichment into a snapshot.
///
/// Performs no I/O. Nodes missing from `enrichment` get an empty resource list.
pub fn assemble(
    registry: &NodeRegistry,
    groups: Vec<Group>,
    edges: Vec<Edge>,
    mut enrichment: BTreeMap<NodeId, Vec<EnrichedResource>>,
) -> GraphSnapshot {
    let mut nodes = Vec::with_capacity(registry.len());
    let mut resources = BTreeMap::new();

    for node in registry.nodes() {
        nodes.push(NodeEntry {
            name: node.name.clone(),
            id: node.id.clone(),
        });
        resources.insert(
            node.id.clone(),
            NodeData {
                id: node.id.clone(),
                node_type: WORKLOAD_NODE_TYPE.to_string(),
                resources: enrichment.remove(&node.id).unwrap_or_default(),
                data: NodeDisplayData {
                    url: "dummy_url".to_string(),
                    edit_url: "dummy_edit_url".to_string(),
                    builder_image: node.identity_label().unwrap_or_default().to_string(),
                    donut_status: HashMap::new(),
                },
            },
        );
    }

    GraphSnapshot {
        nodes,
        groups,
        edges,
        resources,
    }
}
