//! Derives groups and edges from registry contents.
//!
//! Both functions recompute from scratch on every call and hold no state,
//! so two calls against an unchanged registry return identical output.

use super::registry::NodeRegistry;
use crate::types::{Edge, Group, NodeId, WorkloadNode};
use std::collections::{BTreeMap, BTreeSet};

/// Bucket nodes by their grouping label. Nodes without one are left out.
pub fn groups(registry: &NodeRegistry) -> Vec<Group> {
    let mut buckets: BTreeMap<&str, Vec<NodeId>> = BTreeMap::new();
    for node in registry.nodes() {
        if let Some(value) = node.group_label() {
            buckets.entry(value).or_default().push(node.id.clone());
        }
    }

    buckets
        .into_iter()
        .map(|(name, nodes)| Group::new(name, nodes))
        .collect()
}

/// Resolve connects-to annotations into edges.
///
/// Each edge points from the node carrying the annotation to every node whose
/// identity label equals one of the declared values. Nodes sharing an
/// identity label each get an edge; nothing is deduplicated across nodes.
pub fn edges(registry: &NodeRegistry) -> Vec<Edge> {
    // Declared value -> nodes declaring it.
    let mut declared: BTreeMap<String, Vec<&NodeId>> = BTreeMap::new();
    for node in registry.nodes() {
        for value in declared_targets(node) {
            declared.entry(value).or_default().push(&node.id);
        }
    }

    // Declared value -> nodes carrying it as their identity label.
    let mut named: BTreeMap<&str, Vec<&NodeId>> = BTreeMap::new();
    for node in registry.nodes() {
        if let Some(value) = node.identity_label()
            && declared.contains_key(value)
        {
            named.entry(value).or_default().push(&node.id);
        }
    }

    let mut edges = Vec::new();
    for (value, declarers) in &declared {
        let Some(targets) = named.get(value.as_str()) else {
            tracing::trace!(value = %value, "No node carries declared connects-to value");
            continue;
        };
        for source in declarers {
            for target in targets {
                edges.push(Edge {
                    source: (*source).clone(),
                    target: (*target).clone(),
                });
            }
        }
    }
    edges
}

/// Parse a node's connects-to annotation into a set of identity-label values.
///
/// Malformed JSON is logged and yields no values for this node only.
fn declared_targets(node: &WorkloadNode) -> BTreeSet<String> {
    let Some(raw) = node.connects_to() else {
        return BTreeSet::new();
    };
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(values) => values.into_iter().filter(|v| !v.is_empty()).collect(),
        Err(e) => {
            tracing::warn!(
                id = %node.id,
                name = %node.name,
                error = %e,
                "Skipping malformed connects-to annotation"
            );
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ResourceEvent;
    use crate::types::labels;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use pretty_assertions::assert_eq;

    fn add(
        registry: &mut NodeRegistry,
        uid: &str,
        name_label: Option<&str>,
        part_of: Option<&str>,
        connects_to: Option<&str>,
    ) -> NodeId {
        let mut labels_map = std::collections::BTreeMap::new();
        if let Some(v) = name_label {
            labels_map.insert(labels::NAME.to_string(), v.to_string());
        }
        if let Some(v) = part_of {
            labels_map.insert(labels::PART_OF.to_string(), v.to_string());
        }
        let annotations = connects_to
            .map(|v| [(labels::CONNECTS_TO.to_string(), v.to_string())].into());
        let meta = ObjectMeta {
            uid: Some(uid.into()),
            name: Some(format!("res-{uid}")),
            labels: Some(labels_map),
            annotations,
            ..ObjectMeta::default()
        };
        registry
            .apply(&ResourceEvent::applied("Deployment", meta))
            .unwrap()
            .id
    }

    #[test]
    fn test_groups_bucket_by_part_of() {
        let mut registry = NodeRegistry::new();
        let a = add(&mut registry, "a", None, Some("shop"), None);
        let b = add(&mut registry, "b", None, Some("shop"), None);
        let c = add(&mut registry, "c", None, Some("blog"), None);
        add(&mut registry, "d", None, None, None);
        add(&mut registry, "e", None, Some(""), None);

        let groups = groups(&registry);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], Group::new("blog", vec![c]));
        assert_eq!(groups[1], Group::new("shop", vec![a, b]));
    }

    #[test]
    fn test_edge_points_from_declarer_to_named_node() {
        let mut registry = NodeRegistry::new();
        let web = add(&mut registry, "web", Some("web"), None, Some(r#"["cart"]"#));
        let cart = add(&mut registry, "cart", Some("cart"), None, None);

        assert_eq!(
            edges(&registry),
            vec![Edge {
                source: web,
                target: cart
            }]
        );
    }

    #[test]
    fn test_edges_fan_out_over_shared_identity_label() {
        let mut registry = NodeRegistry::new();
        let web = add(&mut registry, "w", Some("web"), None, Some(r#"["db"]"#));
        let db1 = add(&mut registry, "d1", Some("db"), None, None);
        let db2 = add(&mut registry, "d2", Some("db"), None, None);

        let edges = edges(&registry);
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.source == web));
        assert!(edges.iter().any(|e| e.target == db1));
        assert!(edges.iter().any(|e| e.target == db2));
    }

    #[test]
    fn test_duplicate_declared_values_collapse() {
        let mut registry = NodeRegistry::new();
        add(&mut registry, "w", Some("web"), None, Some(r#"["db", "db"]"#));
        add(&mut registry, "d", Some("db"), None, None);
        assert_eq!(edges(&registry).len(), 1);
    }

    #[test]
    fn test_unresolved_target_produces_no_edge() {
        let mut registry = NodeRegistry::new();
        add(&mut registry, "w", Some("web"), None, Some(r#"["ghost"]"#));
        assert!(edges(&registry).is_empty());
    }

    #[test]
    fn test_malformed_annotation_skips_only_that_node() {
        let mut registry = NodeRegistry::new();
        add(&mut registry, "bad", Some("bad"), None, Some("cart,db"));
        let good = add(&mut registry, "good", Some("good"), None, Some(r#"["cart"]"#));
        let cart = add(&mut registry, "cart", Some("cart"), None, None);

        assert_eq!(
            edges(&registry),
            vec![Edge {
                source: good,
                target: cart
            }]
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let mut registry = NodeRegistry::new();
        add(&mut registry, "1", Some("a"), Some("g"), Some(r#"["b", "c"]"#));
        add(&mut registry, "2", Some("b"), Some("g"), Some(r#"["c"]"#));
        add(&mut registry, "3", Some("c"), Some("h"), Some(r#"["a"]"#));

        assert_eq!(groups(&registry), groups(&registry));
        assert_eq!(edges(&registry), edges(&registry));
        assert_eq!(edges(&registry).len(), 4);
    }
}
