//! Attaches runtime objects to workload nodes.

use super::registry::NodeRegistry;
use crate::error::LookupError;
use crate::types::{EnrichedResource, NodeId, labels};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Runtime resource kinds queried for every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    ReplicationController,
    Service,
    Route,
    DeploymentConfig,
}

impl LookupKind {
    /// Query order. Results are concatenated in this order.
    pub const ALL: [LookupKind; 4] = [
        LookupKind::ReplicationController,
        LookupKind::Service,
        LookupKind::Route,
        LookupKind::DeploymentConfig,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReplicationController => "ReplicationController",
            Self::Service => "Service",
            Self::Route => "Route",
            Self::DeploymentConfig => "DeploymentConfig",
        }
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External service that lists runtime resources by label selector.
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    async fn list(
        &self,
        kind: LookupKind,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<EnrichedResource>, LookupError>;
}

/// Looks up runtime resources for nodes. Holds no cache between builds.
#[derive(Clone)]
pub struct ResourceEnricher {
    lookup: Arc<dyn ResourceLookup>,
}

impl std::fmt::Debug for ResourceEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceEnricher").finish_non_exhaustive()
    }
}

impl ResourceEnricher {
    pub fn new(lookup: Arc<dyn ResourceLookup>) -> Self {
        Self { lookup }
    }

    /// Fetch every runtime resource carrying `label_value` as its identity label.
    ///
    /// The four queries run concurrently. A failed query is logged and
    /// contributes nothing; the others are still returned.
    pub async fn enrich(&self, label_value: &str, namespace: &str) -> Vec<EnrichedResource> {
        let selector = labels::selector_for(label_value);
        let [rc, svc, route, dc] = LookupKind::ALL;
        let (rc, svc, route, dc) = futures::join!(
            self.list_or_empty(rc, namespace, &selector),
            self.list_or_empty(svc, namespace, &selector),
            self.list_or_empty(route, namespace, &selector),
            self.list_or_empty(dc, namespace, &selector),
        );

        let mut resources = Vec::with_capacity(rc.len() + svc.len() + route.len() + dc.len());
        resources.extend(rc);
        resources.extend(svc);
        resources.extend(route);
        resources.extend(dc);
        resources
    }

    /// Enrich every node in the registry.
    ///
    /// Nodes without an identity label get an empty list and issue no
    /// queries. Nodes sharing an identity label share one lookup per call.
    pub async fn enrich_registry(
        &self,
        registry: &NodeRegistry,
        namespace: &str,
    ) -> BTreeMap<NodeId, Vec<EnrichedResource>> {
        let mut by_label: HashMap<&str, Vec<EnrichedResource>> = HashMap::new();
        let mut enriched = BTreeMap::new();

        for node in registry.nodes() {
            let resources = match node.identity_label() {
                Some(value) => {
                    if !by_label.contains_key(value) {
                        let found = self.enrich(value, namespace).await;
                        by_label.insert(value, found);
                    }
                    by_label.get(value).cloned().unwrap_or_default()
                }
                None => Vec::new(),
            };
            enriched.insert(node.id.clone(), resources);
        }
        enriched
    }

    async fn list_or_empty(
        &self,
        kind: LookupKind,
        namespace: &str,
        selector: &str,
    ) -> Vec<EnrichedResource> {
        match self.lookup.list(kind, namespace, selector).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    kind = %kind,
                    namespace,
                    selector,
                    error = %e,
                    "Resource lookup failed, continuing without it"
                );
                Vec::new()
            }
        }
    }
}
