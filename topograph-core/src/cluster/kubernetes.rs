//! Kubernetes/OpenShift adapters built on `kube`.

use super::{ClusterConnector, ClusterHandle, ClusterTarget};
use crate::config::ClusterConfig;
use crate::error::{ClusterError, LookupError, WatchError};
use crate::events::{EventSource, EventStream, ResourceEvent};
use crate::topology::{LookupKind, ResourceLookup};
use crate::types::EnrichedResource;
use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ReplicationController, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, Resource};
use secrecy::SecretString;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

fn deployment_config_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        "apps.openshift.io",
        "v1",
        "DeploymentConfig",
    ))
}

fn route_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("route.openshift.io", "v1", "Route"))
}

/// Builds `kube` clients from a caller-supplied host and bearer token.
#[derive(Debug, Clone)]
pub struct KubeConnector {
    accept_invalid_certs: bool,
    request_timeout: Option<Duration>,
}

impl KubeConnector {
    pub fn from_config(config: &ClusterConfig) -> Self {
        Self {
            accept_invalid_certs: config.accept_invalid_certs,
            request_timeout: (config.request_timeout_secs > 0)
                .then(|| Duration::from_secs(config.request_timeout_secs)),
        }
    }

    fn client_for(&self, target: &ClusterTarget) -> Result<Client, ClusterError> {
        let cluster_url: axum::http::Uri =
            target
                .host
                .parse()
                .map_err(|e: axum::http::uri::InvalidUri| ClusterError::InvalidHost {
                    host: target.host.clone(),
                    message: e.to_string(),
                })?;

        let mut config = kube::Config::new(cluster_url);
        config.accept_invalid_certs = self.accept_invalid_certs;
        config.auth_info.token = Some(SecretString::from(target.token.clone()));

        Client::try_from(config).map_err(|e| ClusterError::ClientBuild {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self, target: &ClusterTarget) -> Result<ClusterHandle, ClusterError> {
        let client = self.client_for(target)?;
        tracing::debug!(host = %target.host, "Built cluster client");
        Ok(ClusterHandle {
            events: Arc::new(KubeEventSource::new(client.clone())),
            lookup: Arc::new(KubeResourceLookup::new(client, self.request_timeout)),
        })
    }
}

/// Watches Deployments and DeploymentConfigs in one namespace.
#[derive(Clone)]
pub struct KubeEventSource {
    client: Client,
}

impl KubeEventSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Whether DeploymentConfigs can be watched in `namespace`.
    async fn deployment_configs_served(&self, namespace: &str) -> Result<bool, WatchError> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &deployment_config_resource());
        let listed = api.list(&ListParams::default().limit(1)).await.map(|_| ());
        deployment_configs_available(namespace, listed)
    }
}

/// Classify the DeploymentConfig list check.
///
/// A 404 means the API group is not served (plain Kubernetes). A 401 or 403
/// means the token may read Deployments but not DeploymentConfigs. Either way
/// the Deployment watch still runs on its own.
fn deployment_configs_available(
    namespace: &str,
    listed: Result<(), kube::Error>,
) -> Result<bool, WatchError> {
    match listed {
        Ok(()) => Ok(true),
        Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(false),
        Err(kube::Error::Api(resp)) if matches!(resp.code, 401 | 403) => {
            tracing::warn!(
                namespace,
                code = resp.code,
                reason = %resp.reason,
                "Not allowed to list DeploymentConfigs, watching Deployments only"
            );
            Ok(false)
        }
        Err(e) => Err(WatchError::StartFailed {
            kind: "DeploymentConfig".into(),
            namespace: namespace.into(),
            message: e.to_string(),
        }),
    }
}

#[async_trait]
impl EventSource for KubeEventSource {
    async fn watch(&self, namespace: &str) -> Result<EventStream, WatchError> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        // Surface bad credentials or missing namespaces before streaming.
        deployments
            .list(&ListParams::default().limit(1))
            .await
            .map_err(|e| WatchError::StartFailed {
                kind: "Deployment".into(),
                namespace: namespace.into(),
                message: e.to_string(),
            })?;

        let deployment_events = watcher(deployments, watcher::Config::default())
            .default_backoff()
            .filter_map(|res| futures::future::ready(translate("Deployment", res)));

        if !self.deployment_configs_served(namespace).await? {
            tracing::info!(namespace, "DeploymentConfigs unavailable, watching Deployments only");
            return Ok(deployment_events.boxed());
        }

        let dc_api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &deployment_config_resource());
        let dc_events = watcher(dc_api, watcher::Config::default())
            .default_backoff()
            .filter_map(|res| futures::future::ready(translate("DeploymentConfig", res)));

        Ok(futures::stream::select(deployment_events, dc_events).boxed())
    }
}

/// Map a watcher event onto the topology's event shape.
///
/// Init markers carry no object and are skipped; initial listing items count
/// as applied.
fn translate<K: Resource>(
    kind: &'static str,
    result: Result<watcher::Event<K>, watcher::Error>,
) -> Option<Result<ResourceEvent, WatchError>> {
    match result {
        Ok(watcher::Event::Apply(obj) | watcher::Event::InitApply(obj)) => {
            Some(Ok(ResourceEvent::applied(kind, obj.meta().clone())))
        }
        Ok(watcher::Event::Delete(obj)) => Some(Ok(ResourceEvent::deleted(kind, obj.meta().clone()))),
        Ok(watcher::Event::Init | watcher::Event::InitDone) => None,
        Err(e) => Some(Err(WatchError::Stream {
            kind: kind.into(),
            message: e.to_string(),
        })),
    }
}

/// Lists runtime resources with label selectors.
#[derive(Clone)]
pub struct KubeResourceLookup {
    client: Client,
    timeout: Option<Duration>,
}

impl KubeResourceLookup {
    pub fn new(client: Client, timeout: Option<Duration>) -> Self {
        Self { client, timeout }
    }

    async fn list_kind(
        &self,
        kind: LookupKind,
        namespace: &str,
        params: &ListParams,
    ) -> Result<Vec<EnrichedResource>, kube::Error> {
        let client = self.client.clone();
        let resources: Vec<EnrichedResource> = match kind {
            LookupKind::ReplicationController => {
                let api: Api<ReplicationController> = Api::namespaced(client, namespace);
                api.list(params)
                    .await?
                    .items
                    .iter()
                    .map(|rc| encode(kind, &rc.metadata, &rc.status))
                    .collect()
            }
            LookupKind::Service => {
                let api: Api<Service> = Api::namespaced(client, namespace);
                api.list(params)
                    .await?
                    .items
                    .iter()
                    .map(|svc| encode(kind, &svc.metadata, &svc.status))
                    .collect()
            }
            LookupKind::Route | LookupKind::DeploymentConfig => {
                let resource = if kind == LookupKind::Route {
                    route_resource()
                } else {
                    deployment_config_resource()
                };
                let api: Api<DynamicObject> = Api::namespaced_with(client, namespace, &resource);
                api.list(params)
                    .await?
                    .items
                    .iter()
                    .map(|obj| encode(kind, &obj.metadata, &obj.data.get("status")))
                    .collect()
            }
        };
        Ok(resources)
    }
}

#[async_trait]
impl ResourceLookup for KubeResourceLookup {
    async fn list(
        &self,
        kind: LookupKind,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<EnrichedResource>, LookupError> {
        let params = ListParams::default().labels(selector);
        let list_failed = |message: String| LookupError::ListFailed {
            kind: kind.to_string(),
            selector: selector.to_string(),
            message,
        };

        let listed = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.list_kind(kind, namespace, &params))
                .await
                .map_err(|_| list_failed(format!("timed out after {}s", limit.as_secs())))?,
            None => self.list_kind(kind, namespace, &params).await,
        };
        let resources = listed.map_err(|e| list_failed(e.to_string()))?;
        tracing::trace!(kind = %kind, selector, count = resources.len(), "Listed resources");
        Ok(resources)
    }
}

/// Convert one listed object to the uniform shape. The resource kind comes
/// from the query because list items usually omit it.
fn encode<S: Serialize>(kind: LookupKind, metadata: &ObjectMeta, status: &S) -> EnrichedResource {
    EnrichedResource {
        name: metadata.name.clone().unwrap_or_default(),
        kind: kind.to_string(),
        metadata: serde_json::to_string(metadata).unwrap_or_else(|e| {
            tracing::warn!(kind = %kind, error = %e, "Failed to encode resource metadata");
            String::from("{}")
        }),
        status: serde_json::to_string(status).unwrap_or_else(|e| {
            tracing::warn!(kind = %kind, error = %e, "Failed to encode resource status");
            String::from("{}")
        }),
    }
}
