//! Resource change events and the event source boundary.

use crate::error::WatchError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// What happened to a watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// The resource was added or modified.
    Applied,
    /// The resource was removed from the cluster.
    Deleted,
}

/// The parts of a watched resource the topology reads.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedObject {
    pub kind: String,
    pub metadata: ObjectMeta,
}

/// One change notification from the event source.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent {
    pub action: EventAction,
    pub object: WatchedObject,
}

impl ResourceEvent {
    pub fn applied(kind: impl Into<String>, metadata: ObjectMeta) -> Self {
        Self {
            action: EventAction::Applied,
            object: WatchedObject {
                kind: kind.into(),
                metadata,
            },
        }
    }

    pub fn deleted(kind: impl Into<String>, metadata: ObjectMeta) -> Self {
        Self {
            action: EventAction::Deleted,
            object: WatchedObject {
                kind: kind.into(),
                metadata,
            },
        }
    }
}

/// Stream of change notifications for one namespace.
///
/// Dropping the stream releases the underlying subscription.
pub type EventStream = BoxStream<'static, Result<ResourceEvent, WatchError>>;

/// Source of workload change notifications.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Start watching workloads in `namespace`.
    async fn watch(&self, namespace: &str) -> Result<EventStream, WatchError>;
}

/// Which event actions are let through to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    allowed: Vec<EventAction>,
}

impl EventFilter {
    pub fn new(allowed: Vec<EventAction>) -> Self {
        Self { allowed }
    }

    /// Added and modified events only; deletions never reach the registry.
    pub fn applied_only() -> Self {
        Self::new(vec![EventAction::Applied])
    }

    /// Added, modified and deleted events.
    pub fn all() -> Self {
        Self::new(vec![EventAction::Applied, EventAction::Deleted])
    }

    pub fn allows(&self, action: EventAction) -> bool {
        self.allowed.contains(&action)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::applied_only()
    }
}
