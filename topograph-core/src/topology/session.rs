//! Runs the full pipeline once per incoming event.

use super::enricher::ResourceEnricher;
use super::publisher::{ErrorFrame, PublishOutcome, SnapshotSink, StreamingPublisher};
use super::registry::NodeRegistry;
use super::{resolver, snapshot};
use crate::events::{EventFilter, EventStream};
use futures::StreamExt;
use tracing::Instrument;
use uuid::Uuid;

/// Error code for watch stream failures reported on the output stream.
pub const WATCH_ERROR_CODE: &str = "WATCH_ERROR";

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The event source has no more events.
    SourceClosed,
    /// Writing to the output connection failed.
    ClientDisconnected,
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub events_received: u64,
    pub snapshots_published: u64,
    /// Events that produced no snapshot: filtered, unsupported, or unserializable.
    pub events_dropped: u64,
    pub end: SessionEnd,
}

/// One streaming session: owns its registry, never shares it.
pub struct TopologySession<S> {
    id: Uuid,
    namespace: String,
    registry: NodeRegistry,
    enricher: ResourceEnricher,
    filter: EventFilter,
    publisher: StreamingPublisher<S>,
}

impl<S: SnapshotSink> TopologySession<S> {
    pub fn new(
        namespace: impl Into<String>,
        enricher: ResourceEnricher,
        filter: EventFilter,
        sink: S,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            namespace: namespace.into(),
            registry: NodeRegistry::new(),
            enricher,
            filter,
            publisher: StreamingPublisher::new(sink),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Consume `events` until the source closes or the client goes away.
    ///
    /// Each event is fully processed and written before the next one is
    /// pulled, so snapshots leave in arrival order. The event stream is
    /// dropped on return, which releases the subscription.
    pub async fn run(mut self, events: EventStream) -> SessionReport {
        let span = tracing::info_span!("topology_session", session_id = %self.id, namespace = %self.namespace);
        async move {
            tracing::info!("Topology session started");
            let report = self.drive(events).await;
            tracing::info!(
                events = report.events_received,
                snapshots = report.snapshots_published,
                dropped = report.events_dropped,
                end = ?report.end,
                "Topology session finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self, mut events: EventStream) -> SessionReport {
        let mut received = 0u64;
        let mut published = 0u64;
        let mut dropped = 0u64;

        let end = loop {
            let next = tokio::select! {
                next = events.next() => next,
                () = self.publisher.closed() => break SessionEnd::ClientDisconnected,
            };
            let Some(next) = next else {
                break SessionEnd::SourceClosed;
            };

            let event = match next {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Watch stream reported an error");
                    let frame = ErrorFrame::new(WATCH_ERROR_CODE, e.to_string());
                    if self.publisher.publish_error(&frame).await.is_err() {
                        break SessionEnd::ClientDisconnected;
                    }
                    continue;
                }
            };

            received += 1;
            if !self.filter.allows(event.action) {
                tracing::trace!(action = ?event.action, "Event filtered out");
                dropped += 1;
                continue;
            }
            if self.registry.apply(&event).is_none() {
                dropped += 1;
                continue;
            }

            let snapshot = self.build_snapshot().await;
            match self.publisher.publish(&snapshot).await {
                Ok(PublishOutcome::Written) => published += 1,
                Ok(PublishOutcome::Dropped) => dropped += 1,
                Err(e) => {
                    tracing::info!(error = %e, "Output connection closed");
                    break SessionEnd::ClientDisconnected;
                }
            }
        };
        drop(events);

        SessionReport {
            session_id: self.id,
            events_received: received,
            snapshots_published: published,
            events_dropped: dropped,
            end,
        }
    }

    async fn build_snapshot(&self) -> snapshot::GraphSnapshot {
        let groups = resolver::groups(&self.registry);
        let edges = resolver::edges(&self.registry);
        let enrichment = self
            .enricher
            .enrich_registry(&self.registry, &self.namespace)
            .await;
        tracing::debug!(
            nodes = self.registry.len(),
            groups = groups.len(),
            edges = edges.len(),
            "Assembled snapshot"
        );
        snapshot::assemble(&self.registry, groups, edges, enrichment)
    }
}
