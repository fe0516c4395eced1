//! End-to-end tests for the topology pipeline: events in, NDJSON snapshots out.
//!
//! Runs a `TopologySession` against in-memory fakes for the event stream and
//! the resource lookup, reading frames from the channel a response body
//! would consume.

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use topograph_core::error::{LookupError, WatchError};
use topograph_core::events::{EventFilter, ResourceEvent};
use topograph_core::topology::{
    ChannelSink, GraphSnapshot, LookupKind, ResourceEnricher, ResourceLookup, SessionEnd,
    TopologySession, WATCH_ERROR_CODE,
};
use topograph_core::types::{Edge, EnrichedResource, NodeId, labels};

/// Lookup that answers every query with one resource named after the
/// selector value and records the queries it saw. Queries for `failing`
/// return an error instead.
#[derive(Default)]
struct EchoLookup {
    queries: Mutex<Vec<(LookupKind, String)>>,
    failing: Option<LookupKind>,
}

impl EchoLookup {
    fn failing(kind: LookupKind) -> Self {
        Self {
            failing: Some(kind),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ResourceLookup for EchoLookup {
    async fn list(
        &self,
        kind: LookupKind,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<EnrichedResource>, LookupError> {
        assert_eq!(namespace, "shop");
        self.queries
            .lock()
            .unwrap()
            .push((kind, selector.to_string()));
        if self.failing == Some(kind) {
            return Err(LookupError::ListFailed {
                kind: kind.to_string(),
                selector: selector.to_string(),
                message: "forbidden".to_string(),
            });
        }
        let value = selector
            .strip_prefix(&format!("{}=", labels::NAME))
            .unwrap_or(selector);
        Ok(vec![EnrichedResource {
            name: format!("{value}-{}", kind.as_str().to_lowercase()),
            kind: kind.as_str().to_string(),
            metadata: format!(r#"{{"name":"{value}"}}"#),
            status: "{}".to_string(),
        }])
    }
}

fn workload(
    uid: &str,
    name: &str,
    part_of: Option<&str>,
    connects_to: Option<&str>,
) -> ObjectMeta {
    let mut label_map = std::collections::BTreeMap::new();
    label_map.insert(labels::NAME.to_string(), name.to_string());
    if let Some(group) = part_of {
        label_map.insert(labels::PART_OF.to_string(), group.to_string());
    }
    let annotations = connects_to.map(|value| {
        std::collections::BTreeMap::from([(labels::CONNECTS_TO.to_string(), value.to_string())])
    });
    ObjectMeta {
        uid: Some(uid.to_string()),
        name: Some(name.to_string()),
        namespace: Some("shop".to_string()),
        labels: Some(label_map),
        annotations,
        ..ObjectMeta::default()
    }
}

fn applied(
    kind: &str,
    uid: &str,
    name: &str,
    part_of: Option<&str>,
    connects_to: Option<&str>,
) -> Result<ResourceEvent, WatchError> {
    Ok(ResourceEvent::applied(
        kind,
        workload(uid, name, part_of, connects_to),
    ))
}

async fn run_session(
    events: Vec<Result<ResourceEvent, WatchError>>,
    filter: EventFilter,
    lookup: Arc<EchoLookup>,
) -> (Vec<serde_json::Value>, topograph_core::topology::SessionReport) {
    let (sink, mut rx) = ChannelSink::channel(64);
    let session = TopologySession::new("shop", ResourceEnricher::new(lookup), filter, sink);
    let report = session.run(futures::stream::iter(events).boxed()).await;

    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        assert_eq!(frame.last(), Some(&b'\n'), "every frame ends with a newline");
        frames.push(serde_json::from_slice(&frame).unwrap());
    }
    (frames, report)
}

fn snapshot(frame: &serde_json::Value) -> GraphSnapshot {
    serde_json::from_value(frame.clone()).unwrap()
}

#[tokio::test]
async fn test_web_and_cart_scenario() {
    let lookup = Arc::new(EchoLookup::default());
    let events = vec![
        applied("Deployment", "uid-cart", "cart", Some("shop"), None),
        applied("DeploymentConfig", "uid-web", "web", Some("shop"), Some(r#"["cart"]"#)),
    ];
    let (frames, report) = run_session(events, EventFilter::default(), lookup.clone()).await;

    assert_eq!(report.events_received, 2);
    assert_eq!(report.snapshots_published, 2);
    assert_eq!(report.end, SessionEnd::SourceClosed);
    assert_eq!(frames.len(), 2);

    // First snapshot: only cart, already grouped, no edges yet.
    let first = snapshot(&frames[0]);
    assert_eq!(first.node_count(), 1);
    assert_eq!(first.groups.len(), 1);
    assert!(first.edges.is_empty());

    // Second snapshot: both nodes, one group, web -> cart.
    let second = snapshot(&frames[1]);
    let cart = NodeId::from_uid("uid-cart");
    let web = NodeId::from_uid("uid-web");
    assert_eq!(second.node_count(), 2);
    assert_eq!(second.groups.len(), 1);
    assert_eq!(second.groups[0].name, "shop");
    let mut members = second.groups[0].nodes.clone();
    members.sort();
    let mut expected = vec![cart.clone(), web.clone()];
    expected.sort();
    assert_eq!(members, expected);
    assert_eq!(
        second.edges,
        vec![Edge {
            source: web.clone(),
            target: cart.clone(),
        }]
    );

    // Enrichment is isolated per node.
    let cart_resources = &second.resources[&cart].resources;
    assert_eq!(cart_resources.len(), LookupKind::ALL.len());
    assert!(cart_resources.iter().all(|r| r.name.starts_with("cart-")));
    let web_resources = &second.resources[&web].resources;
    assert!(web_resources.iter().all(|r| r.name.starts_with("web-")));

    // Resource kinds follow the lookup order.
    let kinds: Vec<&str> = cart_resources.iter().map(|r| r.kind.as_str()).collect();
    assert_eq!(
        kinds,
        vec!["ReplicationController", "Service", "Route", "DeploymentConfig"]
    );

    // Display data carries the identity label.
    assert_eq!(frames[1]["resources"][web.as_str()]["type"], "workload");
    assert_eq!(
        frames[1]["resources"][web.as_str()]["data"]["builderImage"],
        "web"
    );
    assert_eq!(
        frames[1]["resources"][web.as_str()]["data"]["editUrl"],
        "dummy_edit_url"
    );
}

#[tokio::test]
async fn test_snapshots_follow_event_order() {
    let events = vec![
        applied("Deployment", "uid-1", "alpha", None, None),
        applied("Deployment", "uid-2", "beta", None, None),
        applied("Deployment", "uid-3", "gamma", None, None),
    ];
    let (frames, _) = run_session(
        events,
        EventFilter::default(),
        Arc::new(EchoLookup::default()),
    )
    .await;

    let counts: Vec<usize> = frames.iter().map(|f| snapshot(f).node_count()).collect();
    assert_eq!(counts, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_repeated_event_updates_node_in_place() {
    let events = vec![
        applied("Deployment", "uid-cart", "cart", None, None),
        applied("Deployment", "uid-cart", "cart", Some("shop"), None),
    ];
    let (frames, _) = run_session(
        events,
        EventFilter::default(),
        Arc::new(EchoLookup::default()),
    )
    .await;

    let first = snapshot(&frames[0]);
    let second = snapshot(&frames[1]);
    assert_eq!(first.nodes, second.nodes);
    assert!(first.groups.is_empty());
    assert_eq!(second.groups.len(), 1);
}

#[tokio::test]
async fn test_deletes_ignored_by_default() {
    let events = vec![
        applied("Deployment", "uid-cart", "cart", None, None),
        Ok(ResourceEvent::deleted(
            "Deployment",
            workload("uid-cart", "cart", None, None),
        )),
    ];
    let (frames, report) = run_session(
        events,
        EventFilter::default(),
        Arc::new(EchoLookup::default()),
    )
    .await;
    assert_eq!(frames.len(), 1);
    assert_eq!(report.events_dropped, 1);
}

#[tokio::test]
async fn test_deletes_evict_when_enabled() {
    let events = vec![
        applied("Deployment", "uid-cart", "cart", None, None),
        applied("Deployment", "uid-web", "web", None, None),
        Ok(ResourceEvent::deleted(
            "Deployment",
            workload("uid-cart", "cart", None, None),
        )),
    ];
    let (frames, _) = run_session(events, EventFilter::all(), Arc::new(EchoLookup::default())).await;
    assert_eq!(frames.len(), 3);
    let last = snapshot(&frames[2]);
    assert_eq!(last.node_count(), 1);
    assert_eq!(last.nodes[0].name, "web");
    assert!(!last.resources.contains_key(&NodeId::from_uid("uid-cart")));
}

#[tokio::test]
async fn test_watch_error_frame_between_snapshots() {
    let events = vec![
        applied("Deployment", "uid-1", "alpha", None, None),
        Err(WatchError::Stream {
            kind: "Deployment".into(),
            message: "connection reset".into(),
        }),
        applied("Deployment", "uid-2", "beta", None, None),
    ];
    let (frames, report) = run_session(
        events,
        EventFilter::default(),
        Arc::new(EchoLookup::default()),
    )
    .await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1]["error"]["code"], WATCH_ERROR_CODE);
    assert!(
        frames[1]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("connection reset")
    );
    assert_eq!(snapshot(&frames[2]).node_count(), 2);
    assert_eq!(report.snapshots_published, 2);
}

#[tokio::test]
async fn test_shared_identity_label_queried_once_per_snapshot() {
    let lookup = Arc::new(EchoLookup::default());
    let events = vec![
        applied("Deployment", "uid-a", "cart", None, None),
        applied("DeploymentConfig", "uid-b", "cart", None, None),
    ];
    let (frames, _) = run_session(events, EventFilter::default(), lookup.clone()).await;
    assert_eq!(frames.len(), 2);

    // One lookup fan-out for the first snapshot, one for the second.
    let queries = lookup.queries.lock().unwrap();
    assert_eq!(queries.len(), 2 * LookupKind::ALL.len());
    assert!(
        queries
            .iter()
            .all(|(_, selector)| selector == &labels::selector_for("cart"))
    );
}

#[tokio::test]
async fn test_failed_lookup_kind_leaves_other_resources() {
    let lookup = Arc::new(EchoLookup::failing(LookupKind::Route));
    let events = vec![
        applied("Deployment", "uid-cart", "cart", Some("shop"), None),
        applied("Deployment", "uid-web", "web", Some("shop"), Some(r#"["cart"]"#)),
    ];
    let (frames, report) = run_session(events, EventFilter::default(), lookup.clone()).await;

    assert_eq!(report.snapshots_published, 2);
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.get("error").is_none()));

    let last = snapshot(&frames[1]);
    assert_eq!(last.node_count(), 2);
    assert_eq!(last.edges.len(), 1);
    for (name, uid) in [("cart", "uid-cart"), ("web", "uid-web")] {
        let resources = &last.resources[&NodeId::from_uid(uid)].resources;
        let kinds: Vec<&str> = resources.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["ReplicationController", "Service", "DeploymentConfig"]);
        assert!(resources.iter().all(|r| r.name.starts_with(name)));
    }

    // The failing kind was still asked for every node.
    let queries = lookup.queries.lock().unwrap();
    let route_queries = queries
        .iter()
        .filter(|(kind, _)| *kind == LookupKind::Route)
        .count();
    assert_eq!(route_queries, 3);
}
