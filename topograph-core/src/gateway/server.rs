//! HTTP gateway server built on axum.

use super::GatewayConfig;
use super::streams::StreamManager;
use crate::cluster::{ClusterConnector, ClusterTarget};
use crate::config::WatchConfig;
use crate::topology::{
    ChannelSink, ErrorFrame, NDJSON_CONTENT_TYPE, ResourceEnricher, TopologySession,
};
use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;

/// Error code for requests with missing or empty parameters.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
/// Error code when the stream limit is reached.
pub const CAPACITY_FULL: &str = "CAPACITY_FULL";
/// Error code when no client could be built for the target cluster.
pub const CLUSTER_UNAVAILABLE: &str = "CLUSTER_UNAVAILABLE";
/// Error code when the workload watch could not be started.
pub const WATCH_FAILED: &str = "WATCH_FAILED";

/// Thread-safe shared gateway reference for axum handlers.
pub type SharedGateway = Arc<Mutex<GatewayServer>>;

/// Query parameters of `GET /topology`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyQuery {
    pub namespace: Option<String>,
    pub host: Option<String>,
    pub token: Option<String>,
}

impl TopologyQuery {
    /// Split into the namespace and cluster target, rejecting blank values.
    pub fn into_target(self) -> Result<(String, ClusterTarget), String> {
        let namespace = required("namespace", self.namespace)?;
        let host = required("host", self.host)?;
        let token = required("token", self.token)?;
        Ok((namespace, ClusterTarget { host, token }))
    }
}

fn required(name: &str, value: Option<String>) -> Result<String, String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(format!("missing required query parameter '{name}'")),
    }
}

/// The topology gateway server.
pub struct GatewayServer {
    config: GatewayConfig,
    watch: WatchConfig,
    connector: Arc<dyn ClusterConnector>,
    streams: StreamManager,
    started_at: chrono::DateTime<Utc>,
}

impl std::fmt::Debug for GatewayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServer")
            .field("config", &self.config)
            .field("watch", &self.watch)
            .field("active_streams", &self.streams.active_count())
            .finish()
    }
}

impl GatewayServer {
    /// Create a new gateway server from configuration.
    pub fn new(
        config: GatewayConfig,
        watch: WatchConfig,
        connector: Arc<dyn ClusterConnector>,
    ) -> Self {
        let streams = StreamManager::new(config.max_streams);
        Self {
            config,
            watch,
            connector,
            streams,
            started_at: Utc::now(),
        }
    }

    /// Get a reference to the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get a reference to the stream manager.
    pub fn streams(&self) -> &StreamManager {
        &self.streams
    }

    /// Uptime in seconds since the server was created.
    pub fn uptime_secs(&self) -> u64 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_seconds().max(0) as u64
    }

    /// Number of topology streams currently open.
    pub fn active_streams(&self) -> usize {
        self.streams.active_count()
    }
}

/// Build an axum Router with `/topology` and `/health` routes.
pub fn router(shared: SharedGateway) -> Router {
    Router::new()
        .route("/topology", get(topology_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ErrorFrame::new(code, message))).into_response()
}

/// Open a live topology stream for one namespace.
async fn topology_handler(
    State(gw): State<SharedGateway>,
    Query(query): Query<TopologyQuery>,
) -> Response {
    let (namespace, target) = match query.into_target() {
        Ok(parts) => parts,
        Err(message) => {
            tracing::debug!(%message, "Rejected topology request");
            return error_response(StatusCode::BAD_REQUEST, INVALID_REQUEST, message);
        }
    };

    let (stream_id, connector, filter, buffer) = {
        let mut gw = gw.lock().await;
        let Some(id) = gw.streams.open(&namespace, &target.host) else {
            tracing::warn!(namespace = %namespace, "Topology stream limit reached");
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                CAPACITY_FULL,
                "Server at maximum topology streams",
            );
        };
        (
            id,
            Arc::clone(&gw.connector),
            gw.watch.event_filter(),
            gw.config.stream_buffer,
        )
    };

    let handle = match connector.connect(&target).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(host = %target.host, error = %e, "Cluster connection failed");
            gw.lock().await.streams.abandon(&stream_id);
            return error_response(StatusCode::BAD_GATEWAY, CLUSTER_UNAVAILABLE, e.to_string());
        }
    };

    let events = match handle.events.watch(&namespace).await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(namespace = %namespace, error = %e, "Workload watch failed to start");
            gw.lock().await.streams.abandon(&stream_id);
            return error_response(StatusCode::BAD_GATEWAY, WATCH_FAILED, e.to_string());
        }
    };

    let (sink, rx) = ChannelSink::channel(buffer);
    let session = TopologySession::new(
        namespace.clone(),
        ResourceEnricher::new(handle.lookup),
        filter,
        sink,
    );
    tracing::info!(
        stream_id = %stream_id,
        session_id = %session.id(),
        namespace = %namespace,
        host = %target.host,
        "Topology stream opened"
    );

    tokio::spawn(async move {
        let report = session.run(events).await;
        gw.lock().await.streams.finish(&stream_id, &report);
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    ([(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)], body).into_response()
}

/// Health check endpoint.
async fn health_handler(State(gw): State<SharedGateway>) -> impl IntoResponse {
    let gw = gw.lock().await;
    let body = serde_json::json!({
        "status": "ok",
        "active_streams": gw.active_streams(),
        "total_streams": gw.streams.opened_total(),
        "snapshots_published": gw.streams.snapshots_total(),
        "uptime_secs": gw.uptime_secs(),
    });
    Json(body)
}

/// Start the gateway server on the configured address.
///
/// This is an async function that runs until cancelled.
pub async fn run(gw: SharedGateway) -> Result<(), std::io::Error> {
    let (host, port) = {
        let gw = gw.lock().await;
        (gw.config().host.clone(), gw.config().port)
    };
    let app = router(gw);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Topology gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
