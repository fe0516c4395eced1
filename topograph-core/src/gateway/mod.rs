//! # HTTP Gateway
//!
//! Serves live topology streams over HTTP. A `GET /topology` request opens a
//! long-lived response body carrying one newline-delimited JSON snapshot per
//! workload change in the requested namespace.

mod server;
mod streams;

pub use server::{
    CAPACITY_FULL, CLUSTER_UNAVAILABLE, GatewayServer, INVALID_REQUEST, SharedGateway,
    TopologyQuery, WATCH_FAILED, router as gateway_router, run as run_gateway,
};
pub use streams::{StreamInfo, StreamManager};

use serde::{Deserialize, Serialize};

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Maximum concurrent topology streams.
    pub max_streams: usize,
    /// Frames buffered between a session and its response body.
    pub stream_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_streams: 32,
            stream_buffer: 1,
        }
    }
}
