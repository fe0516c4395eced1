//! Writes snapshots to the caller's connection as
//! newline-delimited JSON.

use super::snapshot::GraphSnapshot;
use crate::error::PublishError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Content type of the output stream.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Destination for serialized frames. Each call is one complete line.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn send(&mut self, frame: Bytes) -> Result<(), PublishError>;

    /// Resolves once the receiving side has gone away.
    async fn closed(&self) {
        futures::future::pending::<()>().await
    }
}

/// Sink backed by a bounded channel whose receiver feeds a response body.
///
/// When the receiving side is dropped (the client went away) every send
/// fails with [`PublishError::Disconnected`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver to stream from.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl SnapshotSink for ChannelSink {
    async fn send(&mut self, frame: Bytes) -> Result<(), PublishError> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| PublishError::Disconnected)
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Error detail written in place of a snapshot for non-fatal failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamError {
    pub code: String,
    pub message: String,
}

/// Wire envelope for [`StreamError`]: `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: StreamError,
}

impl ErrorFrame {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: StreamError {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// Result of publishing one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Written,
    /// The snapshot could not be serialized and was skipped.
    Dropped,
}

/// Serializes snapshots and writes them in call order.
#[derive(Debug)]
pub struct StreamingPublisher<S> {
    sink: S,
    written: u64,
}

impl<S: SnapshotSink> StreamingPublisher<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, written: 0 }
    }

    /// Write one snapshot. Only a failed write is an error.
    pub async fn publish(
        &mut self,
        snapshot: &GraphSnapshot,
    ) -> Result<PublishOutcome, PublishError> {
        self.write_frame(snapshot).await
    }

    /// Write an error frame on the stream.
    pub async fn publish_error(
        &mut self,
        frame: &ErrorFrame,
    ) -> Result<PublishOutcome, PublishError> {
        self.write_frame(frame).await
    }

    /// Number of frames written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Resolves once the output connection is gone.
    pub async fn closed(&self) {
        self.sink.closed().await
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    async fn write_frame<T: Serialize>(&mut self, value: &T) -> Result<PublishOutcome, PublishError> {
        let frame = match encode_line(value) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize frame, dropping it");
                return Ok(PublishOutcome::Dropped);
            }
        };
        self.sink.send(frame).await?;
        self.written += 1;
        Ok(PublishOutcome::Written)
    }
}

/// Serialize `value` as one NDJSON line.
pub fn encode_line<T: Serialize>(value: &T) -> Result<Bytes, serde_json::Error> {
    let mut buf = serde_json::to_vec(value)?;
    buf.push(b'\n');
    Ok(Bytes::from(buf))
}
