//! Topology stream bookkeeping.
//!
//! Only open streams are held in memory. A finished stream folds its
//! session report into running counters and drops its entry.

use crate::topology::{SessionEnd, SessionReport};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata about one open topology stream.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub stream_id: Uuid,
    pub namespace: String,
    pub host: String,
    pub started_at: DateTime<Utc>,
}

/// Tracks open streams and enforces the concurrency limit.
#[derive(Debug, Default)]
pub struct StreamManager {
    streams: HashMap<Uuid, StreamInfo>,
    max_streams: usize,
    opened_total: u64,
    finished_total: u64,
    snapshots_total: u64,
}

impl StreamManager {
    /// Create a manager allowing at most `max_streams` concurrent streams.
    pub fn new(max_streams: usize) -> Self {
        Self {
            streams: HashMap::new(),
            max_streams,
            ..Self::default()
        }
    }

    /// Register a new stream. Returns `None` if the limit is reached.
    pub fn open(&mut self, namespace: &str, host: &str) -> Option<Uuid> {
        if self.active_count() >= self.max_streams {
            return None;
        }

        let id = Uuid::new_v4();
        self.streams.insert(
            id,
            StreamInfo {
                stream_id: id,
                namespace: namespace.to_string(),
                host: host.to_string(),
                started_at: Utc::now(),
            },
        );
        self.opened_total += 1;
        Some(id)
    }

    /// Close a stream and record its session report.
    ///
    /// Returns the stream's metadata, or `None` if it was not open.
    pub fn finish(&mut self, id: &Uuid, report: &SessionReport) -> Option<StreamInfo> {
        let info = self.streams.remove(id)?;
        self.finished_total += 1;
        self.snapshots_total += report.snapshots_published;
        let end = match report.end {
            SessionEnd::ClientDisconnected => "client disconnected",
            SessionEnd::SourceClosed => "source closed",
        };
        tracing::debug!(
            stream_id = %id,
            namespace = %info.namespace,
            snapshots = report.snapshots_published,
            end,
            "Topology stream finished"
        );
        Some(info)
    }

    /// Release a stream slot that never started streaming.
    pub fn abandon(&mut self, id: &Uuid) -> bool {
        if self.streams.remove(id).is_some() {
            self.opened_total -= 1;
            true
        } else {
            false
        }
    }

    /// Get info for an open stream.
    pub fn get(&self, id: &Uuid) -> Option<&StreamInfo> {
        self.streams.get(id)
    }

    /// Number of streams currently open.
    pub fn active_count(&self) -> usize {
        self.streams.len()
    }

    /// Streams that started streaming since the manager was created.
    pub fn opened_total(&self) -> u64 {
        self.opened_total
    }

    /// Streams that have finished.
    pub fn finished_total(&self) -> u64 {
        self.finished_total
    }

    /// Snapshots published by finished streams.
    pub fn snapshots_total(&self) -> u64 {
        self.snapshots_total
    }
}
