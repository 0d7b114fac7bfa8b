//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Outbound envelope delivery
//!
//! Writes are gated on connection writability: a connection that does not
//! currently accept writes is skipped silently, never queued or retried.

use crate::connection::Connection;
use crate::Result;
use sockwire_envelope::ResponseEnvelope;
use std::sync::Arc;
use tracing::debug;

/// Result of a broadcast operation
#[derive(Debug, Clone, Default)]
pub struct BroadcastOutcome {
    /// Total number of connections attempted
    pub total: usize,
    /// Number of successful writes
    pub succeeded: usize,
    /// Number of connections skipped as non-writable
    pub skipped: usize,
    /// Number of writes that returned an error
    pub failed: usize,
}

impl BroadcastOutcome {
    /// Check if every attempted write succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

/// Writes outbound envelopes to one or many connections
#[derive(Debug, Clone, Copy, Default)]
pub struct Broadcaster;

impl Broadcaster {
    /// Create a broadcaster
    pub fn new() -> Self {
        Self
    }

    /// Write an envelope to a single connection
    ///
    /// Returns `true` when the payload was written, `false` when the
    /// connection was skipped as non-writable.
    pub async fn publish_to_connection(
        &self,
        envelope: &ResponseEnvelope,
        conn: &Arc<dyn Connection>,
    ) -> Result<bool> {
        let payload = envelope.encode().map_err(crate::SocketsError::Envelope)?;
        self.write(payload, conn).await
    }

    /// Write an envelope to every connection in the list
    ///
    /// The payload is serialized once; each connection gets the same
    /// writability check. An empty list is a no-op, never an error.
    pub async fn broadcast(
        &self,
        envelope: &ResponseEnvelope,
        connections: &[Arc<dyn Connection>],
    ) -> Result<BroadcastOutcome> {
        let mut outcome = BroadcastOutcome {
            total: connections.len(),
            ..BroadcastOutcome::default()
        };

        if connections.is_empty() {
            return Ok(outcome);
        }

        let payload = envelope.encode().map_err(crate::SocketsError::Envelope)?;

        let writes = connections
            .iter()
            .map(|conn| self.write(payload.clone(), conn));
        for result in futures_util::future::join_all(writes).await {
            match result {
                Ok(true) => outcome.succeeded += 1,
                Ok(false) => outcome.skipped += 1,
                Err(_) => outcome.failed += 1,
            }
        }

        Ok(outcome)
    }

    async fn write(&self, payload: String, conn: &Arc<dyn Connection>) -> Result<bool> {
        if !conn.is_writable() {
            debug!(conn_id = %conn.id(), "skipping write to non-writable connection");
            return Ok(false);
        }

        conn.send(payload).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionId;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FakeConnection {
        id: ConnectionId,
        writable: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl FakeConnection {
        fn new(id: &str, writable: bool) -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId::from(id),
                writable: AtomicBool::new(writable),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Connection for FakeConnection {
        fn id(&self) -> ConnectionId {
            self.id.clone()
        }

        async fn send(&self, payload: String) -> Result<()> {
            self.sent.lock().unwrap().push(payload);
            Ok(())
        }

        fn is_writable(&self) -> bool {
            self.writable.load(Ordering::SeqCst)
        }

        async fn stop(&self) {
            self.writable.store(false, Ordering::SeqCst);
        }
    }

    fn envelope() -> ResponseEnvelope {
        ResponseEnvelope::new("/news", json!({"headline": "hello"}))
    }

    #[tokio::test]
    async fn test_publish_writes_to_writable_connection() {
        let conn = FakeConnection::new("c-1", true);
        let broadcaster = Broadcaster::new();

        let written = broadcaster
            .publish_to_connection(&envelope(), &(conn.clone() as Arc<dyn Connection>))
            .await
            .unwrap();

        assert!(written);
        assert_eq!(conn.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_skips_non_writable_connection() {
        let conn = FakeConnection::new("c-1", false);
        let broadcaster = Broadcaster::new();

        let written = broadcaster
            .publish_to_connection(&envelope(), &(conn.clone() as Arc<dyn Connection>))
            .await
            .unwrap();

        assert!(!written);
        assert_eq!(conn.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_applies_writability_per_connection() {
        let open = FakeConnection::new("c-1", true);
        let closed = FakeConnection::new("c-2", false);
        let also_open = FakeConnection::new("c-3", true);
        let broadcaster = Broadcaster::new();

        let connections: Vec<Arc<dyn Connection>> =
            vec![open.clone(), closed.clone(), also_open.clone()];

        let outcome = broadcaster.broadcast(&envelope(), &connections).await.unwrap();

        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(open.sent_count(), 1);
        assert_eq!(closed.sent_count(), 0);
        assert_eq!(also_open.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_empty_list_is_noop() {
        let broadcaster = Broadcaster::new();

        let outcome = broadcaster.broadcast(&envelope(), &[]).await.unwrap();

        assert_eq!(outcome.total, 0);
        assert!(outcome.all_succeeded());
    }
}
