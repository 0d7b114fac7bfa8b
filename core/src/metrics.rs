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

//! Lock-free metrics for the sockets server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free server metrics
///
/// All metrics are stored as atomics and can be updated concurrently
/// without locks. Use [`ServerMetrics::snapshot`] for a point-in-time view.
#[derive(Debug)]
pub struct ServerMetrics {
    total_connections: AtomicU64,
    active_connections: AtomicU64,

    sessions_created: AtomicU64,
    sessions_destroyed: AtomicU64,

    messages_received: AtomicU64,
    messages_published: AtomicU64,

    protocol_violations: AtomicU64,

    started_at: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            sessions_created: AtomicU64::new(0),
            sessions_destroyed: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            protocol_violations: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record a new connection being registered
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection being removed from the registry
    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a session creation
    pub fn session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session destruction
    pub fn session_destroyed(&self) {
        self.sessions_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an inbound message
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an outbound publish
    pub fn message_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a protocol violation (rejected message or session operation)
    pub fn protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current number of active connections
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Get the total number of connections since server start
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Get a consistent snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_destroyed: self.sessions_destroyed.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

/// A snapshot of server metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Total connections since server start
    pub total_connections: u64,
    /// Current active connections
    pub active_connections: u64,
    /// Sessions created since server start
    pub sessions_created: u64,
    /// Sessions destroyed since server start
    pub sessions_destroyed: u64,
    /// Inbound messages received
    pub messages_received: u64,
    /// Outbound messages published
    pub messages_published: u64,
    /// Messages or session operations rejected as protocol violations
    pub protocol_violations: u64,
    /// Server uptime
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Calculate inbound messages per second
    pub fn messages_received_per_sec(&self) -> f64 {
        if self.uptime.is_zero() {
            return 0.0;
        }
        self.messages_received as f64 / self.uptime.as_secs_f64()
    }

    /// Calculate the share of inbound messages rejected
    pub fn violation_rate(&self) -> f64 {
        if self.messages_received == 0 {
            return 0.0;
        }
        self.protocol_violations as f64 / self.messages_received as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_tracking() {
        let metrics = ServerMetrics::new();

        metrics.connection_opened();
        metrics.connection_opened();
        assert_eq!(metrics.active_connections(), 2);
        assert_eq!(metrics.total_connections(), 2);

        metrics.connection_closed();
        assert_eq!(metrics.active_connections(), 1);
        assert_eq!(metrics.total_connections(), 2);
    }

    #[test]
    fn test_snapshot() {
        let metrics = ServerMetrics::new();

        metrics.session_created();
        metrics.message_received();
        metrics.message_received();
        metrics.message_published();
        metrics.protocol_violation();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sessions_created, 1);
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.messages_published, 1);
        assert_eq!(snapshot.protocol_violations, 1);
        assert_eq!(snapshot.violation_rate(), 0.5);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = std::sync::Arc::new(ServerMetrics::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let metrics = metrics.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    metrics.connection_opened();
                    metrics.message_received();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.total_connections(), 800);
        assert_eq!(metrics.snapshot().messages_received, 800);
    }
}
