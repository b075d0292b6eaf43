//! Statistics for the relay

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::registry::ConnectionRegistry;

/// Server-wide running counters
///
/// Updated lock-free from the accept path and the broadcaster.
#[derive(Debug)]
pub struct ServerCounters {
    started_at: Instant,
    connections_accepted: AtomicU64,
    subtitles_received: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
}

impl ServerCounters {
    /// Create zeroed counters, starting the uptime clock now
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            connections_accepted: AtomicU64::new(0),
            subtitles_received: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
        }
    }

    /// Count one accepted connection
    pub fn record_connection(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one subtitle submitted for broadcast
    pub fn record_subtitle(&self) {
        self.subtitles_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Add successful handoffs from one broadcast
    pub fn record_deliveries(&self, count: usize) {
        self.deliveries.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Count one connection dropped by a failed delivery
    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the counters were created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Read every counter
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            uptime_secs: self.uptime().as_secs(),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            subtitles_received: self.subtitles_received.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for ServerCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ServerCounters`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Seconds since start
    pub uptime_secs: u64,
    /// Connections accepted since start
    pub connections_accepted: u64,
    /// Subtitles submitted since start
    pub subtitles_received: u64,
    /// Subtitle handoffs that succeeded
    pub deliveries: u64,
    /// Subtitle handoffs that failed and dropped a connection
    pub delivery_failures: u64,
}

/// Aggregate view of the registry
///
/// Computed fresh on every request, never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Live connections across all identities
    pub connections: usize,
    /// Identities with at least one live connection
    pub identities: usize,
    /// Live connections per identity, when enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_identity: Option<BTreeMap<String, usize>>,
    /// Running server counters
    #[serde(flatten)]
    pub counters: CounterSnapshot,
}

/// Builds [`StatsSnapshot`]s from the registry and counters
#[derive(Clone)]
pub struct StatsCollector {
    registry: Arc<ConnectionRegistry>,
    counters: Arc<ServerCounters>,
    include_per_identity: bool,
}

impl StatsCollector {
    pub fn new(registry: Arc<ConnectionRegistry>, counters: Arc<ServerCounters>) -> Self {
        Self {
            registry,
            counters,
            include_per_identity: false,
        }
    }

    /// Include per-identity counts in snapshots
    pub fn include_per_identity(mut self, enabled: bool) -> Self {
        self.include_per_identity = enabled;
        self
    }

    /// Scan the registry once and build a snapshot
    ///
    /// Only the shared read lock is held during the scan. Under concurrent
    /// churn the result may already be slightly stale.
    pub async fn snapshot(&self) -> StatsSnapshot {
        let sizes = self.registry.bucket_sizes().await;

        let connections = sizes.iter().map(|(_, n)| n).sum();
        let identities = sizes.len();
        let per_identity = self.include_per_identity.then(|| {
            sizes
                .into_iter()
                .map(|(identity, n)| (identity.as_str().to_owned(), n))
                .collect()
        });

        StatsSnapshot {
            connections,
            identities,
            per_identity,
            counters: self.counters.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_new() {
        let counters = ServerCounters::new();
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.connections_accepted, 0);
        assert_eq!(snapshot.subtitles_received, 0);
        assert_eq!(snapshot.deliveries, 0);
        assert_eq!(snapshot.delivery_failures, 0);
    }

    #[test]
    fn test_counters_record() {
        let counters = ServerCounters::new();
        counters.record_connection();
        counters.record_connection();
        counters.record_subtitle();
        counters.record_deliveries(3);
        counters.record_delivery_failure();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.connections_accepted, 2);
        assert_eq!(snapshot.subtitles_received, 1);
        assert_eq!(snapshot.deliveries, 3);
        assert_eq!(snapshot.delivery_failures, 1);
    }

    #[tokio::test]
    async fn test_snapshot_counts() {
        let registry = Arc::new(ConnectionRegistry::new());
        let collector = StatsCollector::new(Arc::clone(&registry), Arc::new(ServerCounters::new()));

        let (c1, _rx1) = registry.new_connection();
        let (c2, _rx2) = registry.new_connection();
        let (c3, _rx3) = registry.new_connection();
        registry.register(c1, "a".into()).await;
        registry.register(c2, "a".into()).await;
        registry.register(c3.clone(), "b".into()).await;

        let stats = collector.snapshot().await;
        assert_eq!(stats.connections, 3);
        assert_eq!(stats.identities, 2);
        assert!(stats.per_identity.is_none());

        registry.unregister(c3.id()).await;
        let stats = collector.snapshot().await;
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.identities, 1);
    }

    #[tokio::test]
    async fn test_snapshot_per_identity() {
        let registry = Arc::new(ConnectionRegistry::new());
        let collector = StatsCollector::new(Arc::clone(&registry), Arc::new(ServerCounters::new()))
            .include_per_identity(true);

        let (c1, _rx1) = registry.new_connection();
        let (c2, _rx2) = registry.new_connection();
        registry.register(c1, "b".into()).await;
        registry.register(c2, "a".into()).await;

        let per_identity = collector.snapshot().await.per_identity.unwrap();
        let keys: Vec<_> = per_identity.keys().cloned().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(per_identity["a"], 1);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let snapshot = StatsSnapshot {
            connections: 2,
            identities: 1,
            per_identity: None,
            counters: CounterSnapshot::default(),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["connections"], 2);
        assert_eq!(json["identities"], 1);
        assert_eq!(json["deliveries"], 0);
        assert!(json.get("per_identity").is_none());
    }
}
