//! Connection registry implementation
//!
//! The central registry that maps each identity to the connections currently
//! registered under it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};

use super::config::RegistryConfig;
use super::connection::{ConnectionHandle, ConnectionId};
use super::identity::{Identity, Subtitle};

/// Outcome of a [`ConnectionRegistry::register`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Connection was not registered before
    Inserted,
    /// Connection was already registered under the same identity; nothing changed
    Unchanged,
    /// Connection moved from another identity's bucket
    Moved { from: Identity },
}

/// Both indexes, always mutated together under one lock
#[derive(Default)]
struct Buckets {
    /// identity -> connections; no bucket is ever empty
    by_identity: HashMap<Identity, HashMap<ConnectionId, ConnectionHandle>>,
    /// connection -> the identity whose bucket holds it
    by_connection: HashMap<ConnectionId, Identity>,
}

impl Buckets {
    fn remove(&mut self, id: ConnectionId) -> Option<(Identity, ConnectionHandle)> {
        let identity = self.by_connection.remove(&id)?;

        let handle = match self.by_identity.get_mut(&identity) {
            Some(bucket) => {
                let handle = bucket.remove(&id);
                if bucket.is_empty() {
                    self.by_identity.remove(&identity);
                }
                handle
            }
            None => None,
        };

        match handle {
            Some(handle) => Some((identity, handle)),
            None => {
                tracing::warn!(
                    connection_id = id,
                    auth = %identity,
                    "Reverse index pointed at a bucket without the connection"
                );
                None
            }
        }
    }
}

/// Central registry for all live connections
///
/// Thread-safe via `RwLock`. Register and unregister take the write lock,
/// so mutations on any bucket are linearizable. Broadcasts and stats take
/// the read lock and work from snapshots.
pub struct ConnectionRegistry {
    buckets: RwLock<Buckets>,

    /// Next connection ID to hand out
    next_connection_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            buckets: RwLock::new(Buckets::default()),
            next_connection_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Allocate a process-unique connection ID
    pub fn allocate_id(&self) -> ConnectionId {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate an ID and create a handle sized by the registry config
    pub fn new_connection(&self) -> (ConnectionHandle, mpsc::Receiver<Subtitle>) {
        ConnectionHandle::channel(self.allocate_id(), self.config.outbound_capacity)
    }

    /// Register a connection under an identity
    ///
    /// Registering the same connection under the same identity again is a
    /// no-op. Registering it under a different identity moves it: it is
    /// removed from its old bucket before being inserted in the new one.
    pub async fn register(&self, handle: ConnectionHandle, identity: Identity) -> Registration {
        let id = handle.id();
        let mut buckets = self.buckets.write().await;

        let current = buckets.by_connection.get(&id).cloned();
        let outcome = match current {
            Some(current) if current == identity => return Registration::Unchanged,
            Some(_) => match buckets.remove(id) {
                Some((from, _)) => Registration::Moved { from },
                None => Registration::Inserted,
            },
            None => Registration::Inserted,
        };

        buckets
            .by_identity
            .entry(identity.clone())
            .or_default()
            .insert(id, handle);
        buckets.by_connection.insert(id, identity.clone());

        let connected = buckets.by_identity.get(&identity).map_or(0, HashMap::len);
        drop(buckets);

        match &outcome {
            Registration::Moved { from } => tracing::debug!(
                connection_id = id,
                from = %from,
                auth = %identity,
                connected,
                "Connection re-identified"
            ),
            _ => tracing::debug!(
                connection_id = id,
                auth = %identity,
                connected,
                "Connection registered"
            ),
        }

        outcome
    }

    /// Remove a connection from whichever bucket holds it
    ///
    /// Returns the removed handle, or `None` if the connection was not
    /// registered. Calling this more than once is harmless.
    pub async fn unregister(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        let removed = self.buckets.write().await.remove(id);

        match removed {
            Some((identity, handle)) => {
                tracing::debug!(connection_id = id, auth = %identity, "Connection unregistered");
                Some(handle)
            }
            None => {
                tracing::trace!(connection_id = id, "Unregister of unknown connection ignored");
                None
            }
        }
    }

    /// Snapshot the connections registered under an identity
    ///
    /// The returned handles are clones; later registry changes do not
    /// affect the snapshot.
    pub async fn connections_for(&self, identity: &str) -> Vec<ConnectionHandle> {
        self.buckets
            .read()
            .await
            .by_identity
            .get(identity)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of connections registered under an identity
    pub async fn connection_count_for(&self, identity: &str) -> usize {
        self.buckets
            .read()
            .await
            .by_identity
            .get(identity)
            .map_or(0, HashMap::len)
    }

    /// Identity a connection is currently registered under
    pub async fn identity_of(&self, id: ConnectionId) -> Option<Identity> {
        self.buckets.read().await.by_connection.get(&id).cloned()
    }

    /// Total number of registered connections
    pub async fn connection_count(&self) -> usize {
        self.buckets.read().await.by_connection.len()
    }

    /// Number of identities with at least one connection
    pub async fn identity_count(&self) -> usize {
        self.buckets.read().await.by_identity.len()
    }

    /// Size of every bucket, taken in one pass under the read lock
    pub async fn bucket_sizes(&self) -> Vec<(Identity, usize)> {
        self.buckets
            .read()
            .await
            .by_identity
            .iter()
            .map(|(identity, bucket)| (identity.clone(), bucket.len()))
            .collect()
    }

    /// Close every connection and empty the registry
    ///
    /// Returns the number of connections that were closed.
    pub async fn shutdown(&self) -> usize {
        let drained = std::mem::take(&mut *self.buckets.write().await);

        let mut closed = 0;
        for bucket in drained.by_identity.into_values() {
            for handle in bucket.into_values() {
                handle.close();
                closed += 1;
            }
        }

        tracing::info!(closed, "Registry cleared");
        closed
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn handle(registry: &ConnectionRegistry) -> ConnectionHandle {
        registry.new_connection().0
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = ConnectionRegistry::new();
        let c1 = handle(&registry);
        let c2 = handle(&registry);

        registry.register(c1.clone(), "a".into()).await;
        registry.register(c2.clone(), "a".into()).await;
        assert_eq!(registry.connection_count_for("a").await, 2);
        assert_eq!(registry.identity_count().await, 1);

        registry.unregister(c1.id()).await;
        assert_eq!(registry.connection_count_for("a").await, 1);

        registry.unregister(c2.id()).await;
        assert_eq!(registry.connection_count_for("a").await, 0);
        assert_eq!(registry.identity_count().await, 0);
        assert!(registry.bucket_sizes().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_identity_has_no_connections() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.connection_count_for("nobody").await, 0);
        assert!(registry.connections_for("nobody").await.is_empty());
        assert_eq!(registry.connection_count_for("").await, 0);
    }

    #[tokio::test]
    async fn test_register_same_identity_is_noop() {
        let registry = ConnectionRegistry::new();
        let c1 = handle(&registry);

        assert_eq!(
            registry.register(c1.clone(), "a".into()).await,
            Registration::Inserted
        );
        assert_eq!(
            registry.register(c1.clone(), "a".into()).await,
            Registration::Unchanged
        );
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_reidentify_moves_connection() {
        let registry = ConnectionRegistry::new();
        let c1 = handle(&registry);
        let c2 = handle(&registry);

        registry.register(c1.clone(), "a".into()).await;
        registry.register(c2.clone(), "a".into()).await;

        let outcome = registry.register(c1.clone(), "b".into()).await;
        assert_eq!(outcome, Registration::Moved { from: "a".into() });

        assert_eq!(registry.connection_count_for("a").await, 1);
        assert_eq!(registry.connection_count_for("b").await, 1);
        assert_eq!(registry.connection_count().await, 2);
        assert_eq!(registry.identity_of(c1.id()).await, Some("b".into()));
    }

    #[tokio::test]
    async fn test_reidentify_last_connection_drops_old_bucket() {
        let registry = ConnectionRegistry::new();
        let c1 = handle(&registry);

        registry.register(c1.clone(), "a".into()).await;
        registry.register(c1.clone(), "b".into()).await;

        assert_eq!(registry.identity_count().await, 1);
        assert_eq!(registry.connection_count_for("a").await, 0);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let c1 = handle(&registry);
        let c2 = handle(&registry);
        registry.register(c1.clone(), "a".into()).await;
        registry.register(c2.clone(), "a".into()).await;

        assert!(registry.unregister(c1.id()).await.is_some());
        assert!(registry.unregister(c1.id()).await.is_none());
        assert!(registry.unregister(9_999).await.is_none());

        assert_eq!(registry.connection_count_for("a").await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let registry = ConnectionRegistry::new();
        let c1 = handle(&registry);
        registry.register(c1.clone(), "a".into()).await;

        let snapshot = registry.connections_for("a").await;
        registry.unregister(c1.id()).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.connection_count_for("a").await, 0);
    }

    #[tokio::test]
    async fn test_allocate_id_is_unique() {
        let registry = ConnectionRegistry::new();
        let a = registry.allocate_id();
        let b = registry.allocate_id();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = registry.new_connection();
        let (c2, _rx2) = registry.new_connection();
        registry.register(c1.clone(), "a".into()).await;
        registry.register(c2.clone(), "b".into()).await;

        assert_eq!(registry.shutdown().await, 2);
        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(registry.identity_count().await, 0);

        assert!(c1.is_closed());
        assert!(c2.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_unregister() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut tasks = Vec::new();

        for i in 0..64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let (c, _rx) = registry.new_connection();
                let first: Identity = format!("user-{}", i % 4).into();
                let second: Identity = format!("user-{}", (i + 1) % 4).into();

                registry.register(c.clone(), first).await;
                registry.register(c.clone(), second.clone()).await;
                assert_eq!(registry.identity_of(c.id()).await, Some(second));

                if i % 2 == 0 {
                    registry.unregister(c.id()).await;
                    registry.unregister(c.id()).await;
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }

        let sizes = registry.bucket_sizes().await;
        assert!(sizes.iter().all(|(_, n)| *n > 0));
        let total: usize = sizes.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 32);
        assert_eq!(registry.connection_count().await, 32);
    }
}
