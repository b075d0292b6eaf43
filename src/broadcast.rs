//! Subtitle fan-out
//!
//! Resolves the connections of an identity and hands the subtitle to each
//! of them. A failing connection is dropped from the registry without
//! affecting delivery to its siblings.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::error::{Error, Result};
use crate::registry::{ConnectionRegistry, Subtitle};
use crate::stats::ServerCounters;

/// Delivers subtitles to every connection registered under an identity
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    counters: Arc<ServerCounters>,
}

impl Broadcaster {
    /// Create a broadcaster over a shared registry
    pub fn new(registry: Arc<ConnectionRegistry>, counters: Arc<ServerCounters>) -> Self {
        Self { registry, counters }
    }

    /// Send a subtitle to every connection of `identity`
    ///
    /// Returns the number of connections the subtitle was handed off to.
    /// Only an empty `text` is an error; an unknown or empty identity simply
    /// has no recipients.
    pub async fn send_subtitle(&self, identity: &str, text: &str) -> Result<usize> {
        if text.is_empty() {
            return Err(Error::invalid_input("Subtitle is not provided"));
        }

        self.counters.record_subtitle();

        let recipients = self.registry.connections_for(identity).await;
        if recipients.is_empty() {
            tracing::debug!(auth = %identity, "Subtitle has no recipients");
            return Ok(0);
        }

        let subtitle = Subtitle::new(text);
        let timeout = self.registry.config().delivery_timeout;

        let results = join_all(recipients.iter().map(|handle| {
            let subtitle = subtitle.clone();
            async move { (handle, handle.send(subtitle, timeout).await) }
        }))
        .await;

        let mut delivered = 0;
        for (handle, result) in results {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = handle.id(),
                        auth = %identity,
                        error = %e,
                        "Delivery failed, dropping connection"
                    );
                    self.counters.record_delivery_failure();
                    self.registry.unregister(handle.id()).await;
                    handle.close();
                }
            }
        }

        self.counters.record_deliveries(delivered);

        tracing::debug!(
            auth = %identity,
            recipients = recipients.len(),
            delivered = delivered,
            "Subtitle broadcast"
        );

        Ok(delivered)
    }

    /// Number of connections currently registered under `identity`
    pub async fn connected_clients(&self, identity: &str) -> usize {
        self.registry.connection_count_for(identity).await
    }

    /// The registry this broadcaster reads from
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::registry::RegistryConfig;

    fn broadcaster(config: RegistryConfig) -> Broadcaster {
        Broadcaster::new(
            Arc::new(ConnectionRegistry::with_config(config)),
            Arc::new(ServerCounters::new()),
        )
    }

    #[tokio::test]
    async fn test_send_subtitle_reaches_every_connection() {
        let b = broadcaster(RegistryConfig::default());
        let (c1, mut rx1) = b.registry().new_connection();
        let (c2, mut rx2) = b.registry().new_connection();
        let (c3, mut rx3) = b.registry().new_connection();
        b.registry().register(c1, "alice@example.com".into()).await;
        b.registry().register(c2, "alice@example.com".into()).await;
        b.registry().register(c3, "bob@example.com".into()).await;

        let delivered = assert_ok!(b.send_subtitle("alice@example.com", "Hola").await);
        assert_eq!(delivered, 2);

        let expected = Some(Subtitle::new("Hola"));
        assert_eq!(rx1.recv().await, expected);
        assert_eq!(rx2.recv().await, expected);
        assert!(rx3.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_text_is_invalid_input() {
        let b = broadcaster(RegistryConfig::default());
        let err = assert_err!(b.send_subtitle("alice", "").await);
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unknown_or_empty_identity_has_zero_recipients() {
        let b = broadcaster(RegistryConfig::default());
        assert_eq!(b.send_subtitle("nobody", "hi").await.unwrap(), 0);
        assert_eq!(b.send_subtitle("", "hi").await.unwrap(), 0);
        assert_eq!(b.connected_clients("nobody").await, 0);
    }

    #[tokio::test]
    async fn test_failed_connection_is_dropped_and_siblings_still_served() {
        let b = broadcaster(RegistryConfig::default());
        let (alive, mut alive_rx) = b.registry().new_connection();
        let (dead, dead_rx) = b.registry().new_connection();
        b.registry().register(alive, "a".into()).await;
        b.registry().register(dead, "a".into()).await;
        drop(dead_rx);

        let delivered = b.send_subtitle("a", "line").await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(b.connected_clients("a").await, 1);
        assert_eq!(alive_rx.recv().await, Some(Subtitle::new("line")));
        assert_eq!(b.counters.snapshot().delivery_failures, 1);
    }

    #[tokio::test]
    async fn test_stalled_connection_times_out() {
        let config = RegistryConfig::default()
            .outbound_capacity(1)
            .delivery_timeout(Duration::from_millis(20));
        let b = broadcaster(config);
        let (stalled, _stalled_rx) = b.registry().new_connection();
        b.registry().register(stalled.clone(), "a".into()).await;

        assert_eq!(b.send_subtitle("a", "first").await.unwrap(), 1);
        assert_eq!(b.send_subtitle("a", "second").await.unwrap(), 0);
        assert_eq!(b.connected_clients("a").await, 0);
        assert!(stalled.is_closed());
    }

    #[tokio::test]
    async fn test_connected_clients_tracks_registry() {
        let b = broadcaster(RegistryConfig::default());
        let (c1, _rx1) = b.registry().new_connection();
        let (c2, _rx2) = b.registry().new_connection();
        b.registry().register(c1.clone(), "a".into()).await;
        b.registry().register(c2.clone(), "a".into()).await;
        assert_eq!(b.connected_clients("a").await, 2);

        b.registry().unregister(c1.id()).await;
        assert_eq!(b.connected_clients("a").await, 1);
        b.registry().unregister(c2.id()).await;
        assert_eq!(b.connected_clients("a").await, 0);
    }
}
