//! Connection handles stored in the registry
//!
//! A handle is the registry's view of one live connection. The transport
//! itself is owned by the connection's session task; the handle holds the
//! sending half of that task's outbound queue and the token that closes it.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::error::TransportError;

use super::identity::Subtitle;

/// Process-unique connection identifier
pub type ConnectionId = u64;

/// Registry-side handle to a live connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    established_at: Instant,
    tx: mpsc::Sender<Subtitle>,
    close: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end its session task drains
    pub fn channel(id: ConnectionId, capacity: usize) -> (Self, mpsc::Receiver<Subtitle>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id,
                established_at: Instant::now(),
                tx,
                close: CancellationToken::new(),
            },
            rx,
        )
    }

    /// Connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// When the connection was established
    pub fn established_at(&self) -> Instant {
        self.established_at
    }

    /// How long the connection has been alive
    pub fn age(&self) -> Duration {
        self.established_at.elapsed()
    }

    /// Whether the connection was closed or its session task has gone away
    pub fn is_closed(&self) -> bool {
        self.close.is_cancelled() || self.tx.is_closed()
    }

    /// Hand a subtitle off to the session task
    ///
    /// Waits at most `timeout` for room in the queue.
    pub async fn send(&self, subtitle: Subtitle, timeout: Duration) -> Result<(), TransportError> {
        if self.close.is_cancelled() {
            return Err(TransportError::Closed);
        }
        match self.tx.send_timeout(subtitle, timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(TransportError::Timeout),
            Err(SendTimeoutError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    /// Tell the session task to close the transport
    ///
    /// Never waits, and takes effect even when the outbound queue is full.
    pub fn close(&self) {
        if !self.close.is_cancelled() {
            tracing::debug!(connection_id = self.id, "Closing connection");
        }
        self.close.cancel();
    }

    /// Resolves once [`close`](Self::close) has been called on any clone
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.close.cancelled()
    }
}
