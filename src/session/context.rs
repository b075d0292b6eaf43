//! Session context
//!
//! Everything a session task needs from the server, bundled so the task
//! does not hold a reference to the server itself.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::registry::ConnectionRegistry;

/// Timeouts applied by a session task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long a new connection may take to identify itself
    pub handshake_timeout: Duration,

    /// Deadline for a single write to the transport
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared handles passed to every session task
#[derive(Clone)]
pub struct SessionContext {
    /// Process-wide registry
    pub registry: Arc<ConnectionRegistry>,

    /// Timeouts
    pub config: SessionConfig,

    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
}

impl SessionContext {
    /// Bundle the registry, timeouts and shutdown token for session tasks
    pub fn new(registry: Arc<ConnectionRegistry>, config: SessionConfig, shutdown: CancellationToken) -> Self {
        Self {
            registry,
            config,
            shutdown,
        }
    }
}
