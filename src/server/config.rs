//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::session::SessionConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent viewer connections (0 = unlimited)
    pub max_connections: usize,

    /// A new connection must identify itself within this time
    pub handshake_timeout: Duration,

    /// Deadline for a single write to a viewer transport
    pub write_timeout: Duration,

    /// How long shutdown waits for session tasks to finish
    pub shutdown_timeout: Duration,

    /// Report per-identity connection counts in `/stats`
    pub include_per_identity_stats: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
            include_per_identity_stats: false,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Report per-identity counts in stats
    pub fn per_identity_stats(mut self, enabled: bool) -> Self {
        self.include_per_identity_stats = enabled;
        self
    }

    /// Timeouts handed to each session task
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            handshake_timeout: self.handshake_timeout,
            write_timeout: self.write_timeout,
        }
    }
}
