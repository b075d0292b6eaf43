//! Caption relay server
//!
//! Owns the process-wide registry and everything that shares it, serves
//! HTTP, and tears it all down on shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::registry::{ConnectionRegistry, RegistryConfig};
use crate::server::config::ServerConfig;
use crate::server::routes::{self, AppState};
use crate::server::sessions::SessionSpawner;
use crate::session::SessionContext;
use crate::stats::{ServerCounters, StatsCollector};

/// Caption relay server
pub struct CaptionServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Broadcaster,
    stats: StatsCollector,
    sessions: SessionSpawner,
    shutdown: CancellationToken,
}

impl CaptionServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::with_config(registry_config));
        let counters = Arc::new(ServerCounters::new());
        let shutdown = CancellationToken::new();

        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&counters));
        let stats = StatsCollector::new(Arc::clone(&registry), Arc::clone(&counters))
            .include_per_identity(config.include_per_identity_stats);
        let ctx = SessionContext::new(
            Arc::clone(&registry),
            config.session_config(),
            shutdown.clone(),
        );
        let sessions = SessionSpawner::new(ctx, counters, config.max_connections);

        Self {
            config,
            registry,
            broadcaster,
            stats,
            sessions,
            shutdown,
        }
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    pub fn sessions(&self) -> &SessionSpawner {
        &self.sessions
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Build the HTTP router over this server's shared state
    pub fn router(&self) -> Router {
        routes::router(AppState {
            broadcaster: self.broadcaster.clone(),
            stats: self.stats.clone(),
            sessions: self.sessions.clone(),
        })
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(addr = %listener.local_addr()?, "Caption relay listening");

        let token = self.shutdown.clone();
        let signal = async move {
            tokio::select! {
                _ = shutdown => tracing::info!("Shutdown signal received"),
                _ = token.cancelled() => {}
            }
            token.cancel();
        };

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await;

        self.shutdown().await;

        result.map_err(Into::into)
    }

    /// Close every connection and wait for session tasks to finish
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let closed = self.registry.shutdown().await;

        let wait = self.sessions.close_and_wait();
        if tokio::time::timeout(self.config.shutdown_timeout, wait)
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.sessions.active(),
                "Session tasks still running after shutdown timeout"
            );
        }

        tracing::info!(closed = closed, "Caption relay stopped");
    }

    /// Token cancelled when shutdown begins
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
