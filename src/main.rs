use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use caption_relay::{CaptionServer, RegistryConfig, ServerConfig};

#[derive(Parser)]
#[command(name = "caption-relay")]
#[command(about = "Relay live subtitles from producers to every viewer sharing an auth")]
struct Args {
    /// Address to bind the HTTP/WebSocket server to
    #[arg(short, long, env = "CAPTION_RELAY_BIND", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Maximum concurrent viewer connections (0 for unlimited)
    #[arg(long, env = "CAPTION_RELAY_MAX_CONNECTIONS", default_value = "0")]
    max_connections: usize,

    /// Seconds a viewer has to send its auth
    #[arg(long, env = "CAPTION_RELAY_HANDSHAKE_TIMEOUT", default_value = "10")]
    handshake_timeout: u64,

    /// Milliseconds allowed for one write to a viewer
    #[arg(long, env = "CAPTION_RELAY_WRITE_TIMEOUT_MS", default_value = "5000")]
    write_timeout_ms: u64,

    /// Milliseconds shutdown waits for viewer sessions to finish
    #[arg(long, env = "CAPTION_RELAY_SHUTDOWN_TIMEOUT_MS", default_value = "5000")]
    shutdown_timeout_ms: u64,

    /// Milliseconds a broadcast waits on a backed-up viewer queue
    #[arg(long, env = "CAPTION_RELAY_DELIVERY_TIMEOUT_MS", default_value = "2000")]
    delivery_timeout_ms: u64,

    /// Pending subtitles buffered per viewer
    #[arg(long, env = "CAPTION_RELAY_OUTBOUND_CAPACITY", default_value = "64")]
    outbound_capacity: usize,

    /// Include per-auth connection counts in /stats
    #[arg(long, env = "CAPTION_RELAY_PER_IDENTITY_STATS")]
    per_identity_stats: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> caption_relay::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "caption_relay=debug,tower_http=debug"
    } else {
        "caption_relay=info,tower_http=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::with_addr(args.bind)
        .max_connections(args.max_connections)
        .handshake_timeout(Duration::from_secs(args.handshake_timeout))
        .write_timeout(Duration::from_millis(args.write_timeout_ms))
        .shutdown_timeout(Duration::from_millis(args.shutdown_timeout_ms))
        .per_identity_stats(args.per_identity_stats);

    let registry_config = RegistryConfig::default()
        .outbound_capacity(args.outbound_capacity)
        .delivery_timeout(Duration::from_millis(args.delivery_timeout_ms));

    let server = CaptionServer::with_registry_config(config, registry_config);

    tracing::info!("Endpoints:");
    tracing::info!("  POST /subtitle   - Broadcast a subtitle to an auth");
    tracing::info!("  POST /connected  - Count viewers of an auth");
    tracing::info!("  GET  /stats      - Registry statistics");
    tracing::info!("  GET  /ws         - Viewer WebSocket (?auth=...)");

    server.run_until(shutdown_signal()).await
}
