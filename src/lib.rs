//! caption-relay: live subtitle fan-out
//!
//! Producers push subtitle text tagged with an opaque identity ("auth").
//! Every viewer connection registered under the same identity receives it.
//!
//! # Example
//!
//! ```no_run
//! use caption_relay::{CaptionServer, ServerConfig};
//!
//! # async fn example() -> caption_relay::Result<()> {
//! let server = CaptionServer::new(ServerConfig::default());
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod transport;

pub use broadcast::Broadcaster;
pub use error::{Error, Result, TransportError};
pub use registry::{ConnectionRegistry, Identity, RegistryConfig};
pub use server::{CaptionServer, ServerConfig};
pub use stats::{StatsCollector, StatsSnapshot};
