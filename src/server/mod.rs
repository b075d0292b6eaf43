//! Caption relay server
//!
//! HTTP dispatch, WebSocket admission and process lifecycle around the core.

pub mod config;
pub mod error;
pub mod listener;
pub mod routes;
pub mod sessions;

pub use config::ServerConfig;
pub use error::ApiError;
pub use listener::CaptionServer;
pub use routes::AppState;
pub use sessions::SessionSpawner;
