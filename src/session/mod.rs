//! Viewer sessions
//!
//! A session is the task that owns one connection's transport for its
//! whole life, from handshake to close.

pub mod context;
pub mod state;
pub mod task;

pub use context::{SessionConfig, SessionContext};
pub use state::{ConnectionPhase, ConnectionState};
pub use task::run_session;
