//! Connection registry for identity-scoped fan-out
//!
//! The registry maps each identity to the connections registered under it.
//! One instance lives for the whole process and is shared by the connection
//! accept path and the HTTP dispatch path.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<ConnectionRegistry>
//!                 ┌──────────────────────────────────┐
//!                 │ by_identity: HashMap<Identity,   │
//!                 │   HashMap<ConnectionId,          │
//!                 │     ConnectionHandle { tx }>>    │
//!                 │ by_connection: HashMap<Id, Idn>  │
//!                 └────────────────┬─────────────────┘
//!                                  │
//!        ┌─────────────────────────┼─────────────────────────┐
//!        │                         │                         │
//!        ▼                         ▼                         ▼
//!   [Broadcaster]             [Session task]            [Session task]
//!   send_subtitle()           outbound_rx.recv()        outbound_rx.recv()
//!        │                         │                         │
//!        └──► handle.send() ──► mpsc ──► sink.send() ──► WebSocket
//! ```
//!
//! Handles never touch the transport. Each session task owns its transport
//! and drains a bounded queue, so a slow viewer only ever stalls its own
//! queue.

pub mod config;
pub mod connection;
pub mod identity;
pub mod store;

pub use config::RegistryConfig;
pub use connection::{ConnectionHandle, ConnectionId};
pub use identity::{Identity, Subtitle};
pub use store::{ConnectionRegistry, Registration};
