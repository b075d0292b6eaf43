//! Viewer transports
//!
//! A transport is split in two halves so the session task can wait on
//! inbound frames while writing outbound ones. The session task owns both
//! halves; nothing else ever touches them.

use std::future::Future;

use crate::error::TransportError;

pub mod channel;
pub mod message;
pub mod websocket;

pub use channel::{ChannelClient, ChannelSink, ChannelSource};
pub use message::{ClientMessage, ServerMessage};
pub use websocket::{WsSink, WsSource};

/// Outbound half of a transport
pub trait FrameSink: Send + 'static {
    /// Write one frame to the peer
    fn send(
        &mut self,
        message: ServerMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the transport; errors are ignored
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Inbound half of a transport
pub trait FrameSource: Send + 'static {
    /// Wait for the next frame from the peer
    ///
    /// Returns `None` once the peer has gone away. `Some(Err(Protocol))`
    /// reports a frame that could not be parsed; the stream is still usable
    /// afterwards. Any other error ends the stream.
    fn next_frame(
        &mut self,
    ) -> impl Future<Output = Option<Result<ClientMessage, TransportError>>> + Send;
}
