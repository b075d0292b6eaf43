//! In-process transport over tokio channels
//!
//! Lets a viewer live in the same process as the relay, for embedding and
//! for driving sessions in tests without a socket.

use tokio::sync::mpsc;

use crate::error::TransportError;

use super::{ClientMessage, FrameSink, FrameSource, ServerMessage};

/// Outbound half: frames the relay writes
pub struct ChannelSink {
    tx: Option<mpsc::UnboundedSender<ServerMessage>>,
}

/// Inbound half: frames the viewer wrote
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<ClientMessage>,
}

/// The viewer's end of a channel transport
pub struct ChannelClient {
    to_server: Option<mpsc::UnboundedSender<ClientMessage>>,
    from_server: mpsc::UnboundedReceiver<ServerMessage>,
}

/// Create a connected transport and its viewer end
pub fn pair() -> (ChannelSink, ChannelSource, ChannelClient) {
    let (to_server, server_rx) = mpsc::unbounded_channel();
    let (server_tx, from_server) = mpsc::unbounded_channel();

    (
        ChannelSink {
            tx: Some(server_tx),
        },
        ChannelSource { rx: server_rx },
        ChannelClient {
            to_server: Some(to_server),
            from_server,
        },
    )
}

impl FrameSink for ChannelSink {
    async fn send(&mut self, message: ServerMessage) -> Result<(), TransportError> {
        match &self.tx {
            Some(tx) => tx.send(message).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) {
        self.tx = None;
    }
}

impl FrameSource for ChannelSource {
    async fn next_frame(&mut self) -> Option<Result<ClientMessage, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}

impl ChannelClient {
    /// Send a frame to the relay
    pub fn send(&self, message: ClientMessage) -> Result<(), TransportError> {
        match &self.to_server {
            Some(tx) => tx.send(message).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    /// Identify as `auth`
    pub fn authenticate(&self, auth: impl Into<String>) -> Result<(), TransportError> {
        self.send(ClientMessage::Auth { auth: auth.into() })
    }

    /// Wait for the next frame from the relay; `None` once it closed
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.from_server.recv().await
    }

    /// Stop sending; the relay sees end-of-stream
    pub fn disconnect(&mut self) {
        self.to_server = None;
    }
}
