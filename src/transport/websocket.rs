//! WebSocket transport backed by axum

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use crate::error::TransportError;

use super::{ClientMessage, FrameSink, FrameSource, ServerMessage};

/// Outbound half of an upgraded WebSocket
pub struct WsSink(SplitSink<WebSocket, Message>);

/// Inbound half of an upgraded WebSocket
pub struct WsSource(SplitStream<WebSocket>);

/// Split an upgraded socket into transport halves
pub fn split(socket: WebSocket) -> (WsSink, WsSource) {
    let (sink, stream) = socket.split();
    (WsSink(sink), WsSource(stream))
}

impl FrameSink for WsSink {
    async fn send(&mut self, message: ServerMessage) -> Result<(), TransportError> {
        let json = message.to_json()?;
        self.0
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) {
        let _ = self.0.close().await;
    }
}

impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<ClientMessage, TransportError>> {
        loop {
            match self.0.next().await? {
                Ok(Message::Text(text)) => return Some(ClientMessage::parse(text.as_str())),
                Ok(Message::Binary(_)) => {
                    return Some(Err(TransportError::Protocol(
                        "binary frames are not supported".into(),
                    )))
                }
                Ok(Message::Close(_)) => return None,
                // Ping/pong are answered by the socket itself
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "WebSocket read failed");
                    return Some(Err(TransportError::Closed));
                }
            }
        }
    }
}
