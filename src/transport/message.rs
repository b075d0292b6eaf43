//! Viewer wire frames
//!
//! Every frame is a JSON text message tagged by `type`.
//!
//! ```text
//! client -> server   {"type":"auth","auth":"alice@example.com"}
//!                    {"type":"ping"}
//! server -> client   {"type":"registered","auth":"alice@example.com","connected":2}
//!                    {"type":"subtitle","subtitle":"Hola"}
//!                    {"type":"pong"}
//!                    {"type":"error","message":"..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Frame sent by a viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identify (or re-identify) this connection
    Auth { auth: String },
    /// Keepalive
    Ping,
}

impl ClientMessage {
    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self, TransportError> {
        serde_json::from_str(text).map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

/// Frame sent to a viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The connection is now registered under `auth`
    Registered { auth: String, connected: usize },
    /// A subtitle line from the producer
    Subtitle { subtitle: String },
    /// Reply to [`ClientMessage::Ping`]
    Pong,
    /// The last frame could not be handled
    Error { message: String },
}

impl ServerMessage {
    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth() {
        let msg = ClientMessage::parse(r#"{"type":"auth","auth":"a+b@example.com"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Auth {
                auth: "a+b@example.com".into()
            }
        );
    }

    #[test]
    fn test_parse_ping() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        );
    }

    #[test]
    fn test_parse_garbage_is_protocol_error() {
        let err = ClientMessage::parse("hello").unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));

        let err = ClientMessage::parse(r#"{"type":"subscribe"}"#).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn test_subtitle_encoding() {
        let json = ServerMessage::Subtitle {
            subtitle: "Hola".into(),
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"subtitle","subtitle":"Hola"}"#);
    }

    #[test]
    fn test_registered_encoding() {
        let json = ServerMessage::Registered {
            auth: "a".into(),
            connected: 2,
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"registered","auth":"a","connected":2}"#);
    }
}
