//! Connection state machine
//!
//! Tracks one viewer connection from transport open to close.

use std::time::{Duration, Instant};

use crate::registry::{ConnectionId, Identity};

/// Connection lifecycle phase
///
/// ```text
/// Connecting ──auth──► Registered ──┐
///     │                  ▲   │      │ re-auth
///     │                  └───┘◄─────┘
///     └──────────────► Closed ◄──── disconnect / error / shutdown
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Transport open, identity not known yet
    Connecting,
    /// Identity known, present in the registry
    Registered,
    /// Removed from the registry, transport released
    Closed,
}

/// Per-connection state owned by the session task
#[derive(Debug)]
pub struct ConnectionState {
    /// Connection ID
    pub id: ConnectionId,

    /// Current phase
    pub phase: ConnectionPhase,

    /// Identity the connection is registered under
    pub identity: Option<Identity>,

    /// Transport open time
    pub connected_at: Instant,

    /// Time of the most recent (re-)registration
    pub registered_at: Option<Instant>,

    /// Subtitles written to the transport
    pub subtitles_sent: u64,
}

impl ConnectionState {
    /// Create state for a connection that has not identified yet
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            phase: ConnectionPhase::Connecting,
            identity: None,
            connected_at: Instant::now(),
            registered_at: None,
            subtitles_sent: 0,
        }
    }

    /// Record a successful (re-)registration
    ///
    /// Returns `false` if the connection is already closed.
    pub fn on_registered(&mut self, identity: Identity) -> bool {
        if self.phase == ConnectionPhase::Closed {
            return false;
        }
        self.identity = Some(identity);
        self.registered_at = Some(Instant::now());
        self.phase = ConnectionPhase::Registered;
        true
    }

    /// Move to `Closed`; returns `false` if it already was
    pub fn close(&mut self) -> bool {
        if self.phase == ConnectionPhase::Closed {
            return false;
        }
        self.phase = ConnectionPhase::Closed;
        true
    }

    /// Whether the connection is currently registered
    pub fn is_registered(&self) -> bool {
        self.phase == ConnectionPhase::Registered
    }

    /// Connection duration
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_lifecycle() {
        let mut state = ConnectionState::new(1);
        assert_eq!(state.phase, ConnectionPhase::Connecting);
        assert!(state.identity.is_none());

        assert!(state.on_registered("alice".into()));
        assert_eq!(state.phase, ConnectionPhase::Registered);
        assert!(state.is_registered());
        assert!(state.registered_at.is_some());

        assert!(state.close());
        assert_eq!(state.phase, ConnectionPhase::Closed);
    }

    #[test]
    fn test_close_from_connecting() {
        let mut state = ConnectionState::new(1);
        assert!(state.close());
        assert_eq!(state.phase, ConnectionPhase::Closed);
        assert!(state.identity.is_none());
    }

    #[test]
    fn test_reregister_changes_identity() {
        let mut state = ConnectionState::new(1);
        state.on_registered("a".into());
        state.on_registered("b".into());
        assert_eq!(state.identity, Some("b".into()));
        assert!(state.is_registered());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut state = ConnectionState::new(1);
        state.on_registered("a".into());
        state.close();

        assert!(!state.close());
        assert!(!state.on_registered("b".into()));
        assert_eq!(state.phase, ConnectionPhase::Closed);
        assert_eq!(state.identity, Some("a".into()));
    }
}
