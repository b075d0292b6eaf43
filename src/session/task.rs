//! Per-connection session task
//!
//! One task per viewer. It owns both transport halves, waits for the
//! identity handshake, then multiplexes four event sources until one of
//! them ends the session:
//!
//! - the server shutdown token
//! - the connection's close token
//! - the outbound queue fed by the broadcaster
//! - inbound frames from the viewer
//!
//! Whatever ends the session, the connection is unregistered and the
//! transport closed before the task returns.

use std::time::Duration;

use crate::error::TransportError;
use crate::registry::{ConnectionHandle, Identity, Subtitle};
use crate::transport::{ClientMessage, FrameSink, FrameSource, ServerMessage};

use super::context::SessionContext;
use super::state::ConnectionState;

const AUTH_MISSING: &str = "Auth is not provided";

/// Write one frame, bounded by `timeout`
async fn write<S: FrameSink>(
    sink: &mut S,
    message: ServerMessage,
    timeout: Duration,
) -> Result<(), TransportError> {
    match tokio::time::timeout(timeout, sink.send(message)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}

/// Run a connection from open to close
///
/// `identity` is the handshake parameter, if the transport supplied one.
/// Otherwise the first `auth` frame identifies the connection. Returns the
/// final connection state, which is always `Closed`.
pub async fn run_session<S, R>(
    mut sink: S,
    mut source: R,
    identity: Option<Identity>,
    ctx: SessionContext,
) -> ConnectionState
where
    S: FrameSink,
    R: FrameSource,
{
    let (handle, mut outbound) = ctx.registry.new_connection();
    let mut state = ConnectionState::new(handle.id());

    tracing::debug!(connection_id = state.id, "Connection opened");

    let identity = if ctx.shutdown.is_cancelled() {
        None
    } else {
        match identity.filter(|i| !i.is_empty()) {
            Some(identity) => Some(identity),
            None => await_identity(&mut sink, &mut source, &ctx, state.id).await,
        }
    };

    let reason = match identity {
        Some(identity) => {
            if let Err(e) = register(&mut sink, &handle, identity, &mut state, &ctx).await {
                tracing::debug!(connection_id = state.id, error = %e, "Registration ack failed");
                "write failed"
            } else {
                serve(&mut sink, &mut source, &handle, &mut outbound, &mut state, &ctx).await
            }
        }
        None => "no identity",
    };

    ctx.registry.unregister(state.id).await;
    sink.close().await;
    state.close();

    tracing::debug!(
        connection_id = state.id,
        auth = ?state.identity.as_ref().map(Identity::as_str),
        subtitles_sent = state.subtitles_sent,
        duration_ms = state.duration().as_millis() as u64,
        reason = reason,
        "Connection closed"
    );

    state
}

/// Wait for the first usable `auth` frame
async fn await_identity<S, R>(
    sink: &mut S,
    source: &mut R,
    ctx: &SessionContext,
    id: u64,
) -> Option<Identity>
where
    S: FrameSink,
    R: FrameSource,
{
    let write_timeout = ctx.config.write_timeout;
    let deadline = tokio::time::sleep(ctx.config.handshake_timeout);
    tokio::pin!(deadline);

    loop {
        let reply = tokio::select! {
            _ = &mut deadline => {
                tracing::debug!(connection_id = id, "Handshake timed out");
                return None;
            }
            _ = ctx.shutdown.cancelled() => return None,
            frame = source.next_frame() => match frame {
                Some(Ok(ClientMessage::Auth { auth })) if !auth.is_empty() => {
                    return Some(auth.into());
                }
                Some(Ok(ClientMessage::Auth { .. })) => ServerMessage::Error {
                    message: AUTH_MISSING.into(),
                },
                Some(Ok(ClientMessage::Ping)) => ServerMessage::Pong,
                Some(Err(TransportError::Protocol(message))) => ServerMessage::Error { message },
                Some(Err(_)) | None => return None,
            },
        };

        if write(sink, reply, write_timeout).await.is_err() {
            return None;
        }
    }
}

/// Register under `identity` and acknowledge to the viewer
async fn register<S: FrameSink>(
    sink: &mut S,
    handle: &ConnectionHandle,
    identity: Identity,
    state: &mut ConnectionState,
    ctx: &SessionContext,
) -> Result<(), TransportError> {
    ctx.registry.register(handle.clone(), identity.clone()).await;
    state.on_registered(identity.clone());

    let connected = ctx.registry.connection_count_for(identity.as_str()).await;
    write(
        sink,
        ServerMessage::Registered {
            auth: identity.as_str().to_owned(),
            connected,
        },
        ctx.config.write_timeout,
    )
    .await
}

/// Main loop of a registered connection; returns why it ended
async fn serve<S, R>(
    sink: &mut S,
    source: &mut R,
    handle: &ConnectionHandle,
    outbound: &mut tokio::sync::mpsc::Receiver<Subtitle>,
    state: &mut ConnectionState,
    ctx: &SessionContext,
) -> &'static str
where
    S: FrameSink,
    R: FrameSource,
{
    let write_timeout = ctx.config.write_timeout;

    loop {
        tokio::select! {
            biased;

            _ = ctx.shutdown.cancelled() => return "shutdown",
            _ = handle.closed() => return "closed by server",

            subtitle = outbound.recv() => match subtitle {
                Some(subtitle) => {
                    let message = ServerMessage::Subtitle {
                        subtitle: subtitle.text().to_owned(),
                    };
                    if let Err(e) = write(sink, message, write_timeout).await {
                        tracing::warn!(connection_id = state.id, error = %e, "Subtitle write failed");
                        return "write failed";
                    }
                    state.subtitles_sent += 1;
                }
                None => return "closed by server",
            },

            frame = source.next_frame() => {
                let result = match frame {
                    Some(Ok(ClientMessage::Auth { auth })) if !auth.is_empty() => {
                        register(sink, handle, auth.into(), state, ctx).await
                    }
                    Some(Ok(ClientMessage::Auth { .. })) => {
                        let message = ServerMessage::Error { message: AUTH_MISSING.into() };
                        write(sink, message, write_timeout).await
                    }
                    Some(Ok(ClientMessage::Ping)) => write(sink, ServerMessage::Pong, write_timeout).await,
                    Some(Err(TransportError::Protocol(message))) => {
                        tracing::debug!(connection_id = state.id, reason = %message, "Ignoring malformed frame");
                        write(sink, ServerMessage::Error { message }, write_timeout).await
                    }
                    Some(Err(_)) => return "read failed",
                    None => return "peer disconnected",
                };

                if let Err(e) = result {
                    tracing::debug!(connection_id = state.id, error = %e, "Reply write failed");
                    return "write failed";
                }
            }
        }
    }
}
