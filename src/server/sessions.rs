//! Session admission and spawning
//!
//! Every session task is spawned on one `TaskTracker`, so shutdown can wait
//! for all of them.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::registry::Identity;
use crate::session::{run_session, ConnectionState, SessionContext};
use crate::stats::ServerCounters;
use crate::transport::{channel, ChannelClient, FrameSink, FrameSource};

use super::error::ApiError;

/// Admits and spawns viewer sessions
#[derive(Clone)]
pub struct SessionSpawner {
    ctx: SessionContext,
    tracker: TaskTracker,
    counters: Arc<ServerCounters>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl SessionSpawner {
    pub fn new(ctx: SessionContext, counters: Arc<ServerCounters>, max_connections: usize) -> Self {
        let connection_semaphore = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };

        Self {
            ctx,
            tracker: TaskTracker::new(),
            counters,
            connection_semaphore,
        }
    }

    /// Check whether a new connection may be accepted
    ///
    /// The returned permit, if any, must live as long as the session.
    pub fn admit(&self) -> Result<Option<OwnedSemaphorePermit>, ApiError> {
        if self.is_shutting_down() {
            return Err(ApiError::Unavailable("Server is shutting down".into()));
        }

        match &self.connection_semaphore {
            Some(sem) => match sem.clone().try_acquire_owned() {
                Ok(permit) => Ok(Some(permit)),
                Err(_) => {
                    tracing::warn!("Connection rejected: limit reached");
                    Err(ApiError::Unavailable("Connection limit reached".into()))
                }
            },
            None => Ok(None),
        }
    }

    /// Whether server shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.ctx.shutdown.is_cancelled()
    }

    /// Spawn a session task over an already-admitted transport
    pub fn spawn<S, R>(
        &self,
        sink: S,
        source: R,
        identity: Option<Identity>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> JoinHandle<ConnectionState>
    where
        S: FrameSink,
        R: FrameSource,
    {
        self.counters.record_connection();
        let ctx = self.ctx.clone();

        self.tracker.spawn(async move {
            let _permit = permit;
            run_session(sink, source, identity, ctx).await
        })
    }

    /// Admit and spawn an in-process viewer
    pub fn connect_channel(&self, identity: Option<Identity>) -> Result<ChannelClient, ApiError> {
        let permit = self.admit()?;
        let (sink, source, client) = channel::pair();
        self.spawn(sink, source, identity, permit);
        Ok(client)
    }

    /// Number of session tasks still running
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Stop admitting and wait for running sessions
    pub(crate) async fn close_and_wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
