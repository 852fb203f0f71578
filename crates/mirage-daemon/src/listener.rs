//! TCP accept loop.
//!
//! Binds a single address and spawns one independent [`SessionEngine`]
//! task per accepted connection. Sessions share nothing mutable with
//! each other — only the store (safe for concurrent writers) and a
//! read-only view of the pipeline.
//!
//! # Concurrency ceiling
//!
//! A semaphore permit is acquired *before* accepting, so at most
//! `max_connections` sessions run at once; further peers queue in the
//! TCP backlog until a permit frees up. The permit travels into the
//! session task and is released when the session ends.
//!
//! # Failure containment
//!
//! A failed accept is logged and the loop continues; a failed or
//! panicking session affects only its own task. Only a shutdown
//! signal (or a bind error at startup) stops the listener.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::engine::SessionEngine;
use crate::pipeline::CommandPipeline;
use crate::store::SessionStore;

/// Listener setup errors.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that failed to bind.
        addr: SocketAddr,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Accepts connections and runs one session engine per peer.
#[derive(Debug)]
pub struct ConnectionListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    connection_sem: Arc<Semaphore>,
}

impl ConnectionListener {
    /// Bind the listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, max_connections: usize) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        // With port 0 the kernel picks; report what we actually got.
        let local_addr = listener.local_addr().unwrap_or(addr);

        Ok(Self {
            listener,
            local_addr,
            connection_sem: Arc::new(Semaphore::new(max_connections)),
        })
    }

    /// The bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` fires, then wait for the
    /// remaining sessions to finalize.
    pub async fn serve(
        self,
        pipeline: Arc<CommandPipeline>,
        store: Arc<dyn SessionStore>,
        shutdown: CancellationToken,
    ) {
        let tracker = TaskTracker::new();

        loop {
            // Permit first: beyond the ceiling, peers wait in the
            // backlog instead of getting an engine.
            let permit = tokio::select! {
                () = shutdown.cancelled() => break,
                permit = self.connection_sem.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    // Semaphore closed: nothing left to do.
                    Err(_) => break,
                },
            };

            let (stream, peer) = tokio::select! {
                () = shutdown.cancelled() => break,
                result = self.listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        warn!(%error, "Accept failed");
                        continue;
                    },
                },
            };

            debug!(%peer, "Accepted connection");

            let pipeline = Arc::clone(&pipeline);
            let store = Arc::clone(&store);
            let cancel = shutdown.child_token();
            tracker.spawn(async move {
                let _permit = permit;
                SessionEngine::new(stream, peer.to_string())
                    .run(&pipeline, store.as_ref(), cancel)
                    .await;
            });
        }

        info!("Listener stopped accepting; draining active sessions");
        tracker.close();
        tracker.wait().await;
    }
}
