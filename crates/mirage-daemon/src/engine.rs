//! Per-connection session engine.
//!
//! Drives one session through `Connected -> Active -> Terminated`
//! against any byte stream: banner and prompt on connect, then a
//! strict half-duplex read/resolve/respond cycle until the peer
//! disconnects, a transport operation fails, or the daemon shuts
//! down. The engine is generic over the stream so tests run it over
//! `tokio::io::duplex` with no sockets involved.
//!
//! # Termination contract
//!
//! Every exit path funnels through one finalization point, a drop
//! guard in [`SessionEngine::run`]: the session snapshot is computed
//! and handed to the store exactly once per connection, whether zero
//! or many commands were processed, regardless of how the transport
//! died, and even if command handling panics mid-session. A store
//! failure is logged and swallowed — cleanup always completes.
//!
//! # Input handling
//!
//! The peer is hostile by assumption. Reads are chunked (one command
//! per inbound chunk, like the interactive clients this decoy
//! attracts), invalid UTF-8 is dropped rather than fatal, and a chunk
//! that trims to nothing just re-sends the prompt without touching
//! the pipeline or the history.

use mirage_core::host;
use mirage_core::session::Session;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pipeline::CommandPipeline;
use crate::store::SessionStore;

/// Read buffer size per inbound chunk.
const READ_BUFFER_SIZE: usize = 4096;

/// State machine for one accepted connection.
pub struct SessionEngine<S> {
    stream: S,
    session: Session,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SessionEngine<S> {
    /// Create an engine for a freshly accepted connection.
    pub fn new(stream: S, peer_address: impl Into<String>) -> Self {
        Self {
            stream,
            session: Session::new(peer_address),
        }
    }

    /// Run the session to termination and persist its record.
    ///
    /// Consumes the engine; when this returns, the connection is done
    /// and exactly one store write has been attempted. The engine
    /// lives inside a drop guard, so the write also happens if a
    /// panic unwinds out of the session loop.
    pub async fn run(
        self,
        pipeline: &CommandPipeline,
        store: &dyn SessionStore,
        cancel: CancellationToken,
    ) {
        info!(
            session = %self.session.id(),
            peer = %self.session.peer_address(),
            "Session started"
        );

        let mut guard = FinalizeGuard {
            engine: Some(self),
            store,
        };
        if let Some(engine) = guard.engine.as_mut() {
            engine.drive(pipeline, &cancel).await;
        }
        // Guard drops here: sole finalization point.
    }

    /// The `Connected -> Active` transition and the active loop.
    ///
    /// Returns when the session reaches `Terminated` for any reason:
    /// clean peer close, transport error, or daemon shutdown.
    async fn drive(&mut self, pipeline: &CommandPipeline, cancel: &CancellationToken) {
        if self.send(host::BANNER).await.is_err() {
            return;
        }
        if self.send_prompt().await.is_err() {
            return;
        }

        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            let n = tokio::select! {
                () = cancel.cancelled() => {
                    debug!(session = %self.session.id(), "Session cancelled by shutdown");
                    return;
                }
                result = self.stream.read(&mut buf) => match result {
                    // Zero-length read: peer closed its write side.
                    Ok(0) => return,
                    Ok(n) => n,
                    Err(error) => {
                        debug!(session = %self.session.id(), %error, "Read failed");
                        return;
                    },
                },
            };

            let command = decode_chunk(&buf[..n]);
            let command = command.trim();

            if command.is_empty() {
                // No content in the chunk: prompt again, no history
                // entry, no pipeline call.
                if self.send_prompt().await.is_err() {
                    return;
                }
                continue;
            }

            debug!(
                session = %self.session.id(),
                peer = %self.session.peer_address(),
                command,
                cwd = %self.session.working_directory(),
                "Received command"
            );

            let output = pipeline.resolve(command, &mut self.session, cancel).await;

            if !output.is_empty() && self.send(&output).await.is_err() {
                return;
            }
            // Prompt reflects any directory change the command made.
            if self.send_prompt().await.is_err() {
                return;
            }
        }
    }

    async fn send_prompt(&mut self) -> std::io::Result<()> {
        let prompt = host::prompt(self.session.working_directory());
        self.send(&prompt).await
    }

    async fn send(&mut self, text: &str) -> std::io::Result<()> {
        let result = async {
            self.stream.write_all(text.as_bytes()).await?;
            self.stream.flush().await
        }
        .await;

        if let Err(error) = &result {
            debug!(session = %self.session.id(), %error, "Send failed");
        }
        result
    }
}

/// Finalizes and persists the session when dropped, whether the
/// session loop returned or unwound.
struct FinalizeGuard<'a, S> {
    engine: Option<SessionEngine<S>>,
    store: &'a dyn SessionStore,
}

impl<S> Drop for FinalizeGuard<'_, S> {
    fn drop(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };
        let session_id = engine.session.id();
        let record = engine.session.finalize();
        info!(
            session = %session_id,
            peer = %record.peer_address,
            commands = record.command_count,
            final_directory = %record.final_directory,
            "Session terminated"
        );
        if let Err(error) = self.store.record(&record) {
            warn!(session = %session_id, %error, "Failed to persist session record");
        }
    }
}

/// Decode an inbound chunk, dropping invalid byte sequences.
fn decode_chunk(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}
