//! Three-tier command resolution pipeline.
//!
//! Order per command: the deterministic local resolver, then the
//! optional generative responder, then a fixed "command not found"
//! line. The pipeline also applies each tier's history policy:
//!
//! - locally recognized commands are recorded (including silent `cd`);
//! - responder-answered commands are recorded;
//! - unresolved commands are NOT recorded. This asymmetry is a
//!   deliberate policy, not an oversight: the persisted history holds
//!   what the decoy answered, while failed guesses remain visible in
//!   the debug log stream only.
//!
//! The pipeline never fails — every command produces output text
//! (possibly empty, for silent commands) and internal backend trouble
//! is invisible to the peer.

use mirage_core::command::{self, CommandOutcome, HistoryPolicy};
use mirage_core::session::Session;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::responder::RemoteResponder;

/// Resolves commands through local, remote, and fallback tiers.
pub struct CommandPipeline {
    /// `None` is the normal local-only mode.
    responder: Option<RemoteResponder>,
}

impl CommandPipeline {
    /// Build a pipeline with an optional generative responder.
    #[must_use]
    pub fn new(responder: Option<RemoteResponder>) -> Self {
        Self { responder }
    }

    /// Build a pipeline with no remote tier.
    #[must_use]
    pub fn local_only() -> Self {
        Self::new(None)
    }

    /// Whether a generative responder is configured.
    #[must_use]
    pub const fn has_responder(&self) -> bool {
        self.responder.is_some()
    }

    /// Resolve one trimmed, non-empty command against the session.
    ///
    /// Returns the output text to send (possibly empty). The session's
    /// working directory and history are updated according to the
    /// winning tier's rules.
    pub async fn resolve(
        &self,
        raw_command: &str,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> String {
        match command::try_handle(raw_command, session) {
            CommandOutcome::Handled { output, history } => {
                history.apply(raw_command, session);
                output
            },
            CommandOutcome::Unhandled => {
                if let Some(responder) = &self.responder {
                    if let Some(text) = responder.respond(raw_command, session, cancel).await {
                        HistoryPolicy::Append.apply(raw_command, session);
                        return text;
                    }
                }

                debug!(
                    session = %session.id(),
                    command = raw_command,
                    "Command unresolved, serving not-found line"
                );
                HistoryPolicy::Suppress.apply(raw_command, session);
                format!("bash: {raw_command}: command not found\n")
            },
        }
    }
}
