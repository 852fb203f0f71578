//! Per-connection session state.
//!
//! A [`Session`] is the owned value type that replaces the loosely
//! shaped state bag a quick prototype would pass around: one session
//! per accepted connection, mutated single-threaded by the engine that
//! owns it, finalized exactly once into an immutable [`SessionRecord`]
//! snapshot for persistence.
//!
//! # Invariants
//!
//! - `working_directory` is always a normalized absolute path (bare
//!   `/`, or no `.`/`..`/empty segments and a trailing `/`). The field
//!   is private and only mutated through [`Session::change_directory`],
//!   which routes through the path normalizer.
//! - `command_history` is append-only and never reordered.
//! - Finalization consumes the session, so exactly one snapshot can
//!   ever exist for a given session value.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::fspath;

/// Live state for one accepted connection.
#[derive(Debug)]
pub struct Session {
    /// Random id used to correlate log lines for this session.
    id: Uuid,
    /// Remote peer address, immutable for the session's life.
    peer_address: String,
    /// When the connection was accepted.
    started_at: DateTime<Utc>,
    /// Simulated current directory. Always normalized.
    working_directory: String,
    /// Raw commands accepted so far, in acceptance order.
    command_history: Vec<String>,
    /// Set once, at finalization.
    terminated: bool,
}

impl Session {
    /// Create the session for a freshly accepted connection.
    ///
    /// The working directory starts at `/` and the history is empty.
    #[must_use]
    pub fn new(peer_address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_address: peer_address.into(),
            started_at: Utc::now(),
            working_directory: "/".to_string(),
            command_history: Vec::new(),
            terminated: false,
        }
    }

    /// Session correlation id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Remote peer address.
    #[must_use]
    pub fn peer_address(&self) -> &str {
        &self.peer_address
    }

    /// Current simulated working directory.
    #[must_use]
    pub fn working_directory(&self) -> &str {
        &self.working_directory
    }

    /// Commands accepted so far, oldest first.
    #[must_use]
    pub fn command_history(&self) -> &[String] {
        &self.command_history
    }

    /// Whether the session has been finalized.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Change the working directory by resolving `target` against the
    /// current directory.
    ///
    /// This is the only mutation path for the directory, so the
    /// normalization invariant holds by construction.
    pub fn change_directory(&mut self, target: &str) {
        self.working_directory = fspath::resolve(&self.working_directory, target);
    }

    /// Append a raw command to the history.
    pub fn push_history(&mut self, raw_command: impl Into<String>) {
        self.command_history.push(raw_command.into());
    }

    /// Finalize the session into its persisted projection.
    ///
    /// Consuming `self` guarantees at most one snapshot per session;
    /// the engine calls this on every exit path, so exactly one store
    /// write happens per connection regardless of how many commands
    /// (zero included) were processed.
    #[must_use]
    pub fn finalize(mut self) -> SessionRecord {
        self.terminated = true;
        SessionRecord {
            peer_address: self.peer_address,
            session_start: self.started_at,
            final_directory: self.working_directory,
            command_count: self.command_history.len(),
            commands: self.command_history,
            logged_at: Utc::now(),
        }
    }
}

/// Immutable, persisted projection of a terminated [`Session`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    /// Remote peer address.
    pub peer_address: String,
    /// When the connection was accepted.
    pub session_start: DateTime<Utc>,
    /// Working directory at disconnect.
    pub final_directory: String,
    /// Number of accepted commands; always equals `commands.len()`.
    pub command_count: usize,
    /// The full ordered command list.
    pub commands: Vec<String>,
    /// When the record was produced.
    pub logged_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_at_root() {
        let session = Session::new("203.0.113.9:41234");
        assert_eq!(session.working_directory(), "/");
        assert!(session.command_history().is_empty());
        assert!(!session.is_terminated());
    }

    #[test]
    fn test_change_directory_stays_normalized() {
        let mut session = Session::new("peer");
        session.change_directory("home/user");
        assert_eq!(session.working_directory(), "/home/user/");
        session.change_directory("../..");
        assert_eq!(session.working_directory(), "/");
        session.change_directory("../../etc");
        assert_eq!(session.working_directory(), "/etc/");
    }

    #[test]
    fn test_history_is_append_only_ordered() {
        let mut session = Session::new("peer");
        session.push_history("pwd");
        session.push_history("ls");
        session.push_history("cd /tmp");
        assert_eq!(session.command_history(), ["pwd", "ls", "cd /tmp"]);
    }

    #[test]
    fn test_finalize_snapshot_matches_live_state() {
        let mut session = Session::new("198.51.100.4:2020");
        session.change_directory("/home");
        session.push_history("cd /home");
        session.push_history("pwd");

        let record = session.finalize();
        assert_eq!(record.peer_address, "198.51.100.4:2020");
        assert_eq!(record.final_directory, "/home/");
        assert_eq!(record.command_count, 2);
        assert_eq!(record.commands, ["cd /home", "pwd"]);
        assert_eq!(record.command_count, record.commands.len());
        assert!(record.logged_at >= record.session_start);
    }

    #[test]
    fn test_finalize_with_no_commands() {
        let record = Session::new("peer").finalize();
        assert_eq!(record.command_count, 0);
        assert!(record.commands.is_empty());
        assert_eq!(record.final_directory, "/");
    }
}
