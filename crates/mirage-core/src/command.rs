//! Deterministic local command resolution.
//!
//! First tier of the command pipeline: a dispatch table mapping
//! recognized command shapes to canned or templated output, plus the
//! only session mutation a recognized command may perform (a directory
//! change). Matching is case-insensitive on the command verb only;
//! arguments keep their original case.
//!
//! Anything unrecognized returns [`CommandOutcome::Unhandled`] and
//! leaves the session untouched — the pipeline decides what happens
//! next (generative responder, then the "command not found" fallback).

use crate::fspath;
use crate::host;
use crate::session::Session;

/// Whether a resolved command is recorded in the session history.
///
/// Silent-but-successful commands (`cd`) are still appended; only the
/// final "command not found" tier suppresses recording, so the
/// persisted history holds commands the decoy actually answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// Record the raw command in the session history.
    Append,
    /// Leave the history untouched.
    Suppress,
}

impl HistoryPolicy {
    /// Apply this policy for `raw_command` against the session.
    pub fn apply(self, raw_command: &str, session: &mut Session) {
        match self {
            Self::Append => session.push_history(raw_command),
            Self::Suppress => {},
        }
    }
}

/// Result of one resolution tier for a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The tier produced output (possibly empty — a silent `cd` is
    /// handled with empty output, which is distinct from unhandled).
    Handled {
        /// Text to send to the peer, newline-terminated unless empty.
        output: String,
        /// Whether the raw command joins the session history.
        history: HistoryPolicy,
    },
    /// The tier does not recognize the command.
    Unhandled,
}

impl CommandOutcome {
    /// Convenience constructor for a recorded, handled command.
    #[must_use]
    pub fn handled(output: impl Into<String>) -> Self {
        Self::Handled {
            output: output.into(),
            history: HistoryPolicy::Append,
        }
    }
}

/// Try to resolve `raw_command` against the local dispatch table.
///
/// `raw_command` must already be whitespace-trimmed and non-empty (the
/// engine guarantees both). On [`CommandOutcome::Unhandled`] the
/// session is guaranteed unmodified.
pub fn try_handle(raw_command: &str, session: &mut Session) -> CommandOutcome {
    let (verb, rest) = split_verb(raw_command);
    let verb_lower = verb.to_ascii_lowercase();
    let lower = raw_command.to_ascii_lowercase();

    match verb_lower.as_str() {
        "cd" => {
            let target = rest.map(str::trim).unwrap_or("");
            session.change_directory(target);
            // Silent on success, like a real shell, but still recorded.
            CommandOutcome::handled("")
        },
        "pwd" => CommandOutcome::handled(format!("{}\n", session.working_directory())),
        "whoami" => CommandOutcome::handled(host::WHOAMI_OUTPUT),
        "id" => CommandOutcome::handled(host::ID_OUTPUT),
        _ if verb_lower.starts_with("uname") => CommandOutcome::handled(host::UNAME_OUTPUT),
        "ls" => CommandOutcome::handled(listing_for(session.working_directory(), rest)),
        "cat" => match rest.map(str::trim).filter(|t| !t.is_empty()) {
            Some(target) => CommandOutcome::handled(cat_output(target)),
            // Bare `cat` waits on stdin on a real host; leave it to
            // the later tiers.
            None => CommandOutcome::Unhandled,
        },
        "echo" => match rest {
            Some(text) => CommandOutcome::handled(format!("{text}\n")),
            None => CommandOutcome::Unhandled,
        },
        _ if matches!(lower.as_str(), "help" | "--help" | "-h") => {
            CommandOutcome::handled(host::HELP_TEXT)
        },
        _ => CommandOutcome::Unhandled,
    }
}

/// Split off the command verb; the remainder keeps its spacing.
fn split_verb(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, Some(rest)),
        None => (raw, None),
    }
}

/// Pick one of the three canned listings for an `ls` target.
///
/// Deliberately shallow: the decoy does not model a directory tree,
/// only enough variety that casual probing looks plausible. Targets
/// go through the same resolution as `cd`, so `ls ~` lists the
/// simulated home (`/`) rather than treating `~` as a literal name.
fn listing_for(current_dir: &str, rest: Option<&str>) -> String {
    let target = rest.map(str::trim).filter(|t| !t.is_empty());
    let resolved = match target {
        Some(path) => fspath::resolve(current_dir, path),
        None => current_dir.to_string(),
    };

    if resolved == "/" {
        host::ROOT_LISTING.to_string()
    } else if resolved.ends_with("home/") {
        host::HOME_LISTING.to_string()
    } else {
        host::GENERIC_LISTING.to_string()
    }
}

/// Canned contents for the two known simulated files.
fn cat_output(target: &str) -> String {
    match target {
        "/etc/passwd" | "etc/passwd" => host::PASSWD_CONTENTS.to_string(),
        "/etc/hostname" | "etc/hostname" => host::HOSTNAME_CONTENTS.to_string(),
        other => format!("cat: {other}: No such file or directory\n"),
    }
}
