//! Lexical path resolution for the simulated filesystem.
//!
//! The honeypot never touches a real filesystem; the working directory
//! is a string the session carries around. This module resolves `cd`
//! targets against that string using POSIX-style lexical normalization
//! only (no disk access, no symlinks, no existence checks).
//!
//! # Invariants
//!
//! Every value returned by [`resolve`] is a normalized absolute path:
//! either exactly `/`, or a `/`-anchored path with no `.` or `..`
//! segments, no empty segments, and a trailing `/`. Resolution is pure
//! and total — there is no failure condition for any input bytes.

/// Resolve a directory-change target against the current working
/// directory.
///
/// Rules:
/// - An empty target or `~` resolves to `/` (the simulated home).
/// - A target starting with `/` is absolute and normalized on its own.
/// - Anything else is joined to `current` and then normalized.
///
/// `..` above the root is clamped at the root, so no target can escape
/// `/`:
///
/// ```
/// use mirage_core::fspath::resolve;
///
/// assert_eq!(resolve("/home/", "../../../etc"), "/etc/");
/// assert_eq!(resolve("/", ".."), "/");
/// ```
#[must_use]
pub fn resolve(current: &str, target: &str) -> String {
    if target.is_empty() || target == "~" {
        return "/".to_string();
    }

    if target.starts_with('/') {
        normalize(target)
    } else {
        normalize(&format!("{current}/{target}"))
    }
}

/// Collapse `.`, resolve `..` (clamped at root), drop empty segments,
/// and append a trailing `/` unless the result is the bare root.
fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                // Clamped: `..` at the root stays at the root.
                segments.pop();
            },
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        let mut out = String::with_capacity(path.len() + 2);
        for segment in &segments {
            out.push('/');
            out.push_str(segment);
        }
        out.push('/');
        out
    }
}
