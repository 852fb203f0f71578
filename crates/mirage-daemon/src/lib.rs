//! mirage-daemon - deceptive SSH-style shell honeypot.
//!
//! The daemon accepts TCP connections from hostile peers, presents a
//! plausible login banner and shell prompt, simulates a small Unix
//! host well enough to capture attacker behavior, and durably records
//! every session. Nothing is ever executed for real and no real
//! filesystem is touched.
//!
//! # Modules
//!
//! - [`listener`]: TCP accept loop with a bounded concurrency ceiling
//! - [`engine`]: per-connection session state machine
//! - [`pipeline`]: local-first, remote-fallback command resolution
//! - [`responder`]: optional generative-text backend with bounded
//!   retries
//! - [`store`]: append-only SQLite session log
//!
//! The pure domain logic (path normalization, the command table, the
//! session value type, retry policy, configuration) lives in
//! `mirage-core`.

pub mod engine;
pub mod listener;
pub mod pipeline;
pub mod responder;
pub mod store;
