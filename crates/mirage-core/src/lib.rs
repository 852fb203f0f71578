//! mirage-core - domain logic for the mirage honeypot.
//!
//! Everything in this crate is runtime-free: no sockets, no database,
//! no HTTP. The daemon crate wires these pieces to tokio, rusqlite,
//! and reqwest.
//!
//! # Modules
//!
//! - [`fspath`]: lexical path resolution for the simulated filesystem
//! - [`session`]: per-connection session state and its persisted
//!   snapshot
//! - [`command`]: deterministic local command resolution
//! - [`host`]: the simulated host identity (banner, prompt, canned
//!   outputs, responder persona)
//! - [`retry`]: bounded retry policy with exponential backoff
//! - [`config`]: TOML configuration parsing and validation

pub mod command;
pub mod config;
pub mod fspath;
pub mod host;
pub mod retry;
pub mod session;
