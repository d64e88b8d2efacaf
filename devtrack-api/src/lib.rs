//! `DevTrack` API server library.
//!
//! Exposes the in-memory REST API for use in tests and embedding. The server
//! implements the auth, project and task endpoints the `devtrack` client
//! talks to, keeping everything in process memory.

pub mod config;
pub mod server;
pub mod store;
