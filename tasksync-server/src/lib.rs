//! `TaskSync` reference server.
//!
//! An axum HTTP server holding tasks in memory. It is the remote side the
//! client's sync engine replays its queue against, and doubles as an
//! in-process server for end-to-end tests.

pub mod config;
pub mod server;
pub mod store;
