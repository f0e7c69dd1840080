//! `TaskSync`: local-first task manager with an offline sync engine.
//!
//! The [`store::TaskStore`] applies mutations optimistically, records each
//! as a pending action, persists through a [`storage::KeyValueStore`], and
//! drains the queue against a [`remote::RemoteTaskService`] whenever the
//! [`connectivity`] layer reports the service reachable.

pub mod cli;
pub mod config;
pub mod connectivity;
pub mod remote;
pub mod storage;
pub mod store;
