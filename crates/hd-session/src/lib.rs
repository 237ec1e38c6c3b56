//! Terminal session lifecycle for hivedeck.
//!
//! Owns the ordered set of terminal instances, links each to an agent,
//! reconciles them against the PTY daemon's live process table, and persists
//! them across restarts through a single debounced writer.
//!
//! Key components:
//! - [`controller::SessionController`], the single owner of session state
//! - [`store`], pure operations over the instance collection
//! - [`daemon::PtyDaemonClient`] and the local [`pty_daemon::LocalPtyDaemon`]
//! - [`persistence::PersistenceGateway`] and [`writer::PersistenceWriter`]
//! - [`guard::LeaderInvariantGuard`], which keeps the leader terminal alive

pub mod agents;
pub mod buffer;
pub mod cli_config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod guard;
pub mod link;
pub mod persistence;
pub mod pty_daemon;
pub mod store;
pub mod writer;

pub use controller::{AttachedTerminal, SessionController};
pub use error::{Result, SessionError};
