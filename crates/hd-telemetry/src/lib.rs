//! Logging setup for hivedeck binaries.
//!
//! - **Logging**: human-readable or JSON output via `tracing-subscriber`,
//!   filtered by `RUST_LOG` or a configured default level
//! - **Spans**: per-operation spans carrying a trace id for correlating the
//!   log lines of one command run

pub mod logging;
pub mod spans;
