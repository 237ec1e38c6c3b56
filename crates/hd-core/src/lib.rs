//! Shared data model and configuration for hivedeck.
//!
//! Holds the value types every other crate speaks in (terminal instances,
//! agents, persisted records) together with the TOML configuration and the
//! settings manager used for typed layout preferences.

pub mod config;
pub mod settings;
pub mod types;
