//! # shelf-observability
//!
//! Logging setup for Shelfmark.
//!
//! This crate wires up structured logging through the tracing ecosystem.
//! Library crates emit events with `tracing` macros; hosts call
//! [`init_logging`] (or [`init_logging_with_config`]) once at startup.

pub mod logging;

pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
