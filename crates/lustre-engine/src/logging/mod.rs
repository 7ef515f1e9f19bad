//! Logging utilities.
//!
//! The crate logs through the `log` facade; this module only installs an
//! `env_logger` backend for binaries and tests that want one.

mod init;

pub use init::{LoggingConfig, init_logging};
