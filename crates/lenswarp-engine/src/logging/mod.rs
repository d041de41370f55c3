//! Logging utilities.
//!
//! The engine only emits through the `log` facade. Binaries call
//! [`init_logging`] early in `main` to install `env_logger`; library users are
//! free to install their own backend instead.

mod init;

pub use init::{init_logging, LoggingConfig};
