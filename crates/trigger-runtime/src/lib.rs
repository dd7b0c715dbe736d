//! # Trigger Runtime Library
//!
//! Configuration loading and logging setup for the `trigger-runtime` binary,
//! exposed for testing.

pub mod config;
pub mod logging;

pub use config::{load_config, ConfigLoadError};
pub use logging::{init_tracing, LogFormat};
