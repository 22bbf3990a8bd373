//! Shared utilities for the object discovery service CLI binaries.

pub mod args;
pub mod logging;

pub use args::LogLevel;
pub use logging::init_logging;
