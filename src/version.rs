//! Version information.
//!
//! The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.

/// The jsontest version string (for example, `0.1.4`).
pub const JSONTEST_VERSION: &str = env!("CARGO_PKG_VERSION");
