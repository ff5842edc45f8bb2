//! Device-Oxide: device resolution and session lifecycle for mobile UI automation
//!
//! Resolves a capability profile (or `auto_detect`) to an attached Android or
//! iOS device, opens an Appium session on it with bounded retries, and tears
//! the session down on every exit path.

pub mod error;
pub mod config;

pub mod profile;
pub mod device;
pub mod driver;
pub mod retry;
pub mod session;

// Re-exports
pub use error::{Error, Result};

/// Device-Oxide library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
