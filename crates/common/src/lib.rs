//! Reelcast Common Utilities
//!
//! Shared infrastructure for all Reelcast crates:
//! - Error types and result aliases
//! - Run clock and frame pacing utilities
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
