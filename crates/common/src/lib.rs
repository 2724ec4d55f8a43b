//! In-situ Common Utilities
//!
//! Shared infrastructure for all in-situ crates:
//! - Error types and result aliases
//! - Playback clock and frame pacing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
