//! CycleWatch Common Utilities
//!
//! Shared infrastructure for all CycleWatch crates:
//! - Error types and result aliases
//! - Frame and wall-clock timing utilities
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
