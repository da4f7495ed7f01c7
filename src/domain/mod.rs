//! Domain model for timertop
//!
//! Core domain types and errors:
//! - Compile-time safety via newtype pattern
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{Context, CpuId};

pub use errors::{ConfigError, SetupError, TracerError};
