//! Core types and foundational components
//!
//! This module contains the fundamental data types, error handling,
//! and constants used throughout the crate.

pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items for convenience
pub use error::{LinkSureError, Result};
pub use types::{Link, LinkBuilder, LinkError};

/// Current wall-clock time as milliseconds since the Unix epoch.
///
/// Retry scheduling works on absolute wall-clock milliseconds so that
/// `Retry-After` values and the overall deadline compare directly.
pub(crate) fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
