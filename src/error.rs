//! Error types for the cache driver
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the filesystem cache driver.
///
/// Only configuration problems and caller mistakes surface here. I/O failures
/// while writing are reported as `Ok(false)` and decode anomalies as `Ok(None)`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Driver was configured with unusable options
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Base path cannot be created, listed or written
    #[error("Permission error on {path}: {reason}")]
    Permission { path: PathBuf, reason: String },

    /// Resulting path exceeds the platform path-length ceiling
    #[error("Path too long: {len} bytes exceeds limit of {max}")]
    PathTooLong { len: usize, max: usize },

    /// Key segment would produce an unsafe path component
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Value cannot be represented in a snippet
    #[error("Encoding error: {0}")]
    Codec(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache driver.
pub type Result<T> = std::result::Result<T, CacheError>;
