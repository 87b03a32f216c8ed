//! fscache - A filesystem-backed key-value cache driver
//!
//! Maps hierarchical keys to sharded on-disk snippets with optional
//! expiration, and reclaims expired entries with a purge pass.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheDriver, CacheEntry, FileSystemDriver, Value};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_purge_task;
