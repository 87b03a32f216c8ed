//! Cache Module
//!
//! Filesystem-backed cache driver: key hashing and sharding, a bounded path
//! cache, the snippet codec, the storage engine and the expiration collector.

pub mod codec;
mod entry;
pub mod key;
mod path;
mod path_cache;
pub mod purge;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, Value};
pub use key::KeyHasher;
pub use path::PathBuilder;
pub use path_cache::PathCache;
pub use purge::PurgeReport;
pub use stats::PathCacheStats;
pub use store::{CacheDriver, FileSystemDriver, InvalidationHook, NoopInvalidation};

// == Public Constants ==
/// Extension of every entry file
pub const FILE_EXTENSION: &str = "fsc";

/// Prefix marking a key segment to be used verbatim instead of hashed
pub const LITERAL_MARKER: char = '@';

/// Separator used when joining key segments into a fingerprint
pub const FINGERPRINT_SEPARATOR: char = '/';
