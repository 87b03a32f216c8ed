//! Configuration Module
//!
//! Handles loading and managing driver configuration from code or environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::KeyHasher;

/// Default directory fan-out per hashed key segment.
pub const DEFAULT_DIR_SPLIT: usize = 2;

/// Default bound on the in-memory key-to-path cache.
pub const DEFAULT_MEM_KEY_LIMIT: usize = 20;

/// Driver configuration parameters.
///
/// All values except the key hasher can be configured via environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the cache tree
    pub base_path: PathBuf,
    /// Mode applied to newly created entry files (Unix only)
    pub file_permissions: u32,
    /// Mode applied to newly created directories (Unix only)
    pub dir_permissions: u32,
    /// Directory levels each hashed key segment is split into
    pub dir_split: usize,
    /// Maximum number of key-to-path mappings kept in memory
    pub mem_key_limit: usize,
    /// Path length ceiling enforced before writing, if any
    pub max_path_length: Option<usize>,
    /// Hash applied to non-literal key segments
    pub key_hasher: KeyHasher,
    /// Janitor purge interval in seconds, 0 = purge once
    pub purge_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FSCACHE_PATH` - Cache root (default: `<tmp>/fscache`)
    /// - `FSCACHE_FILE_PERMISSIONS` - Octal file mode (default: 660)
    /// - `FSCACHE_DIR_PERMISSIONS` - Octal directory mode (default: 770)
    /// - `FSCACHE_DIR_SPLIT` - Directory fan-out (default: 2)
    /// - `FSCACHE_MEM_KEY_LIMIT` - Path cache bound (default: 20)
    /// - `FSCACHE_MAX_PATH_LENGTH` - Path length ceiling (default: 260 on Windows, none elsewhere)
    /// - `FSCACHE_PURGE_INTERVAL` - Janitor interval in seconds (default: 300)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            base_path: env::var("FSCACHE_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.base_path),
            file_permissions: env::var("FSCACHE_FILE_PERMISSIONS")
                .ok()
                .and_then(|v| parse_octal(&v))
                .unwrap_or(defaults.file_permissions),
            dir_permissions: env::var("FSCACHE_DIR_PERMISSIONS")
                .ok()
                .and_then(|v| parse_octal(&v))
                .unwrap_or(defaults.dir_permissions),
            dir_split: env::var("FSCACHE_DIR_SPLIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.dir_split),
            mem_key_limit: env::var("FSCACHE_MEM_KEY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.mem_key_limit),
            max_path_length: env::var("FSCACHE_MAX_PATH_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.max_path_length),
            key_hasher: defaults.key_hasher,
            purge_interval: env::var("FSCACHE_PURGE_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.purge_interval),
        }
    }

    /// Creates a default Config rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    pub fn with_dir_split(mut self, dir_split: usize) -> Self {
        self.dir_split = dir_split;
        self
    }

    pub fn with_mem_key_limit(mut self, limit: usize) -> Self {
        self.mem_key_limit = limit;
        self
    }

    pub fn with_permissions(mut self, file: u32, dir: u32) -> Self {
        self.file_permissions = file;
        self.dir_permissions = dir;
        self
    }

    pub fn with_max_path_length(mut self, max: Option<usize>) -> Self {
        self.max_path_length = max;
        self
    }

    pub fn with_key_hasher(mut self, hasher: KeyHasher) -> Self {
        self.key_hasher = hasher;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: env::temp_dir().join("fscache"),
            file_permissions: 0o660,
            dir_permissions: 0o770,
            dir_split: DEFAULT_DIR_SPLIT,
            mem_key_limit: DEFAULT_MEM_KEY_LIMIT,
            max_path_length: platform_max_path_length(),
            key_hasher: KeyHasher::default(),
            purge_interval: 300,
        }
    }
}

/// Path length ceiling of platforms known to enforce a short one.
fn platform_max_path_length() -> Option<usize> {
    if cfg!(windows) {
        Some(260)
    } else {
        None
    }
}

fn parse_octal(value: &str) -> Option<u32> {
    let digits = value.trim().trim_start_matches("0o");
    u32::from_str_radix(digits, 8).ok()
}
