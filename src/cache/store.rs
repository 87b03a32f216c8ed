//! Cache Store Module
//!
//! Storage engine combining the path builder, the snippet codec and locked
//! file writes into the driver interface consumed by a cache pool.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::purge::{self, PurgeReport};
use crate::cache::{codec, CacheEntry, PathBuilder, PathCacheStats, Value};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Cache Driver ==
/// The narrow interface an owning cache pool uses to talk to a driver.
///
/// An empty key addresses the whole cache.
pub trait CacheDriver: Send + Sync {
    /// Loads an entry. Missing, foreign and partially written entries are `None`.
    fn get(&self, key: &[&str]) -> Result<Option<CacheEntry>>;

    /// Persists a value. I/O failures are reported as `Ok(false)`.
    fn store(
        &self,
        key: &[&str],
        value: &Value,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    /// Removes an entry and everything stored below it.
    fn clear(&self, key: &[&str]) -> Result<bool>;

    /// Deletes expired entries and empty directories. Always succeeds.
    fn purge(&self) -> bool;

    fn is_available(&self) -> bool {
        true
    }
}

// == Invalidation Hook ==
/// Notified after an entry file is overwritten or removed, so any copy of it
/// cached elsewhere in the process can be dropped.
pub trait InvalidationHook: fmt::Debug + Send + Sync {
    fn invalidate(&self, path: &Path);
}

/// Default hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidation;

impl InvalidationHook for NoopInvalidation {
    fn invalidate(&self, _path: &Path) {}
}

// == File System Driver ==
/// Cache driver persisting one snippet file per key below a root directory.
#[derive(Debug)]
pub struct FileSystemDriver {
    paths: PathBuilder,
    file_permissions: u32,
    dir_permissions: u32,
    max_path_length: Option<usize>,
    invalidation: Arc<dyn InvalidationHook>,
}

impl FileSystemDriver {
    // == Constructor ==
    /// Validates `config`, creates the root if needed and checks it can be
    /// listed and written.
    pub fn new(config: Config) -> Result<Self> {
        if config.base_path.as_os_str().is_empty() {
            return Err(CacheError::Configuration(
                "base path is not set".to_string(),
            ));
        }
        config.key_hasher.validate()?;
        ensure_root(&config.base_path, config.dir_permissions)?;

        info!(
            root = %config.base_path.display(),
            dir_split = config.dir_split.max(1),
            mem_key_limit = config.mem_key_limit,
            "filesystem cache driver configured"
        );

        Ok(Self {
            paths: PathBuilder::new(
                config.base_path,
                config.dir_split,
                config.mem_key_limit,
                config.key_hasher,
            ),
            file_permissions: config.file_permissions,
            dir_permissions: config.dir_permissions,
            max_path_length: config.max_path_length,
            invalidation: Arc::new(NoopInvalidation),
        })
    }

    /// Replaces the hook notified after writes and removals.
    pub fn with_invalidation_hook(mut self, hook: Arc<dyn InvalidationHook>) -> Self {
        self.invalidation = hook;
        self
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// Resolves the on-disk path of `key`, or the root for an empty key.
    pub fn build_path(&self, key: &[&str]) -> Result<PathBuf> {
        self.paths.build_path(key)
    }

    pub fn path_cache_stats(&self) -> PathCacheStats {
        self.paths.cache_stats()
    }

    // == Purge With Report ==
    /// Runs one collector pass against a timestamp captured up front.
    pub fn purge_with_report(&self) -> PurgeReport {
        let started = Utc::now();
        let report = purge::purge_expired(self.root(), started);
        info!(
            files_removed = report.files_removed,
            dirs_removed = report.dirs_removed,
            files_kept = report.files_kept,
            failures = report.failures,
            "purge pass complete"
        );
        report
    }

    fn check_path_length(&self, path: &Path) -> Result<()> {
        if let Some(max) = self.max_path_length {
            let len = path.as_os_str().len();
            if len > max {
                return Err(CacheError::PathTooLong { len, max });
            }
        }
        Ok(())
    }

    /// Creates the entry file with the configured mode if it does not exist yet.
    fn ensure_file(&self, path: &Path) -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.file_permissions);
        }

        match options.open(path) {
            Ok(_) => set_mode(path, self.file_permissions),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Overwrites the entry under an exclusive lock.
    fn write_locked(&self, path: &Path, snippet: &[u8]) -> io::Result<()> {
        self.ensure_file(path)?;

        let mut file = OpenOptions::new().write(true).open(path)?;
        file.lock()?;
        let written = file
            .set_len(0)
            .and_then(|()| file.write_all(snippet))
            .and_then(|()| file.flush());
        let unlocked = file.unlock();

        written.and(unlocked)
    }

    fn clear_root(&self, root: &Path) -> bool {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return true,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "cannot list cache root");
                return false;
            }
        };

        let mut ok = true;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let removed = if is_dir {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = removed {
                warn!(path = %path.display(), error = %e, "failed to clear");
                ok = false;
            }
        }

        self.invalidation.invalidate(root);
        ok
    }
}

impl CacheDriver for FileSystemDriver {
    fn get(&self, key: &[&str]) -> Result<Option<CacheEntry>> {
        if key.is_empty() {
            return Ok(None);
        }
        let path = self.paths.build_path(key)?;
        Ok(codec::decode(&path))
    }

    fn store(
        &self,
        key: &[&str],
        value: &Value,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey(
                "cannot store a value at the cache root".to_string(),
            ));
        }

        let path = self.paths.build_path(key)?;
        self.check_path_length(&path)?;
        let snippet = codec::encode(key, value, expiration)?;

        if let Some(parent) = path.parent() {
            if let Err(e) = create_dirs(parent, self.dir_permissions) {
                warn!(dir = %parent.display(), error = %e, "failed to create cache directory");
                return Ok(false);
            }
        }

        if let Err(e) = self.write_locked(&path, snippet.as_bytes()) {
            warn!(path = %path.display(), error = %e, "failed to write cache entry");
            return Ok(false);
        }

        self.invalidation.invalidate(&path);
        debug!(path = %path.display(), "stored cache entry");
        Ok(true)
    }

    fn clear(&self, key: &[&str]) -> Result<bool> {
        let path = self.paths.build_path(key)?;
        if key.is_empty() {
            return Ok(self.clear_root(&path));
        }

        let mut ok = true;
        match fs::remove_file(&path) {
            Ok(()) => self.invalidation.invalidate(&path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove cache entry");
                ok = false;
            }
        }

        // Children of this key live in a directory named after the file stem
        let children = path.with_extension("");
        if children.is_dir() {
            if let Err(e) = fs::remove_dir_all(&children) {
                warn!(dir = %children.display(), error = %e, "failed to remove cache subtree");
                ok = false;
            }
        }

        Ok(ok)
    }

    fn purge(&self) -> bool {
        self.purge_with_report();
        true
    }
}

// == Filesystem Helpers ==
/// `mkdir -p` with the configured mode. Concurrent creation is not an error.
fn create_dirs(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    match builder.create(path) {
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        other => other,
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Creates the cache root and verifies it can be listed and written.
fn ensure_root(root: &Path, dir_mode: u32) -> Result<()> {
    let permission = |reason: String| CacheError::Permission {
        path: root.to_path_buf(),
        reason,
    };

    create_dirs(root, dir_mode).map_err(|e| permission(format!("cannot create: {}", e)))?;
    fs::read_dir(root).map_err(|e| permission(format!("not listable: {}", e)))?;

    let probe = root.join(format!(".fscache-probe-{}", std::process::id()));
    fs::write(&probe, b"").map_err(|e| permission(format!("not writable: {}", e)))?;
    let _ = fs::remove_file(&probe);
    Ok(())
}
