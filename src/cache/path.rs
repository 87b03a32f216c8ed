//! Path Builder Module
//!
//! Expands normalized key tokens into a sharded path below the cache root.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::cache::key::{self, KeyHasher, Token};
use crate::cache::{PathCache, PathCacheStats, FILE_EXTENSION};
use crate::error::Result;

// == Path Builder ==
/// Maps keys to on-disk locations, memoizing results in a [`PathCache`].
#[derive(Debug)]
pub struct PathBuilder {
    root: PathBuf,
    dir_split: usize,
    hasher: KeyHasher,
    cache: Mutex<PathCache>,
}

impl PathBuilder {
    // == Constructor ==
    /// Creates a builder rooted at `root`. A `dir_split` below 1 is coerced to 1.
    pub fn new(root: PathBuf, dir_split: usize, mem_key_limit: usize, hasher: KeyHasher) -> Self {
        Self {
            root,
            dir_split: dir_split.max(1),
            hasher,
            cache: Mutex::new(PathCache::new(mem_key_limit)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_split(&self) -> usize {
        self.dir_split
    }

    // == Build Path ==
    /// Returns the file path for `key`, or the cache root for an empty key.
    pub fn build_path<S: AsRef<str>>(&self, key: &[S]) -> Result<PathBuf> {
        if key.is_empty() {
            return Ok(self.root.clone());
        }

        let fingerprint = key::fingerprint(key);
        if let Some(path) = self.lock_cache().get(&fingerprint) {
            return Ok(path);
        }

        let tokens = key::normalize(key, &self.hasher)?;
        let path = self.expand(&tokens);
        debug!(fingerprint = %fingerprint, path = %path.display(), "computed cache path");

        self.lock_cache().insert(fingerprint, path.clone());
        Ok(path)
    }

    /// Snapshot of the path cache counters.
    pub fn cache_stats(&self) -> PathCacheStats {
        self.lock_cache().stats()
    }

    fn expand(&self, tokens: &[Token]) -> PathBuf {
        let mut components: Vec<&str> = Vec::new();
        for token in tokens {
            match token {
                Token::Literal(literal) => components.push(literal),
                Token::Hashed(hashed) => components.extend(split_even(hashed, self.dir_split)),
            }
        }

        let mut path = self.root.clone();
        if let Some((last, parents)) = components.split_last() {
            for dir in parents {
                path.push(dir);
            }
            path.push(format!("{}.{}", last, FILE_EXTENSION));
        }
        path
    }

    // A poisoned map still only holds pure computations.
    fn lock_cache(&self) -> std::sync::MutexGuard<'_, PathCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// == Split Even ==
/// Splits `s` into `parts` near-equal substrings, the last taking any remainder.
///
/// Never yields an empty piece: `parts` is capped at the character count.
fn split_even(s: &str, parts: usize) -> Vec<&str> {
    let boundaries: Vec<usize> = s
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .collect();
    let chars = boundaries.len() - 1;
    let parts = parts.clamp(1, chars.max(1));
    let chunk = chars / parts;

    (0..parts)
        .map(|i| {
            let start = boundaries[i * chunk];
            let end = if i + 1 == parts {
                s.len()
            } else {
                boundaries[(i + 1) * chunk]
            };
            &s[start..end]
        })
        .collect()
}
