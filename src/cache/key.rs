//! Key Normalizer Module
//!
//! Turns raw key segments into filesystem-safe tokens and computes the
//! fingerprint used as the path cache lookup key.

use std::fmt;
use std::sync::Arc;

use xxhash_rust::xxh64::xxh64;

use crate::cache::{FINGERPRINT_SEPARATOR, LITERAL_MARKER};
use crate::error::{CacheError, Result};

// == Key Hasher ==
/// One-way hash applied to every non-literal key segment.
///
/// Cloning is cheap; the function itself is shared.
#[derive(Clone)]
pub struct KeyHasher {
    func: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

impl KeyHasher {
    /// Wraps a custom hash function.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }

    /// Default hasher: xxh64 rendered as 16 lowercase hex characters.
    pub fn xxh64() -> Self {
        Self::new(|segment| format!("{:016x}", xxh64(segment.as_bytes(), 0)))
    }

    /// Hashes a single segment.
    pub fn hash(&self, segment: &str) -> String {
        (self.func)(segment)
    }

    // == Validate ==
    /// Invokes the hasher on a probe input and checks that it yields a
    /// usable path component.
    pub fn validate(&self) -> Result<()> {
        let probe = self.hash("fscache-probe");
        if !is_safe_component(&probe) {
            return Err(CacheError::Configuration(format!(
                "key hash function returned unusable token {:?}",
                probe
            )));
        }
        Ok(())
    }
}

impl Default for KeyHasher {
    fn default() -> Self {
        Self::xxh64()
    }
}

impl fmt::Debug for KeyHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHasher").finish_non_exhaustive()
    }
}

// == Token ==
/// A normalized key segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal-tagged segment with the marker stripped, used verbatim
    Literal(String),
    /// Output of the key hasher
    Hashed(String),
}

// == Normalize ==
/// Normalizes every segment of a key in order.
///
/// Segments starting with [`LITERAL_MARKER`] pass through without the marker,
/// everything else goes through the hasher.
pub fn normalize<S: AsRef<str>>(key: &[S], hasher: &KeyHasher) -> Result<Vec<Token>> {
    key.iter()
        .map(|segment| {
            let segment = segment.as_ref();
            match segment.strip_prefix(LITERAL_MARKER) {
                Some(literal) => {
                    if !is_safe_component(literal) {
                        return Err(CacheError::InvalidKey(format!(
                            "literal segment {:?} is not a valid path component",
                            segment
                        )));
                    }
                    Ok(Token::Literal(literal.to_string()))
                }
                None => {
                    let hashed = hasher.hash(segment);
                    if !is_safe_component(&hashed) {
                        return Err(CacheError::InvalidKey(format!(
                            "hash of segment {:?} is not a valid path component",
                            segment
                        )));
                    }
                    Ok(Token::Hashed(hashed))
                }
            }
        })
        .collect()
}

// == Fingerprint ==
/// Joins key segments into a single unambiguous string.
///
/// The separator and the escape character are both escaped inside segments,
/// so `["a", "b"]` and `["a/b"]` never produce the same fingerprint.
pub fn fingerprint<S: AsRef<str>>(key: &[S]) -> String {
    let mut out = String::new();
    for (i, segment) in key.iter().enumerate() {
        if i > 0 {
            out.push(FINGERPRINT_SEPARATOR);
        }
        for c in segment.as_ref().chars() {
            if c == '\\' || c == FINGERPRINT_SEPARATOR {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

/// Returns true when `s` can be used as a single path component.
fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s.contains('\0')
        && !s.chars().any(std::path::is_separator)
}
