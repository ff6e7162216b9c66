//! Mapping from hierarchical caller keys to flat engine keys.
//!
//! Keys are `/`-separated paths. Normalization drops empty segments and
//! roots the result at `/`, so `a/b`, `/a/b`, `a//b/` all address `/a/b`.
//! Directories have no stored representation: a directory is the set of
//! flat keys sharing its normalized form as a string prefix.

use kvbridge_engine::glob;

const SEPARATOR: char = '/';

/// Normalize a caller key to its flat engine key.
///
/// Idempotent. The empty key and `/` both normalize to `/`.
#[must_use]
pub fn normalize(key: &str) -> String {
    let mut flat = String::with_capacity(key.len() + 1);
    for segment in key.split(SEPARATOR).filter(|s| !s.is_empty()) {
        flat.push(SEPARATOR);
        flat.push_str(segment);
    }
    if flat.is_empty() {
        flat.push(SEPARATOR);
    }
    flat
}

/// Build the scan pattern covering every flat key that has
/// `normalize(directory)` as a prefix.
#[must_use]
pub fn prefix_pattern(directory: &str) -> String {
    let mut pattern = glob::escape(&normalize(directory));
    pattern.push('*');
    pattern
}
