//! Engine primitives for kvbridge.
//!
//! This crate defines the [`Engine`] trait — the handful of flat key-value
//! commands a single-node engine offers (set, get, delete, set-if-not-exists,
//! exists, cursor scan, multi-get). It knows nothing about versions,
//! directories or compare-and-swap; `kvbridge-core` synthesizes those on top.
//!
//! Two implementations are provided:
//!
//! - [`RedisEngine`] — a single Redis endpoint (feature `redis-backend`)
//! - [`MemoryEngine`] — in-memory, for development and tests

mod error;
pub mod glob;
mod memory;
#[cfg(feature = "redis-backend")]
mod redis_engine;

use std::time::Duration;

pub use error::EngineError;
pub use memory::MemoryEngine;
#[cfg(feature = "redis-backend")]
pub use redis_engine::{RedisEngine, RedisOptions};

/// The cursor value that starts a scan and, when returned, ends it.
pub const START_CURSOR: u64 = 0;

/// One page of a cursor-based scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor to pass to the next call. [`START_CURSOR`] means the scan is
    /// complete.
    pub cursor: u64,
    /// Keys matched on this page. May be empty even when the scan is not
    /// complete, and may repeat keys reported on earlier pages.
    pub keys: Vec<String>,
}

/// A single-node key-value engine exposing only primitive commands.
///
/// Keys are flat UTF-8 strings; values are opaque bytes. A `ttl` of `None`
/// (or zero) stores the value without expiration.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Store a value, overwriting any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the command fails or times out.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), EngineError>;

    /// Retrieve a value. Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the command fails or times out.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError>;

    /// Delete keys, returning how many existed. Deleting a missing key is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the command fails or times out.
    async fn delete(&self, keys: &[String]) -> Result<u64, EngineError>;

    /// Store a value only if the key is absent. Returns `true` when the key
    /// was created.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the command fails or times out.
    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, EngineError>;

    /// Check whether a key exists.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the command fails or times out.
    async fn exists(&self, key: &str) -> Result<bool, EngineError>;

    /// Run one step of a cursor-based scan over keys matching a glob
    /// `pattern` (see [`glob`]), examining roughly `count` keys.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the command fails or times out.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, EngineError>;

    /// Retrieve many values in one round trip. The result has one slot per
    /// requested key, in order; absent keys yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the command fails or times out.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, EngineError>;

    /// Release the engine connection. Commands issued afterwards fail with
    /// [`EngineError::Closed`].
    async fn close(&self) {}
}

/// Convert an optional TTL into whole milliseconds, rounding sub-millisecond
/// durations up so a non-zero TTL never becomes "no expiry".
///
/// Returns `None` for no TTL or a zero TTL.
#[must_use]
pub fn ttl_millis(ttl: Option<Duration>) -> Option<u64> {
    let ttl = ttl.filter(|d| !d.is_zero())?;
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    Some(millis.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_millis_none_and_zero_mean_no_expiry() {
        assert_eq!(ttl_millis(None), None);
        assert_eq!(ttl_millis(Some(Duration::ZERO)), None);
    }

    #[test]
    fn ttl_millis_rounds_sub_millisecond_up() {
        assert_eq!(ttl_millis(Some(Duration::from_micros(10))), Some(1));
        assert_eq!(ttl_millis(Some(Duration::from_secs(2))), Some(2000));
    }
}
