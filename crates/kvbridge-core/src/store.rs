//! The backend-agnostic store contract.
//!
//! Callers program against [`Store`] and can swap backends without code
//! changes. Keys are hierarchical `/`-separated paths; every read returns a
//! [`KvPair`] whose `last_index` is the token for optimistic concurrency.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::StoreError;

/// A key with its value and concurrency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    /// The key as the caller addressed it.
    pub key: String,
    /// The stored bytes.
    pub value: Vec<u8>,
    /// Opaque version token. Present it unchanged to
    /// [`Store::atomic_put`] or [`Store::atomic_delete`] to assert nobody
    /// modified the key since it was read.
    pub last_index: u64,
}

/// Options for writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Expire the key after this long. `None` or zero keeps it forever.
    pub ttl: Option<Duration>,
}

impl WriteOptions {
    /// Options with the given TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// Options for [`Store::new_lock`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockOptions {
    /// Optional value to associate with the lock.
    pub value: Option<Vec<u8>>,
    /// Lock lease duration.
    pub ttl: Option<Duration>,
}

/// Signal that stops a watch when sent or dropped.
pub type StopSignal = oneshot::Receiver<()>;

/// Stream of updates for a single watched key.
pub type KeyWatch = mpsc::Receiver<KvPair>;

/// Stream of snapshots for a watched directory.
pub type TreeWatch = mpsc::Receiver<Vec<KvPair>>;

/// A distributed lock handle.
#[async_trait::async_trait]
pub trait Locker: Send + Sync {
    /// Acquire the lock; the returned receiver fires if the lock is lost.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the lock cannot be acquired.
    async fn lock(&self) -> Result<oneshot::Receiver<()>, StoreError>;

    /// Release the lock.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the lock cannot be released.
    async fn unlock(&self) -> Result<(), StoreError>;
}

/// A key-value store with versioned reads, compare-and-swap and
/// directory-style listing.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Write `value` at `key`, replacing any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the backend fails.
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        options: Option<WriteOptions>,
    ) -> Result<(), StoreError>;

    /// Read the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyNotFound`] if the key has no value.
    async fn get(&self, key: &str) -> Result<KvPair, StoreError>;

    /// Delete `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the backend fails.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check whether `key` has a value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the backend fails.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// List every pair under `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyNotFound`] if nothing lives under the
    /// directory.
    async fn list(&self, directory: &str) -> Result<Vec<KvPair>, StoreError>;

    /// Delete every key under `directory`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyNotFound`] if nothing lives under the
    /// directory.
    async fn delete_tree(&self, directory: &str) -> Result<(), StoreError>;

    /// Write `value` at `key` only if the key still matches `previous`.
    /// Pass `None` to require that the key does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyModified`] if the precondition fails.
    async fn atomic_put(
        &self,
        key: &str,
        value: &[u8],
        previous: Option<&KvPair>,
        options: Option<WriteOptions>,
    ) -> Result<(bool, KvPair), StoreError>;

    /// Delete `key` only if it still matches `previous`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyModified`] if the precondition fails.
    async fn atomic_delete(&self, key: &str, previous: Option<&KvPair>) -> Result<bool, StoreError>;

    /// Watch a key for changes.
    ///
    /// # Errors
    ///
    /// Backends without change notification return
    /// [`StoreError::NotImplemented`].
    async fn watch(&self, key: &str, stop: StopSignal) -> Result<KeyWatch, StoreError>;

    /// Watch every key under a directory for changes.
    ///
    /// # Errors
    ///
    /// Backends without change notification return
    /// [`StoreError::NotImplemented`].
    async fn watch_tree(&self, directory: &str, stop: StopSignal) -> Result<TreeWatch, StoreError>;

    /// Create a lock for `key`. The returned lock is not held.
    ///
    /// # Errors
    ///
    /// Backends without locking return [`StoreError::NotImplemented`].
    async fn new_lock(
        &self,
        key: &str,
        options: Option<LockOptions>,
    ) -> Result<Box<dyn Locker>, StoreError>;

    /// Release the backend connection. No calls may follow.
    async fn close(&self);
}
