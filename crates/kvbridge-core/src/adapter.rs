//! [`Store`] implemented over any primitive [`Engine`].
//!
//! Plain reads and writes forward to a single engine command with the key
//! normalized and the value wrapped in a versioned envelope. Listing and
//! subtree deletion go through the scan aggregator; compare-and-swap goes
//! through the emulator in [`crate::cas`].

use kvbridge_engine::Engine;
use tracing::debug;

use crate::cas;
use crate::codec::{self, VersionClock};
use crate::error::StoreError;
use crate::key::{normalize, prefix_pattern};
use crate::scan::{multi_get_flat, scan_prefix};
use crate::store::{
    KeyWatch, KvPair, LockOptions, Locker, StopSignal, Store, TreeWatch, WriteOptions,
};

/// A [`Store`] synthesized on top of an [`Engine`].
///
/// Holds the engine handle and a version clock; all durable state lives in
/// the engine. No internal locking: concurrent callers race exactly as the
/// engine lets them.
///
/// # Examples
///
/// ```
/// # use kvbridge_core::{EngineStore, Store};
/// # use kvbridge_engine::MemoryEngine;
/// # #[tokio::main]
/// # async fn main() {
/// let store = EngineStore::new(MemoryEngine::new());
/// store.put("app/config", b"data", None).await.unwrap();
/// let pair = store.get("app/config").await.unwrap();
/// assert_eq!(pair.value, b"data");
/// # }
/// ```
#[derive(Debug)]
pub struct EngineStore<E: Engine> {
    engine: E,
    clock: VersionClock,
}

impl<E: Engine> EngineStore<E> {
    /// Wrap an engine.
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            clock: VersionClock::new(),
        }
    }

    /// Return the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }
}

#[async_trait::async_trait]
impl<E: Engine> Store for EngineStore<E> {
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        options: Option<WriteOptions>,
    ) -> Result<(), StoreError> {
        let flat = normalize(key);
        let version = self.clock.next();
        let ttl = options.and_then(|o| o.ttl);
        self.engine
            .set(&flat, &codec::encode(value, version), ttl)
            .await?;
        debug!(key = %flat, version, "put");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<KvPair, StoreError> {
        let flat = normalize(key);
        let bytes = self
            .engine
            .get(&flat)
            .await?
            .ok_or(StoreError::KeyNotFound)?;
        let envelope = codec::decode(&flat, &bytes)?;
        Ok(KvPair {
            key: key.to_owned(),
            value: envelope.value,
            last_index: envelope.version,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.engine.delete(&[normalize(key)]).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.engine.exists(&normalize(key)).await?)
    }

    async fn list(&self, directory: &str) -> Result<Vec<KvPair>, StoreError> {
        let keys = scan_prefix(&self.engine, &prefix_pattern(directory)).await?;
        debug!(directory = %directory, keys = keys.len(), "list");
        // Scanned keys are engine keys already; reading them back normalized
        // would miss any not written in canonical form.
        let pairs = multi_get_flat(&self.engine, &keys).await?;
        if pairs.is_empty() {
            return Err(StoreError::KeyNotFound);
        }
        Ok(pairs)
    }

    async fn delete_tree(&self, directory: &str) -> Result<(), StoreError> {
        let keys = scan_prefix(&self.engine, &prefix_pattern(directory)).await?;
        let removed = self.engine.delete(&keys).await?;
        debug!(directory = %directory, keys = keys.len(), removed, "delete tree");
        Ok(())
    }

    async fn atomic_put(
        &self,
        key: &str,
        value: &[u8],
        previous: Option<&KvPair>,
        options: Option<WriteOptions>,
    ) -> Result<(bool, KvPair), StoreError> {
        cas::atomic_put(&self.engine, &self.clock, key, value, previous, options).await
    }

    async fn atomic_delete(
        &self,
        key: &str,
        previous: Option<&KvPair>,
    ) -> Result<bool, StoreError> {
        cas::atomic_delete(&self.engine, key, previous).await
    }

    async fn watch(&self, _key: &str, _stop: StopSignal) -> Result<KeyWatch, StoreError> {
        Err(StoreError::NotImplemented)
    }

    async fn watch_tree(
        &self,
        _directory: &str,
        _stop: StopSignal,
    ) -> Result<TreeWatch, StoreError> {
        Err(StoreError::NotImplemented)
    }

    async fn new_lock(
        &self,
        _key: &str,
        _options: Option<LockOptions>,
    ) -> Result<Box<dyn Locker>, StoreError> {
        Err(StoreError::NotImplemented)
    }

    async fn close(&self) {
        self.engine.close().await;
    }
}
