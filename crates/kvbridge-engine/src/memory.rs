//! In-memory engine for development and tests.
//!
//! This engine stores all data in a `BTreeMap` behind a `RwLock`. It is not
//! persistent — all data is lost when the process exits. It mimics the
//! Redis command semantics the adapter relies on: TTL expiry, create-only
//! writes, cursor scans whose pages may come back empty, and positional
//! multi-get.
//!
//! As with Redis `SCAN`, a key present for the whole scan is always
//! reported: a cursor remembers the last key it examined and the next page
//! resumes after it, so writes between pages never shift it.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::{Engine, EngineError, START_CURSOR, ScanPage, glob};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: &[u8], ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_vec(),
            expires_at: ttl.filter(|d| !d.is_zero()).map(|d| Instant::now() + d),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Open scan cursors. Each id is handed out once and consumed by the call
/// that resumes it.
#[derive(Debug, Default)]
struct ScanCursors {
    last_id: u64,
    resume_after: HashMap<u64, String>,
}

impl ScanCursors {
    fn open(&mut self, last_examined: String) -> u64 {
        self.last_id = self.last_id.wrapping_add(1).max(1);
        self.resume_after.insert(self.last_id, last_examined);
        self.last_id
    }
}

/// An in-memory engine backed by a `BTreeMap`.
///
/// Thread-safe and async-compatible. Clones share the same data.
///
/// # Examples
///
/// ```
/// # use kvbridge_engine::{Engine, MemoryEngine};
/// # #[tokio::main]
/// # async fn main() {
/// let engine = MemoryEngine::new();
/// engine.set("/app/config", b"data", None).await.unwrap();
/// let val = engine.get("/app/config").await.unwrap();
/// assert_eq!(val, Some(b"data".to_vec()));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    data: Arc<RwLock<BTreeMap<String, Entry>>>,
    cursors: Arc<Mutex<ScanCursors>>,
    closed: Arc<AtomicBool>,
}

impl MemoryEngine {
    /// Create a new empty in-memory engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            cursors: Arc::new(Mutex::new(ScanCursors::default())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    fn live_value(data: &BTreeMap<String, Entry>, key: &str, now: Instant) -> Option<Vec<u8>> {
        data.get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Engine for MemoryEngine {
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), EngineError> {
        self.ensure_open()?;
        let mut data = self.data.write().await;
        data.insert(key.to_owned(), Entry::new(value, ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        self.ensure_open()?;
        let data = self.data.read().await;
        Ok(Self::live_value(&data, key, Instant::now()))
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, EngineError> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut data = self.data.write().await;
        let mut removed = 0;
        for key in keys {
            if data.remove(key).is_some_and(|e| e.is_live(now)) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, EngineError> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut data = self.data.write().await;
        if data.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        data.insert(key.to_owned(), Entry::new(value, ttl));
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool, EngineError> {
        self.ensure_open()?;
        let data = self.data.read().await;
        Ok(Self::live_value(&data, key, Instant::now()).is_some())
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, EngineError> {
        self.ensure_open()?;
        let resume = if cursor == START_CURSOR {
            None
        } else {
            let last = self.cursors.lock().await.resume_after.remove(&cursor);
            Some(last.ok_or_else(|| EngineError::Command {
                command: "SCAN",
                reason: format!("invalid cursor {cursor}"),
            })?)
        };

        let now = Instant::now();
        let data = self.data.read().await;
        let lower = resume.as_deref().map_or(Bound::Unbounded, Bound::Excluded);

        let mut keys = Vec::new();
        let mut last_examined = None;
        for (key, entry) in data.range::<str, _>((lower, Bound::Unbounded)).take(count.max(1)) {
            if entry.is_live(now) && glob::matches(pattern, key) {
                keys.push(key.clone());
            }
            last_examined = Some(key);
        }

        let more = last_examined.is_some_and(|last| {
            data.range::<str, _>((Bound::Excluded(last.as_str()), Bound::Unbounded))
                .next()
                .is_some()
        });
        let cursor = match last_examined {
            Some(last) if more => self.cursors.lock().await.open(last.clone()),
            _ => START_CURSOR,
        };
        Ok(ScanPage { cursor, keys })
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, EngineError> {
        self.ensure_open()?;
        let now = Instant::now();
        let data = self.data.read().await;
        Ok(keys
            .iter()
            .map(|k| Self::live_value(&data, k, now))
            .collect())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| (*k).to_owned()).collect()
    }

    #[tokio::test]
    async fn get_of_missing_key_is_none() {
        let engine = MemoryEngine::new();
        let result = engine.get("/does/not/exist").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn set_overwrites_existing() {
        let engine = MemoryEngine::new();
        engine.set("key", b"v1", None).await.unwrap();
        engine.set("key", b"v2", None).await.unwrap();
        let val = engine.get("key").await.unwrap();
        assert_eq!(val, Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn delete_counts_only_existing_keys() {
        let engine = MemoryEngine::new();
        engine.set("a", b"1", None).await.unwrap();
        engine.set("b", b"2", None).await.unwrap();
        let removed = engine.delete(&keys(&["a", "b", "nope"])).await.unwrap();
        assert_eq!(removed, 2);
        assert!(!engine.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn set_if_not_exists_only_creates() {
        let engine = MemoryEngine::new();
        assert!(engine.set_if_not_exists("k", b"first", None).await.unwrap());
        assert!(!engine.set_if_not_exists("k", b"second", None).await.unwrap());
        assert_eq!(engine.get("k").await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn expired_entries_are_absent() {
        let engine = MemoryEngine::new();
        engine
            .set("short", b"v", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(engine.exists("short").await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!engine.exists("short").await.unwrap());
        assert_eq!(engine.get("short").await.unwrap(), None);
        // An expired key no longer blocks a create-only write.
        assert!(engine.set_if_not_exists("short", b"new", None).await.unwrap());
    }

    #[tokio::test]
    async fn scan_pages_until_cursor_wraps() {
        let engine = MemoryEngine::new();
        for i in 0..25 {
            engine.set(&format!("/dir/{i:02}"), b"v", None).await.unwrap();
        }
        engine.set("/other", b"v", None).await.unwrap();

        let mut cursor = START_CURSOR;
        let mut found = Vec::new();
        let mut pages = 0;
        loop {
            let page = engine.scan(cursor, "/dir*", 10).await.unwrap();
            found.extend(page.keys);
            pages += 1;
            cursor = page.cursor;
            if cursor == START_CURSOR {
                break;
            }
        }
        assert_eq!(pages, 3);
        assert_eq!(found.len(), 25);
        assert!(!found.contains(&"/other".to_owned()));
    }

    #[tokio::test]
    async fn scan_survives_deletes_between_pages() {
        let engine = MemoryEngine::new();
        for i in 0..20 {
            engine.set(&format!("/k/{i:02}"), b"v", None).await.unwrap();
        }

        let first = engine.scan(START_CURSOR, "/k/*", 10).await.unwrap();
        assert_ne!(first.cursor, START_CURSOR);
        engine.delete(&keys(&["/k/00", "/k/01"])).await.unwrap();

        let second = engine.scan(first.cursor, "/k/*", 10).await.unwrap();
        assert_eq!(second.cursor, START_CURSOR);
        assert_eq!(second.keys.len(), 10);
        assert!(second.keys.contains(&"/k/10".to_owned()));
    }

    #[tokio::test]
    async fn scan_reports_keys_added_after_the_cursor() {
        let engine = MemoryEngine::new();
        for i in 0..12 {
            engine.set(&format!("/k/{i:02}"), b"v", None).await.unwrap();
        }
        let first = engine.scan(START_CURSOR, "*", 10).await.unwrap();
        engine.set("/k/99", b"v", None).await.unwrap();

        let second = engine.scan(first.cursor, "*", 10).await.unwrap();
        assert_eq!(second.keys, keys(&["/k/10", "/k/11", "/k/99"]));
        assert_eq!(second.cursor, START_CURSOR);
    }

    #[tokio::test]
    async fn scan_rejects_unknown_cursor() {
        let engine = MemoryEngine::new();
        let result = engine.scan(42, "*", 10).await;
        assert!(matches!(result, Err(EngineError::Command { command: "SCAN", .. })));
    }

    #[tokio::test]
    async fn multi_get_preserves_positions() {
        let engine = MemoryEngine::new();
        engine.set("a", b"1", None).await.unwrap();
        engine.set("c", b"3", None).await.unwrap();
        let vals = engine.multi_get(&keys(&["a", "b", "c"])).await.unwrap();
        assert_eq!(vals, vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]);
    }

    #[tokio::test]
    async fn closed_engine_rejects_commands() {
        let engine = MemoryEngine::new();
        engine.close().await;
        let result = engine.get("k").await;
        assert!(matches!(result, Err(EngineError::Closed)));
    }

    #[tokio::test]
    async fn clones_address_the_same_keyspace() {
        let engine = MemoryEngine::new();
        let clone = engine.clone();
        engine.set("key", b"val", None).await.unwrap();
        assert_eq!(clone.get("key").await.unwrap(), Some(b"val".to_vec()));
    }
}
