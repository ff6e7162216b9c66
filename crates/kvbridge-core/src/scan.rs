//! Prefix scans and batched reads over the flat engine keyspace.
//!
//! Directory listing and subtree deletion are both "scan every key matching
//! a prefix pattern, then act on the set". [`scan_prefix`] drives the
//! engine's cursor to completion and collects everything in memory; there
//! is no cap on how many keys that may be. [`KeyScanner`] exposes the same
//! walk one page at a time for callers that want to bound memory.

use std::collections::HashSet;

use kvbridge_engine::{Engine, START_CURSOR};
use tracing::debug;

use crate::codec;
use crate::error::StoreError;
use crate::key::normalize;
use crate::store::KvPair;

/// Keys examined per engine scan call.
pub const SCAN_PAGE_SIZE: usize = 10;

/// Lazy, page-at-a-time walk over keys matching a pattern.
///
/// Pages may be empty and, as with Redis `SCAN`, a key may show up on more
/// than one page.
#[derive(Debug)]
pub struct KeyScanner<'a, E: Engine + ?Sized> {
    engine: &'a E,
    pattern: String,
    cursor: u64,
    done: bool,
}

impl<'a, E: Engine + ?Sized> KeyScanner<'a, E> {
    /// Start a scan for `pattern` at the initial cursor.
    pub fn new(engine: &'a E, pattern: impl Into<String>) -> Self {
        Self {
            engine,
            pattern: pattern.into(),
            cursor: START_CURSOR,
            done: false,
        }
    }

    /// Fetch the next page, or `None` once the engine reports the scan is
    /// complete.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Engine`] if the scan command fails.
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>, StoreError> {
        if self.done {
            return Ok(None);
        }
        let page = self
            .engine
            .scan(self.cursor, &self.pattern, SCAN_PAGE_SIZE)
            .await?;
        debug!(
            pattern = %self.pattern,
            cursor = self.cursor,
            next = page.cursor,
            matched = page.keys.len(),
            "scan page"
        );
        self.cursor = page.cursor;
        self.done = page.cursor == START_CURSOR;
        Ok(Some(page.keys))
    }
}

/// Collect every flat key matching `pattern`, in first-seen order without
/// duplicates.
///
/// # Errors
///
/// Returns [`StoreError::KeyNotFound`] when nothing matches, and
/// [`StoreError::Engine`] if a scan command fails.
pub async fn scan_prefix<E: Engine + ?Sized>(
    engine: &E,
    pattern: &str,
) -> Result<Vec<String>, StoreError> {
    let mut scanner = KeyScanner::new(engine, pattern);
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    while let Some(page) = scanner.next_page().await? {
        for key in page {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }
    if keys.is_empty() {
        return Err(StoreError::KeyNotFound);
    }
    Ok(keys)
}

/// Read and decode the envelopes for caller `keys` in one round trip.
///
/// Keys are normalized before the read. Absent keys are skipped silently.
/// Each pair carries the key exactly as passed in at that position.
///
/// # Errors
///
/// Returns [`StoreError::Engine`] if the batched read fails and
/// [`StoreError::CorruptEnvelope`] if a present value cannot be decoded.
pub async fn multi_get<E: Engine + ?Sized>(
    engine: &E,
    keys: &[String],
) -> Result<Vec<KvPair>, StoreError> {
    let flat: Vec<String> = keys.iter().map(|k| normalize(k)).collect();
    read_pairs(engine, keys, &flat).await
}

/// Read and decode the envelopes stored under flat engine `keys`, as
/// returned by a scan, without rewriting them.
///
/// Absent keys are skipped silently; pairs carry the engine key.
///
/// # Errors
///
/// Returns [`StoreError::Engine`] if the batched read fails and
/// [`StoreError::CorruptEnvelope`] if a present value cannot be decoded.
pub async fn multi_get_flat<E: Engine + ?Sized>(
    engine: &E,
    keys: &[String],
) -> Result<Vec<KvPair>, StoreError> {
    read_pairs(engine, keys, keys).await
}

/// `MGET` the `flat` keys; pair `i` is reported under `names[i]`.
async fn read_pairs<E: Engine + ?Sized>(
    engine: &E,
    names: &[String],
    flat: &[String],
) -> Result<Vec<KvPair>, StoreError> {
    if flat.is_empty() {
        return Ok(Vec::new());
    }
    let slots = engine.multi_get(flat).await?;

    let mut pairs = Vec::with_capacity(slots.len());
    for ((name, flat_key), slot) in names.iter().zip(flat).zip(slots) {
        let Some(bytes) = slot else {
            continue;
        };
        let envelope = codec::decode(flat_key, &bytes)?;
        pairs.push(KvPair {
            key: name.clone(),
            value: envelope.value,
            last_index: envelope.version,
        });
    }
    Ok(pairs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use kvbridge_engine::{EngineError, MemoryEngine, ScanPage};

    use super::*;

    /// Replays scripted scan pages and counts calls.
    struct ScriptedScan {
        pages: Vec<ScanPage>,
        calls: AtomicUsize,
        cursors: std::sync::Mutex<Vec<u64>>,
    }

    impl ScriptedScan {
        fn new(pages: Vec<ScanPage>) -> Self {
            Self {
                pages,
                calls: AtomicUsize::new(0),
                cursors: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Engine for ScriptedScan {
        async fn set(&self, _: &str, _: &[u8], _: Option<Duration>) -> Result<(), EngineError> {
            Ok(())
        }
        async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, EngineError> {
            Ok(None)
        }
        async fn delete(&self, _: &[String]) -> Result<u64, EngineError> {
            Ok(0)
        }
        async fn set_if_not_exists(
            &self,
            _: &str,
            _: &[u8],
            _: Option<Duration>,
        ) -> Result<bool, EngineError> {
            Ok(false)
        }
        async fn exists(&self, _: &str) -> Result<bool, EngineError> {
            Ok(false)
        }
        async fn scan(&self, cursor: u64, _: &str, _: usize) -> Result<ScanPage, EngineError> {
            self.cursors.lock().unwrap().push(cursor);
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages[i].clone())
        }
        async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, EngineError> {
            Ok(vec![None; keys.len()])
        }
    }

    fn page(cursor: u64, keys: &[&str]) -> ScanPage {
        ScanPage {
            cursor,
            keys: keys.iter().map(|k| (*k).to_owned()).collect(),
        }
    }

    #[tokio::test]
    async fn follows_returned_cursor_until_it_wraps() {
        let engine = ScriptedScan::new(vec![
            page(17, &["/a/1"]),
            page(4, &[]),
            page(0, &["/a/2"]),
        ]);
        let keys = scan_prefix(&engine, "/a*").await.unwrap();
        assert_eq!(keys, vec!["/a/1", "/a/2"]);
        assert_eq!(*engine.cursors.lock().unwrap(), vec![0, 17, 4]);
    }

    #[tokio::test]
    async fn duplicate_keys_across_pages_collapse() {
        let engine = ScriptedScan::new(vec![page(3, &["/a/1", "/a/2"]), page(0, &["/a/2"])]);
        let keys = scan_prefix(&engine, "/a*").await.unwrap();
        assert_eq!(keys, vec!["/a/1", "/a/2"]);
    }

    #[tokio::test]
    async fn empty_scan_is_not_found() {
        let engine = ScriptedScan::new(vec![page(9, &[]), page(0, &[])]);
        let result = scan_prefix(&engine, "/nothing*").await;
        assert!(matches!(result, Err(StoreError::KeyNotFound)));
    }

    #[tokio::test]
    async fn scanner_yields_pages_then_none() {
        let engine = ScriptedScan::new(vec![page(5, &["/x"]), page(0, &["/y"])]);
        let mut scanner = KeyScanner::new(&engine, "/*");
        assert_eq!(scanner.next_page().await.unwrap(), Some(vec!["/x".to_owned()]));
        assert_eq!(scanner.next_page().await.unwrap(), Some(vec!["/y".to_owned()]));
        assert_eq!(scanner.next_page().await.unwrap(), None);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn multi_get_skips_absent_and_keeps_caller_keys() {
        let engine = MemoryEngine::new();
        engine
            .set("/a/b", &codec::encode(b"1", 11), None)
            .await
            .unwrap();
        engine
            .set("/a/d", &codec::encode(b"3", 33), None)
            .await
            .unwrap();

        let keys = vec!["a/b".to_owned(), "a/c".to_owned(), "/a/d".to_owned()];
        let pairs = multi_get(&engine, &keys).await.unwrap();
        assert_eq!(
            pairs,
            vec![
                KvPair {
                    key: "a/b".to_owned(),
                    value: b"1".to_vec(),
                    last_index: 11,
                },
                KvPair {
                    key: "/a/d".to_owned(),
                    value: b"3".to_vec(),
                    last_index: 33,
                },
            ]
        );
    }

    #[tokio::test]
    async fn multi_get_flat_reads_engine_keys_verbatim() {
        let engine = MemoryEngine::new();
        engine
            .set("/a/b/", &codec::encode(b"1", 11), None)
            .await
            .unwrap();
        engine
            .set("//a/c", &codec::encode(b"2", 22), None)
            .await
            .unwrap();

        let keys = vec!["/a/b/".to_owned(), "//a/c".to_owned()];
        let pairs = multi_get_flat(&engine, &keys).await.unwrap();
        let got: Vec<(&str, u64)> = pairs
            .iter()
            .map(|p| (p.key.as_str(), p.last_index))
            .collect();
        assert_eq!(got, vec![("/a/b/", 11), ("//a/c", 22)]);

        // The caller-facing read normalizes, so the same keys miss.
        assert!(multi_get(&engine, &keys).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn multi_get_of_nothing_skips_the_engine() {
        let engine = MemoryEngine::new();
        engine.close().await;
        // A closed engine would fail any command.
        assert!(multi_get(&engine, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn multi_get_reports_corrupt_values() {
        let engine = MemoryEngine::new();
        engine.set("/raw", b"not an envelope", None).await.unwrap();
        let result = multi_get(&engine, &["raw".to_owned()]).await;
        assert!(matches!(result, Err(StoreError::CorruptEnvelope { .. })));
    }
}
