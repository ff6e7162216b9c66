//! Compare-and-swap emulated from primitive engine commands.
//!
//! Each operation reads the current envelope, compares its version with the
//! caller's expectation, then writes or deletes. Those are separate engine
//! round trips with no server-side script or transaction around them, so
//! another writer can slip in between the read and the write. This is
//! best-effort optimistic concurrency, not an atomic primitive.
//!
//! The replace path of [`atomic_put`] deletes the key and then recreates it
//! with a create-only write. A reader in between sees the key as absent.
//! If another writer recreates the key in that gap the create-only write
//! fails and the caller gets [`StoreError::KeyModified`].
//!
//! | previous | key exists | outcome |
//! |---|---|---|
//! | `None` | no | proceed |
//! | `None` | yes | `KeyModified` |
//! | `Some` | no | `KeyModified` |
//! | `Some`, same version | yes | proceed |
//! | `Some`, other version | yes | `KeyModified` |

use kvbridge_engine::Engine;
use tracing::{debug, warn};

use crate::codec::{self, Envelope, VersionClock};
use crate::error::StoreError;
use crate::key::normalize;
use crate::store::{KvPair, WriteOptions};

/// Read the envelope at a flat key. A missing key is `Ok(None)`.
async fn read_current<E: Engine + ?Sized>(
    engine: &E,
    flat: &str,
) -> Result<Option<Envelope>, StoreError> {
    match engine.get(flat).await? {
        Some(bytes) => codec::decode(flat, &bytes).map(Some),
        None => Ok(None),
    }
}

/// Apply the decision table.
fn check(
    key: &str,
    previous: Option<&KvPair>,
    current: Option<&Envelope>,
) -> Result<(), StoreError> {
    match (previous, current) {
        (None, None) => Ok(()),
        (Some(prev), Some(cur)) if prev.last_index == cur.version => Ok(()),
        (None, Some(cur)) => {
            warn!(key = %key, current = cur.version, "create refused: key already exists");
            Err(StoreError::KeyModified)
        }
        (Some(prev), None) => {
            warn!(key = %key, expected = prev.last_index, "compare failed: key no longer exists");
            Err(StoreError::KeyModified)
        }
        (Some(prev), Some(cur)) => {
            warn!(
                key = %key,
                expected = prev.last_index,
                current = cur.version,
                "compare failed: version mismatch"
            );
            Err(StoreError::KeyModified)
        }
    }
}

/// Write `value` at `key` if the key still matches `previous` (`None`:
/// the key must not exist). Returns the new pair with a fresh version.
///
/// # Errors
///
/// - [`StoreError::KeyModified`] if the precondition fails, or another
///   writer recreated the key during the replace window.
/// - [`StoreError::CorruptEnvelope`] if the current value is not an envelope.
/// - [`StoreError::Engine`] if any engine command fails.
pub async fn atomic_put<E: Engine + ?Sized>(
    engine: &E,
    clock: &VersionClock,
    key: &str,
    value: &[u8],
    previous: Option<&KvPair>,
    options: Option<WriteOptions>,
) -> Result<(bool, KvPair), StoreError> {
    let flat = normalize(key);
    let current = read_current(engine, &flat).await?;
    check(key, previous, current.as_ref())?;

    if previous.is_some() {
        // The create-only write below needs the key gone.
        engine.delete(std::slice::from_ref(&flat)).await?;
    }

    let version = clock.next();
    let ttl = options.and_then(|o| o.ttl);
    let created = engine
        .set_if_not_exists(&flat, &codec::encode(value, version), ttl)
        .await?;
    if !created {
        warn!(key = %key, "create-only write lost to a concurrent writer");
        return Err(StoreError::KeyModified);
    }

    debug!(key = %key, version, "atomic put");
    Ok((
        true,
        KvPair {
            key: key.to_owned(),
            value: value.to_vec(),
            last_index: version,
        },
    ))
}

/// Delete `key` if it still matches `previous` (`None`: the key must not
/// exist, which makes the delete a no-op).
///
/// # Errors
///
/// - [`StoreError::KeyModified`] if the precondition fails.
/// - [`StoreError::CorruptEnvelope`] if the current value is not an envelope.
/// - [`StoreError::Engine`] if any engine command fails.
pub async fn atomic_delete<E: Engine + ?Sized>(
    engine: &E,
    key: &str,
    previous: Option<&KvPair>,
) -> Result<bool, StoreError> {
    let flat = normalize(key);
    let current = read_current(engine, &flat).await?;
    check(key, previous, current.as_ref())?;

    engine.delete(std::slice::from_ref(&flat)).await?;
    debug!(key = %key, "atomic delete");
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kvbridge_engine::MemoryEngine;

    use super::*;

    fn pair(key: &str, version: u64) -> KvPair {
        KvPair {
            key: key.to_owned(),
            value: Vec::new(),
            last_index: version,
        }
    }

    #[test]
    fn decision_table() {
        let env = Envelope::new(b"v".to_vec(), 5);
        assert!(check("k", None, None).is_ok());
        assert!(matches!(check("k", None, Some(&env)), Err(StoreError::KeyModified)));
        assert!(matches!(check("k", Some(&pair("k", 5)), None), Err(StoreError::KeyModified)));
        assert!(check("k", Some(&pair("k", 5)), Some(&env)).is_ok());
        assert!(matches!(
            check("k", Some(&pair("k", 6)), Some(&env)),
            Err(StoreError::KeyModified)
        ));
    }

    #[tokio::test]
    async fn create_then_replace_issues_fresh_versions() {
        let engine = MemoryEngine::new();
        let clock = VersionClock::new();

        let (ok, first) = atomic_put(&engine, &clock, "k", b"1", None, None).await.unwrap();
        assert!(ok);
        let (_, second) = atomic_put(&engine, &clock, "k", b"2", Some(&first), None)
            .await
            .unwrap();
        assert_ne!(first.last_index, second.last_index);

        let stored = codec::decode("/k", &engine.get("/k").await.unwrap().unwrap()).unwrap();
        assert_eq!(stored, Envelope::new(b"2".to_vec(), second.last_index));
    }

    #[tokio::test]
    async fn failed_precondition_leaves_value_untouched() {
        let engine = MemoryEngine::new();
        let clock = VersionClock::new();
        let (_, original) = atomic_put(&engine, &clock, "k", b"1", None, None).await.unwrap();

        let stale = pair("k", original.last_index + 1);
        let result = atomic_put(&engine, &clock, "k", b"2", Some(&stale), None).await;
        assert!(matches!(result, Err(StoreError::KeyModified)));

        let stored = codec::decode("/k", &engine.get("/k").await.unwrap().unwrap()).unwrap();
        assert_eq!(stored.value, b"1");
        assert_eq!(stored.version, original.last_index);
    }

    #[tokio::test]
    async fn delete_without_previous_on_missing_key_succeeds() {
        let engine = MemoryEngine::new();
        assert!(atomic_delete(&engine, "ghost", None).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_current_value_is_reported() {
        let engine = MemoryEngine::new();
        engine.set("/k", b"raw bytes", None).await.unwrap();
        let result = atomic_delete(&engine, "k", Some(&pair("k", 1))).await;
        assert!(matches!(result, Err(StoreError::CorruptEnvelope { .. })));
    }
}
