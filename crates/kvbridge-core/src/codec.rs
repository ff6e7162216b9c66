//! Versioned envelopes — the only thing this crate ever stores in an engine.
//!
//! A caller's value is wrapped together with a version stamp and serialized
//! as JSON: `{"Value":"<base64>","Version":<u64>}`, the same envelope the
//! libkv Redis driver writes. Only the value format is shared: libkv lays
//! out engine keys differently (`//a/b` where this crate writes `/a/b`).
//!
//! Versions are opaque tokens compared only for equality. They come from a
//! [`VersionClock`]: wall-clock nanoseconds, bumped so that a single clock
//! never hands out the same stamp twice. Two processes can still collide.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer};
use tracing::error;

use crate::error::StoreError;

/// A caller value paired with its version stamp.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    /// The caller's bytes, never interpreted.
    #[serde(rename = "Value", deserialize_with = "base64_or_null")]
    pub value: Vec<u8>,
    /// Version stamp assigned when the envelope was written.
    #[serde(rename = "Version")]
    pub version: u64,
}

impl Envelope {
    /// Wrap `value` with `version`.
    #[must_use]
    pub fn new(value: Vec<u8>, version: u64) -> Self {
        Self { value, version }
    }

    /// Serialize to the engine storage format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        encode(&self.value, self.version)
    }
}

/// Serialize `value` and `version` into an envelope. Deterministic: the same
/// inputs always produce the same bytes.
#[must_use]
pub fn encode(value: &[u8], version: u64) -> Vec<u8> {
    serde_json::json!({
        "Value": STANDARD.encode(value),
        "Version": version,
    })
    .to_string()
    .into_bytes()
}

/// Parse an envelope read from `key`.
///
/// # Errors
///
/// Returns [`StoreError::CorruptEnvelope`] if `bytes` is not a versioned
/// envelope.
pub fn decode(key: &str, bytes: &[u8]) -> Result<Envelope, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| {
        error!(key = %key, error = %e, "stored value is not a versioned envelope");
        StoreError::CorruptEnvelope {
            key: key.to_owned(),
            reason: e.to_string(),
        }
    })
}

/// Go encodes a nil byte slice as `null`.
fn base64_or_null<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded: Option<String> = Option::deserialize(deserializer)?;
    match encoded {
        None => Ok(Vec::new()),
        Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
    }
}

/// Hands out version stamps for new envelopes.
///
/// Stamps are nanoseconds since the Unix epoch, forced strictly increasing
/// per clock so rapid writes through one store never reuse a stamp.
#[derive(Debug, Default)]
pub struct VersionClock {
    last: AtomicU64,
}

impl VersionClock {
    /// Create a clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a stamp different from every stamp this clock returned before.
    pub fn next(&self) -> u64 {
        let now = now_nanos();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev.saturating_add(1));
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
