//! Error types for `kvbridge-core`.
//!
//! Engine and transport failures pass through unchanged; only the store's
//! own outcomes (missing keys, failed preconditions, unsupported features)
//! get dedicated variants.

use kvbridge_engine::EngineError;

/// Features this store refuses at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Unsupported {
    /// More than one endpoint was supplied.
    #[error("redis does not support multiple endpoints")]
    MultipleEndpoints,

    /// A transport-security configuration was supplied.
    #[error("redis does not support tls")]
    Tls,
}

/// Errors surfaced by the store contract.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No value exists for the key, or no key matched the directory.
    #[error("key not found in store")]
    KeyNotFound,

    /// The optimistic-concurrency precondition failed.
    #[error("unable to complete atomic operation, key modified")]
    KeyModified,

    /// The requested configuration is not supported by this backend.
    #[error(transparent)]
    Unsupported(#[from] Unsupported),

    /// The capability exists on the contract but this backend does not
    /// provide it.
    #[error("redis driver does not support this function yet")]
    NotImplemented,

    /// The construction parameters are unusable.
    #[error("invalid store configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A stored value is not a versioned envelope. The keyspace holds data
    /// this store did not write; this is not recoverable by retrying.
    #[error("corrupt envelope at key '{key}': {reason}")]
    CorruptEnvelope { key: String, reason: String },

    /// The engine or its transport failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl StoreError {
    /// Whether this error reports a missing key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound)
    }
}
