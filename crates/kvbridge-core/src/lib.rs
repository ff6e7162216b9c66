//! Core library for kvbridge.
//!
//! Exposes a primitive key-value engine (set, get, delete,
//! set-if-not-exists, exists, scan, multi-get) through the [`Store`]
//! contract: versioned reads, compare-and-swap, and directory listing and
//! deletion over a flat keyspace.
//!
//! - [`codec`] wraps every stored value in a versioned envelope.
//! - [`key`] maps hierarchical keys to flat engine keys and prefix patterns.
//! - [`scan`] aggregates cursor scans and batched reads.
//! - [`cas`] emulates compare-and-swap from non-atomic read-then-write
//!   sequences (best effort; see the module docs for the race window).
//! - [`EngineStore`] ties them together for any [`Engine`](kvbridge_engine::Engine).

mod adapter;
pub mod cas;
pub mod codec;
mod config;
mod error;
pub mod key;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod registry;
pub mod scan;
mod store;

pub use adapter::EngineStore;
pub use config::{StoreConfig, TlsConfig};
pub use error::{StoreError, Unsupported};
#[cfg(feature = "redis-backend")]
pub use redis::RedisStore;
pub use registry::{Backend, new_store};
pub use store::{
    KeyWatch, KvPair, LockOptions, Locker, StopSignal, Store, TreeWatch, WriteOptions,
};
