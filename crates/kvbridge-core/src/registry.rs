//! Obtain a store by backend name.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use kvbridge_engine::MemoryEngine;
use tracing::info;

use crate::adapter::EngineStore;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::Store;

/// Supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// A single Redis server.
    Redis,
    /// In-memory (development only, data lost on exit).
    Memory,
}

impl Backend {
    /// The name this backend is registered under.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(StoreError::InvalidConfig {
                reason: format!("unknown backend '{other}', expected redis or memory"),
            }),
        }
    }
}

/// Build a store for `backend`.
///
/// The memory backend ignores `endpoints` and `config`.
///
/// # Errors
///
/// Returns whatever the backend's constructor returns, or
/// [`StoreError::InvalidConfig`] if the backend was compiled out.
pub async fn new_store(
    backend: Backend,
    endpoints: &[String],
    config: Option<&StoreConfig>,
) -> Result<Arc<dyn Store>, StoreError> {
    match backend {
        Backend::Memory => {
            info!("using in-memory store (data will not persist)");
            Ok(Arc::new(EngineStore::new(MemoryEngine::new())))
        }
        #[cfg(feature = "redis-backend")]
        Backend::Redis => Ok(Arc::new(crate::redis::RedisStore::connect(endpoints, config).await?)),
        #[cfg(not(feature = "redis-backend"))]
        Backend::Redis => {
            let _ = (endpoints, config);
            Err(StoreError::InvalidConfig {
                reason: "redis backend requested but feature 'redis-backend' is not enabled"
                    .to_owned(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("redis".parse::<Backend>().unwrap(), Backend::Redis);
        assert_eq!("Memory".parse::<Backend>().unwrap(), Backend::Memory);
        assert!(matches!(
            "etcd".parse::<Backend>(),
            Err(StoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for backend in [Backend::Redis, Backend::Memory] {
            assert_eq!(backend.to_string().parse::<Backend>().unwrap(), backend);
        }
    }

    #[tokio::test]
    async fn memory_backend_is_usable() {
        let store = new_store(Backend::Memory, &[], None).await.unwrap();
        store.put("k", b"v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().value, b"v");
    }

    #[cfg(feature = "redis-backend")]
    #[tokio::test]
    async fn redis_backend_validates_before_connecting() {
        let endpoints = vec!["a:1".to_owned(), "b:2".to_owned()];
        let result = new_store(Backend::Redis, &endpoints, None).await;
        assert!(matches!(result, Err(StoreError::Unsupported(_))));
    }
}
