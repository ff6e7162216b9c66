//! The Redis-backed store.
//!
//! A single plaintext endpoint; clustering and TLS are refused up front
//! rather than half-supported.

use kvbridge_engine::{RedisEngine, RedisOptions};
use tracing::info;

use crate::adapter::EngineStore;
use crate::config::StoreConfig;
use crate::error::{StoreError, Unsupported};

/// A [`Store`](crate::Store) backed by one Redis server.
pub type RedisStore = EngineStore<RedisEngine>;

/// Check the construction parameters and return the single endpoint.
///
/// # Errors
///
/// - [`StoreError::InvalidConfig`] if no endpoint is given.
/// - [`StoreError::Unsupported`] for multiple endpoints or a TLS config.
pub fn validate<'a>(
    endpoints: &'a [String],
    config: Option<&StoreConfig>,
) -> Result<&'a str, StoreError> {
    let endpoint = match endpoints {
        [] => {
            return Err(StoreError::InvalidConfig {
                reason: "no endpoint given".to_owned(),
            });
        }
        [one] => one.as_str(),
        _ => return Err(Unsupported::MultipleEndpoints.into()),
    };
    if config.is_some_and(|c| c.tls.is_some()) {
        return Err(Unsupported::Tls.into());
    }
    Ok(endpoint)
}

impl EngineStore<RedisEngine> {
    /// Connect to the single Redis endpoint in `endpoints`.
    ///
    /// Timeouts are fixed: connect 5s, read 30s, write 30s.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidConfig`] if no endpoint is given.
    /// - [`StoreError::Unsupported`] for multiple endpoints or a TLS config.
    /// - [`StoreError::Engine`] if the connection fails.
    pub async fn connect(
        endpoints: &[String],
        config: Option<&StoreConfig>,
    ) -> Result<Self, StoreError> {
        let endpoint = validate(endpoints, config)?;
        let options = RedisOptions {
            password: config.and_then(|c| c.password.clone()),
            ..RedisOptions::default()
        };
        let engine = RedisEngine::connect(endpoint, options).await?;
        info!(endpoint = %endpoint, "redis store ready");
        Ok(Self::new(engine))
    }
}
