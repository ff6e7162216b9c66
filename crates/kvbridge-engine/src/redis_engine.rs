//! Redis engine — a single plaintext Redis endpoint.
//!
//! Holds one multiplexed async connection. Each command clones the
//! connection handle (cheap) and is bounded by the configured timeout via
//! [`tokio::time::timeout`]. No pooling, retries or clustering happen here.

use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{FromRedisValue, IntoConnectionInfo};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{Engine, EngineError, ScanPage, ttl_millis};

/// Connection settings for [`RedisEngine`].
#[derive(Clone)]
pub struct RedisOptions {
    /// Bound on establishing the connection.
    pub connect_timeout: Duration,
    /// Bound on receiving a command's reply.
    pub read_timeout: Duration,
    /// Bound on sending a command.
    pub write_timeout: Duration,
    /// Optional `AUTH` password.
    pub password: Option<String>,
}

impl RedisOptions {
    /// The multiplexed connection does not expose the send and receive
    /// phases separately, so a whole command is bounded by the larger of the
    /// two timeouts.
    fn command_timeout(&self) -> Duration {
        self.read_timeout.max(self.write_timeout)
    }
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            password: None,
        }
    }
}

impl std::fmt::Debug for RedisOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisOptions")
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// An engine backed by a single Redis server.
///
/// Safe to share across async tasks; all tasks multiplex over the one
/// connection.
///
/// # Examples
///
/// ```no_run
/// # use kvbridge_engine::{RedisEngine, RedisOptions};
/// # #[tokio::main]
/// # async fn main() {
/// let engine = RedisEngine::connect("127.0.0.1:6379", RedisOptions::default())
///     .await
///     .unwrap();
/// # }
/// ```
pub struct RedisEngine {
    conn: RwLock<Option<MultiplexedConnection>>,
    endpoint: String,
    options: RedisOptions,
}

impl std::fmt::Debug for RedisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEngine")
            .field("endpoint", &self.endpoint)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RedisEngine {
    /// Connect to a Redis endpoint.
    ///
    /// `endpoint` is either `host:port` or a full `redis://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Connect`] if the endpoint is invalid or the
    /// connection cannot be established, and [`EngineError::Timeout`] if it
    /// takes longer than `options.connect_timeout`.
    pub async fn connect(endpoint: &str, options: RedisOptions) -> Result<Self, EngineError> {
        let url = if endpoint.contains("://") {
            endpoint.to_owned()
        } else {
            format!("redis://{endpoint}/")
        };

        let mut info = url
            .as_str()
            .into_connection_info()
            .map_err(|e| EngineError::Connect {
                endpoint: endpoint.to_owned(),
                reason: e.to_string(),
            })?;
        if let Some(password) = &options.password {
            info.redis.password = Some(password.clone());
        }

        let client = redis::Client::open(info).map_err(|e| EngineError::Connect {
            endpoint: endpoint.to_owned(),
            reason: e.to_string(),
        })?;

        let conn = tokio::time::timeout(
            options.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| EngineError::Timeout {
            command: "CONNECT",
            after: options.connect_timeout,
        })?
        .map_err(|e| EngineError::Connect {
            endpoint: endpoint.to_owned(),
            reason: e.to_string(),
        })?;

        info!(endpoint = %endpoint, "connected to redis");

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            endpoint: endpoint.to_owned(),
            options,
        })
    }

    /// Return the endpoint this engine is connected to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query<T: FromRedisValue>(
        &self,
        command: &'static str,
        cmd: &redis::Cmd,
    ) -> Result<T, EngineError> {
        let mut conn = self.conn.read().await.clone().ok_or(EngineError::Closed)?;
        let after = self.options.command_timeout();

        debug!(command, "redis command");
        let reply: Result<T, redis::RedisError> =
            tokio::time::timeout(after, cmd.query_async(&mut conn))
                .await
                .map_err(|_| EngineError::Timeout { command, after })?;

        reply.map_err(|e| EngineError::Command {
            command,
            reason: e.to_string(),
        })
    }
}

fn with_ttl(cmd: &mut redis::Cmd, ttl: Option<Duration>) {
    if let Some(millis) = ttl_millis(ttl) {
        cmd.arg("PX").arg(millis);
    }
}

#[async_trait::async_trait]
impl Engine for RedisEngine {
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), EngineError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        with_ttl(&mut cmd, ttl);
        let _: redis::Value = self.query("SET", &cmd).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.query("GET", &cmd).await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, EngineError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("DEL");
        cmd.arg(keys);
        self.query("DEL", &cmd).await
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, EngineError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        with_ttl(&mut cmd, ttl);
        let reply: redis::Value = self.query("SET NX", &cmd).await?;
        Ok(!matches!(reply, redis::Value::Nil))
    }

    async fn exists(&self, key: &str) -> Result<bool, EngineError> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        let count: u64 = self.query("EXISTS", &cmd).await?;
        Ok(count > 0)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<ScanPage, EngineError> {
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count);
        let (cursor, keys): (u64, Vec<String>) = self.query("SCAN", &cmd).await?;
        Ok(ScanPage { cursor, keys })
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, EngineError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut cmd = redis::cmd("MGET");
        cmd.arg(keys);
        self.query("MGET", &cmd).await
    }

    async fn close(&self) {
        if self.conn.write().await.take().is_some() {
            info!(endpoint = %self.endpoint, "redis connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_use_fixed_timeouts() {
        let opts = RedisOptions::default();
        assert_eq!(opts.connect_timeout, Duration::from_secs(5));
        assert_eq!(opts.read_timeout, Duration::from_secs(30));
        assert_eq!(opts.write_timeout, Duration::from_secs(30));
        assert_eq!(opts.command_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn debug_redacts_password() {
        let opts = RedisOptions {
            password: Some("hunter2".to_owned()),
            ..RedisOptions::default()
        };
        let rendered = format!("{opts:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[redacted]"));
    }

    #[tokio::test]
    async fn invalid_endpoint_is_a_connect_error() {
        let result = RedisEngine::connect("not a url://", RedisOptions::default()).await;
        assert!(matches!(result, Err(EngineError::Connect { .. })));
    }
}
