//! CLI configuration.
//!
//! Every setting comes from a flag with a `KVBRIDGE_*` environment
//! fallback; see [`GlobalArgs`].

use clap::Args;
use kvbridge_core::{Backend, StoreConfig};

/// Connection and logging settings shared by every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Store backend: `redis` or `memory` (memory does not persist between runs).
    #[arg(long, env = "KVBRIDGE_BACKEND", default_value = "redis", global = true)]
    pub backend: String,

    /// Engine endpoint, `host:port` or `redis://` URL. Only one is supported.
    #[arg(
        long,
        env = "KVBRIDGE_ENDPOINT",
        default_value = "127.0.0.1:6379",
        value_delimiter = ',',
        global = true
    )]
    pub endpoint: Vec<String>,

    /// Engine password.
    #[arg(long, env = "KVBRIDGE_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Log filter (e.g. `warn`, `debug`, `kvbridge_core=trace`). `RUST_LOG` wins when set.
    #[arg(long, env = "KVBRIDGE_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long, env = "KVBRIDGE_LOG_JSON", default_value = "false", global = true)]
    pub json_logs: bool,
}

impl GlobalArgs {
    /// Parse the backend name.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown backend name.
    pub fn backend(&self) -> anyhow::Result<Backend> {
        Ok(self.backend.parse()?)
    }

    /// Build the store configuration. TLS is never requested from the CLI.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            tls: None,
            password: self.password.clone(),
        }
    }
}

/// Install the global `tracing` subscriber, writing to stderr.
pub fn init_logging(args: &GlobalArgs) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}
