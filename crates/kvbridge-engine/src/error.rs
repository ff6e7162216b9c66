//! Engine error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger.

use std::time::Duration;

/// Errors that can occur while talking to an engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Failed to connect to the engine endpoint.
    #[error("failed to connect to '{endpoint}': {reason}")]
    Connect { endpoint: String, reason: String },

    /// The engine rejected or failed a command.
    #[error("engine command {command} failed: {reason}")]
    Command { command: &'static str, reason: String },

    /// A command did not complete within the configured timeout.
    #[error("engine command {command} timed out after {after:?}")]
    Timeout { command: &'static str, after: Duration },

    /// The engine connection has been closed.
    #[error("engine connection is closed")]
    Closed,
}
