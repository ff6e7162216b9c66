//! Construction-time store configuration.

use std::path::PathBuf;

/// Options accepted when constructing a store.
#[derive(Clone, Default)]
pub struct StoreConfig {
    /// Transport security. The Redis backend rejects any value here.
    pub tls: Option<TlsConfig>,
    /// Password for engines that require authentication.
    pub password: Option<String>,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("tls", &self.tls)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Client certificate material for TLS connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// CA bundle used to verify the server.
    pub ca_cert_file: Option<PathBuf>,
    /// Client certificate.
    pub cert_file: Option<PathBuf>,
    /// Client private key.
    pub key_file: Option<PathBuf>,
}
