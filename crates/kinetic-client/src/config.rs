//! Session configuration.
//!
//! All configuration is passed structurally at session create; there is no
//! environment or file-based configuration at this level. The HMAC secret is
//! copied into the config and owned by it for the session's whole life.

use std::time::Duration;

use bytes::Bytes;

use crate::error::{KineticError, Result};

/// Default per-operation timeout.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one session with one drive.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Drive hostname or address.
    pub host: String,

    /// Drive port.
    pub port: u16,

    /// Whether the transport is TLS. Gates admin operations; the engine does
    /// not perform the handshake itself (the connector supplies the stream).
    pub use_ssl: bool,

    /// Identity the HMAC secret belongs to.
    pub identity: i64,

    /// Shared HMAC secret, owned by this config.
    pub hmac_key: Bytes,

    /// Cluster version fencing token stamped into every command.
    pub cluster_version: i64,

    /// Default deadline for operations without an explicit timeout.
    pub operation_timeout: Duration,
}

impl SessionConfig {
    /// Configuration with defaults: plain transport, cluster version 0,
    /// 10-second operation timeout.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        identity: i64,
        hmac_key: impl Into<Bytes>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            use_ssl: false,
            identity,
            hmac_key: hmac_key.into(),
            cluster_version: 0,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Reject configurations that cannot possibly talk to a drive.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.host.is_empty() || self.hmac_key.is_empty() {
            return Err(KineticError::SessionEmpty);
        }
        Ok(())
    }
}
