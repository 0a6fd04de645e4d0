//! Management-protocol client abstraction
//!
//! The engine never speaks the device wire protocol itself. It drives an
//! opaque client that executes command paths against a managed device and
//! returns key/value records, the shape shared by the supported vendors'
//! management APIs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::Device;

/// Failure modes of a device client call
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// One key/value record returned by a device command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRecord(BTreeMap<String, String>);

impl CommandRecord {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    /// Counter fields arrive as decimal strings; anything unparsable reads 0.
    pub fn get_u64(&self, key: &str) -> u64 {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }

    /// Flag fields arrive as "true"/"false" or "yes"/"no".
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("true") | Some("yes")
        )
    }
}

/// Client for one managed device's management API
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Establish the management session. Must be called before commands.
    async fn connect(&self, timeout: Duration) -> Result<(), ClientError>;

    /// Execute a command path (e.g. `/interface`) and return its records.
    async fn execute_command(
        &self,
        path: &str,
        args: &[(&str, &str)],
    ) -> Result<Vec<CommandRecord>, ClientError>;

    /// Tear down the session. Safe to call on a failed session.
    async fn disconnect(&self);
}

/// Produces a client for a managed device; the seam tests use to inject
/// scripted clients.
pub trait DeviceClientFactory: Send + Sync {
    fn client_for(&self, device: &Device) -> Arc<dyn DeviceClient>;
}
