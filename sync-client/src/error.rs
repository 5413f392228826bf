//! Error types for sync-client.

use thiserror::Error;
use watchlink_sync_core::{DegradedReason, DiscoveryError, Fault};
use watchlink_sync_types::{TransportId, WireError};

/// Connectivity errors.
///
/// Everything except [`LinkError::DiscoveryFailed`] after an explicit
/// discovery request is captured locally (logged, kept as a transport's last
/// error) and never returned to broadcast or receive callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// SDK absent at build time or session never activated.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(TransportId),

    /// Device known but not currently reachable.
    #[error("device not reachable")]
    DeviceNotReachable,

    /// App-level messaging not established.
    #[error("app not registered: {0}")]
    AppNotRegistered(String),

    /// The SDK rejected a send.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A message could not be encoded or decoded.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    /// No candidates, or the selection UI could not be opened.
    #[error("discovery failed: {0}")]
    DiscoveryFailed(String),

    /// Malformed persisted or manually entered device identifier.
    #[error("invalid device identity: {0}")]
    InvalidDeviceIdentity(String),
}

impl From<WireError> for LinkError {
    fn from(e: WireError) -> Self {
        LinkError::EncodingFailed(e.to_string())
    }
}

impl From<DiscoveryError> for LinkError {
    fn from(e: DiscoveryError) -> Self {
        LinkError::DiscoveryFailed(e.to_string())
    }
}

impl From<Fault> for LinkError {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::DiscoveryFailed(msg) => LinkError::DiscoveryFailed(msg),
            Fault::DeviceNotReachable => LinkError::DeviceNotReachable,
            Fault::AppNotRegistered(msg) => LinkError::AppNotRegistered(msg),
            Fault::Degraded(DegradedReason::BluetoothNotReady) => LinkError::DeviceNotReachable,
            Fault::Degraded(reason) => LinkError::InvalidDeviceIdentity(reason.to_string()),
        }
    }
}
