//! Reconnection supervisor for the vendor transport.
//!
//! On launch the supervisor tries the persisted device first and only opens
//! the interactive picker when that is not possible:
//!
//! ```text
//! load identity ──none/corrupt──────────────────────────► open picker
//!      │
//!      ▼
//! query status ──Connected──────────────────────────────► fast path
//!      │       ──NotConnected───────────────────────────► not reachable (wait)
//!      │       ──BluetoothNotReady──────────────────────► degraded (wait)
//!      │       ──NotFound / InvalidDevice──► reset ─────► open picker
//!      │       ──no answer in time──────────────────────► awaiting status
//! ```
//!
//! The picker answers later through a callback URL, handed to
//! [`ReconnectionSupervisor::handle_discovery_callback`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use watchlink_sync_core::{ConnectionState, DegradedReason, Event};
use watchlink_sync_types::{DeviceIdentity, TransportId};

use crate::config::LinkConfig;
use crate::link::VendorLink;
use crate::store::DevicePersistenceStore;
use crate::transport::VendorSdk;
use crate::LinkError;

/// Why the picker was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryReason {
    /// Nothing persisted.
    NoPersistedDevice,
    /// The persisted record was unreadable and has been cleared.
    InvalidPersistedDevice,
    /// The SDK no longer knows the persisted device.
    DeviceNotFound,
    /// The SDK rejected the persisted device.
    InvalidDevice,
}

impl fmt::Display for DiscoveryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiscoveryReason::NoPersistedDevice => "no persisted device",
            DiscoveryReason::InvalidPersistedDevice => "persisted device unreadable",
            DiscoveryReason::DeviceNotFound => "device not found",
            DiscoveryReason::InvalidDevice => "invalid device",
        };
        f.write_str(s)
    }
}

/// Result of [`ReconnectionSupervisor::try_reconnect_from_persisted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// The persisted device is connected; app registration follows on its own.
    FastPath(DeviceIdentity),
    /// No status arrived in time. The link keeps waiting for one.
    AwaitingStatus(DeviceIdentity),
    /// The device is known but out of range.
    NotReachable(DeviceIdentity),
    /// Bluetooth is off. Cleared by a reset once it is back.
    Degraded(DegradedReason),
    /// The picker was opened.
    DiscoveryOpened {
        /// Why the fast path was not possible.
        reason: DiscoveryReason,
    },
}

/// Drives discovery and reconnection for one vendor link.
pub struct ReconnectionSupervisor {
    link: VendorLink,
    store: Arc<dyn DevicePersistenceStore>,
    sdk: Arc<dyn VendorSdk>,
    callback_scheme: String,
    status_timeout: Duration,
}

impl ReconnectionSupervisor {
    /// Create a supervisor.
    pub fn new(
        link: VendorLink,
        store: Arc<dyn DevicePersistenceStore>,
        sdk: Arc<dyn VendorSdk>,
        callback_scheme: impl Into<String>,
        status_timeout: Duration,
    ) -> Self {
        Self {
            link,
            store,
            sdk,
            callback_scheme: callback_scheme.into(),
            status_timeout,
        }
    }

    /// Create a supervisor using the scheme and timeout from `config`.
    pub fn from_config(
        link: VendorLink,
        store: Arc<dyn DevicePersistenceStore>,
        sdk: Arc<dyn VendorSdk>,
        config: &LinkConfig,
    ) -> Self {
        Self::new(
            link,
            store,
            sdk,
            config.link.callback_scheme.clone(),
            config.status_timeout(),
        )
    }

    /// The supervised link.
    pub fn link(&self) -> &VendorLink {
        &self.link
    }

    /// Reconnect to the persisted device, opening the picker only when needed.
    pub async fn try_reconnect_from_persisted(&self) -> Result<ReconnectOutcome, LinkError> {
        let identity = match self.store.load().await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                info!(transport = "vendor", "no persisted device");
                return self.open_picker(DiscoveryReason::NoPersistedDevice).await;
            }
            Err(e) => {
                warn!(transport = "vendor", error = %e, "persisted device unreadable, clearing");
                if let Err(e) = self.store.clear().await {
                    warn!(transport = "vendor", error = %e, "could not clear device store");
                }
                return self.open_picker(DiscoveryReason::InvalidPersistedDevice).await;
            }
        };

        self.reset_if_degraded().await?;
        info!(transport = "vendor", device = ?identity.uuid, name = %identity.friendly_name, "reconnecting to persisted device");

        let mut snapshots = self.link.subscribe();
        self.link
            .apply(Event::ReconnectRequested {
                identity: identity.clone(),
            })
            .await?;

        // The watch guard must not live across the awaits below
        let settled = tokio::time::timeout(self.status_timeout, async {
            snapshots
                .wait_for(|s| s.state != ConnectionState::Discovering)
                .await
                .map(|snapshot| snapshot.state)
        })
        .await;

        let state = match settled {
            Ok(Ok(state)) => state,
            Ok(Err(_)) => return Err(LinkError::TransportUnavailable(TransportId::Vendor)),
            Err(_) => {
                info!(transport = "vendor", timeout_ms = self.status_timeout.as_millis() as u64, "no device status yet");
                return Ok(ReconnectOutcome::AwaitingStatus(identity));
            }
        };

        match state {
            ConnectionState::Connected | ConnectionState::AppRegistered => {
                Ok(ReconnectOutcome::FastPath(identity))
            }
            ConnectionState::Disconnected => Ok(ReconnectOutcome::NotReachable(identity)),
            ConnectionState::Discovering => Ok(ReconnectOutcome::AwaitingStatus(identity)),
            ConnectionState::Degraded { reason } => match reason {
                DegradedReason::BluetoothNotReady => Ok(ReconnectOutcome::Degraded(reason)),
                DegradedReason::DeviceNotFound => {
                    self.link.apply(Event::Reset).await?;
                    self.open_picker(DiscoveryReason::DeviceNotFound).await
                }
                DegradedReason::InvalidDevice => {
                    self.link.apply(Event::Reset).await?;
                    self.open_picker(DiscoveryReason::InvalidDevice).await
                }
            },
        }
    }

    /// Open the interactive device picker.
    ///
    /// The selection arrives later through
    /// [`handle_discovery_callback`](Self::handle_discovery_callback).
    pub async fn trigger_discovery(&self) -> Result<(), LinkError> {
        self.reset_if_degraded().await?;
        info!(transport = "vendor", "opening device selection");
        self.link.apply(Event::DiscoveryRequested).await
    }

    /// Accept the deferred picker result.
    ///
    /// The first candidate becomes the current device and is persisted;
    /// status events are watched for all of them. An empty or malformed
    /// result is [`LinkError::DiscoveryFailed`].
    pub async fn handle_discovery_callback(&self, url: &str) -> Result<Vec<DeviceIdentity>, LinkError> {
        self.reset_if_degraded().await?;

        let devices = match self.sdk.parse_device_selection(url, &self.callback_scheme) {
            Ok(devices) => devices,
            Err(e) => {
                warn!(transport = "vendor", error = %e, "rejecting device selection callback");
                // Leave Discovering; the empty-selection fault is superseded
                let _ = self.link.apply(Event::DevicesSelected { devices: Vec::new() }).await;
                return Err(e.into());
            }
        };

        info!(transport = "vendor", candidates = devices.len(), "device selection received");
        self.link
            .apply(Event::DevicesSelected {
                devices: devices.clone(),
            })
            .await?;
        Ok(devices)
    }

    /// Re-query the current device.
    pub async fn poll_status(&self) -> Result<(), LinkError> {
        self.link.apply(Event::PollStatus).await
    }

    /// Return the link to Disconnected, leaving any degraded state.
    pub async fn reset(&self) -> Result<(), LinkError> {
        self.link.apply(Event::Reset).await
    }

    /// Unpair: drop registrations and clear the persisted identity.
    pub async fn forget_device(&self) -> Result<(), LinkError> {
        info!(transport = "vendor", "forgetting device");
        self.link.apply(Event::Forget).await
    }

    /// Drop every registration at the end of a workout session.
    pub async fn end_session(&self) -> Result<(), LinkError> {
        self.link.apply(Event::SessionEnded).await
    }

    async fn reset_if_degraded(&self) -> Result<(), LinkError> {
        if let ConnectionState::Degraded { reason } = self.link.snapshot().state {
            info!(transport = "vendor", %reason, "resetting degraded link");
            self.link.apply(Event::Reset).await?;
        }
        Ok(())
    }

    async fn open_picker(&self, reason: DiscoveryReason) -> Result<ReconnectOutcome, LinkError> {
        info!(transport = "vendor", %reason, "escalating to device selection");
        self.link.apply(Event::DiscoveryRequested).await?;
        Ok(ReconnectOutcome::DiscoveryOpened { reason })
    }
}
