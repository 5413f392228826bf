//! Device connection state machine for the vendor transport.
//!
//! This module provides a pure, side-effect-free state machine that turns
//! asynchronous, vendor-specific status callbacks into a small generic state
//! set. The state machine takes events as input and produces a new state plus
//! a list of actions to execute.
//!
//! The actual I/O (SDK calls, persistence) is performed by sync-client, which
//! feeds every event for one transport through a single serialized context.
//!
//! ```text
//! Disconnected ──► Discovering ──► Connected ──► AppRegistered
//!       ▲                                             │
//!       └──────────── (any) ── Degraded ◄─────────────┘
//!                       Reset ▲
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use watchlink_sync_types::{DeviceIdentity, DeviceUuid};

/// Device status codes reported by the vendor SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStatus {
    /// Device is paired and in range.
    Connected,
    /// Device is known but currently out of range.
    NotConnected,
    /// The SDK has no record of this device.
    NotFound,
    /// Bluetooth is off or not yet powered up.
    BluetoothNotReady,
    /// The identifier does not describe a usable device.
    InvalidDevice,
}

/// Companion app status codes reported by the vendor SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppStatus {
    /// The companion app is installed on the device.
    Installed,
    /// The SDK confirmed the app is absent.
    NotInstalled,
    /// The SDK could not tell; known to be unreliable.
    Unknown,
}

/// Why a transport entered the degraded side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegradedReason {
    /// Bluetooth unavailable.
    BluetoothNotReady,
    /// Device unknown to the SDK.
    DeviceNotFound,
    /// Device identifier rejected by the SDK.
    InvalidDevice,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::BluetoothNotReady => write!(f, "bluetooth not ready"),
            DegradedReason::DeviceNotFound => write!(f, "device not found"),
            DegradedReason::InvalidDevice => write!(f, "invalid device"),
        }
    }
}

/// Generic connection state - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No device link.
    Disconnected,
    /// Waiting for a device selection or for the first status of a known device.
    Discovering,
    /// Device present; app-level messaging not yet established.
    Connected,
    /// App-level message channel established; eligible to send.
    AppRegistered,
    /// Bluetooth unready, device not found or invalid. Left only via reset.
    Degraded {
        /// What went wrong.
        reason: DegradedReason,
    },
}

/// Read-only connection status exposed to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No device link.
    Disconnected,
    /// Looking for a device.
    Discovering,
    /// Device present, not usable for app messages yet.
    Connected,
    /// Fully usable.
    Registered,
    /// Degraded; needs an explicit reset.
    Degraded,
    /// Transport SDK absent or never activated.
    Unavailable,
}

impl ConnectionStatus {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Discovering => "discovering",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Registered => "registered",
            ConnectionStatus::Degraded => "degraded",
            ConnectionStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that drive the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Interactive device selection requested.
    DiscoveryRequested,
    /// Reconnect to a known device without the picker.
    ReconnectRequested {
        /// The persisted identity to reconnect to.
        identity: DeviceIdentity,
    },
    /// The deferred device selection result arrived.
    DevicesSelected {
        /// Candidates in the order the SDK returned them.
        devices: Vec<DeviceIdentity>,
    },
    /// Device status notification from the SDK.
    DeviceStatusChanged {
        /// Device the status is about.
        device: DeviceUuid,
        /// Reported status.
        status: DeviceStatus,
    },
    /// App status notification from the SDK.
    AppStatusReported {
        /// Device the status is about.
        device: DeviceUuid,
        /// Reported status.
        status: AppStatus,
    },
    /// App-level message registration succeeded.
    RegistrationSucceeded {
        /// Registered device.
        device: DeviceUuid,
    },
    /// App-level message registration failed.
    RegistrationFailed {
        /// Device the registration was for.
        device: DeviceUuid,
        /// SDK error description.
        error: String,
    },
    /// Periodic status poll.
    PollStatus,
    /// Explicit reset back to Disconnected.
    Reset,
    /// Workout session ended; drop every registration.
    SessionEnded,
    /// Explicit unpair.
    Forget,
}

/// Failures surfaced by the state machine for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Device selection produced no candidates.
    DiscoveryFailed(String),
    /// Device known but out of range.
    DeviceNotReachable,
    /// App messaging unavailable (not installed or registration failed).
    AppNotRegistered(String),
    /// Device status put the link into the degraded state.
    Degraded(DegradedReason),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::DiscoveryFailed(msg) => write!(f, "discovery failed: {}", msg),
            Fault::DeviceNotReachable => write!(f, "device not reachable"),
            Fault::AppNotRegistered(msg) => write!(f, "app not registered: {}", msg),
            Fault::Degraded(reason) => write!(f, "degraded: {}", reason),
        }
    }
}

/// Actions to be executed by the sync-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Open the external device-selection UI.
    OpenDeviceSelection,
    /// Start receiving device events for a device.
    RegisterDeviceEvents {
        /// Target device.
        device: DeviceUuid,
    },
    /// Stop receiving device events for a device.
    UnregisterDeviceEvents {
        /// Target device.
        device: DeviceUuid,
    },
    /// Ask the SDK for the device status.
    QueryDeviceStatus {
        /// Target device.
        device: DeviceUuid,
    },
    /// Ask the SDK for the companion app status.
    QueryAppStatus {
        /// Target device.
        device: DeviceUuid,
    },
    /// Register for app-level messages.
    RegisterAppMessages {
        /// Target device.
        device: DeviceUuid,
    },
    /// Unregister from app-level messages.
    UnregisterAppMessages {
        /// Target device.
        device: DeviceUuid,
    },
    /// Overwrite the persisted device identity.
    PersistIdentity {
        /// Identity to store.
        identity: DeviceIdentity,
    },
    /// Delete the persisted device identity.
    ClearIdentity,
    /// Record a failure for diagnostics.
    ReportError(Fault),
}

/// Connection state machine for one vendor transport.
///
/// Owned by exactly one serialized context; every transition goes through
/// [`ConnectionMachine::on_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMachine {
    state: ConnectionState,
    current: Option<DeviceIdentity>,
    watched: Vec<DeviceUuid>,
    registration: Registration,
}

/// App-message registration bookkeeping, to avoid duplicate registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    None,
    Pending(DeviceUuid),
    Active(DeviceUuid),
}

impl ConnectionMachine {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            current: None,
            watched: Vec::new(),
            registration: Registration::None,
        }
    }

    /// Process an event and return the new machine plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(mut self, event: Event) -> (Self, Vec<Action>) {
        let mut actions = Vec::new();

        match event {
            Event::Reset => {
                self.release_all(&mut actions);
                self.state = ConnectionState::Disconnected;
            }
            Event::SessionEnded => {
                self.release_all(&mut actions);
                self.state = ConnectionState::Disconnected;
            }
            Event::Forget => {
                self.release_all(&mut actions);
                self.state = ConnectionState::Disconnected;
                actions.push(Action::ClearIdentity);
            }

            // Degraded is left only through the events above
            _ if self.is_degraded() => {}

            Event::DiscoveryRequested => {
                self.state = ConnectionState::Discovering;
                actions.push(Action::OpenDeviceSelection);
            }

            Event::ReconnectRequested { identity } => {
                let already_linked = self.current.as_ref().map(|c| c.uuid) == Some(identity.uuid)
                    && matches!(
                        self.state,
                        ConnectionState::Connected | ConnectionState::AppRegistered
                    );
                if already_linked {
                    actions.push(Action::QueryDeviceStatus {
                        device: identity.uuid,
                    });
                } else {
                    self.switch_current(identity.clone(), &mut actions);
                    self.watch(identity.uuid, &mut actions);
                    self.state = ConnectionState::Discovering;
                    actions.push(Action::QueryDeviceStatus {
                        device: identity.uuid,
                    });
                }
            }

            Event::DevicesSelected { devices } => match devices.first().cloned() {
                None => {
                    if self.state == ConnectionState::Discovering {
                        self.state = ConnectionState::Disconnected;
                    }
                    actions.push(Action::ReportError(Fault::DiscoveryFailed(
                        "no devices selected".into(),
                    )));
                }
                Some(first) => {
                    for device in &devices {
                        self.watch(device.uuid, &mut actions);
                    }
                    self.switch_current(first.clone(), &mut actions);
                    self.state = ConnectionState::Discovering;
                    actions.push(Action::PersistIdentity {
                        identity: first.clone(),
                    });
                    actions.push(Action::QueryDeviceStatus { device: first.uuid });
                }
            },

            Event::DeviceStatusChanged { device, status } => {
                if self.is_current(device) {
                    self.on_device_status(device, status, &mut actions);
                }
            }

            Event::AppStatusReported { device, status } => {
                if self.is_current(device) && self.state == ConnectionState::Connected {
                    match status {
                        // Unknown is non-authoritative: try registering anyway
                        AppStatus::Installed | AppStatus::Unknown => {
                            if self.registration == Registration::None {
                                self.registration = Registration::Pending(device);
                                actions.push(Action::RegisterAppMessages { device });
                            }
                        }
                        AppStatus::NotInstalled => {
                            actions.push(Action::ReportError(Fault::AppNotRegistered(
                                "companion app not installed".into(),
                            )));
                        }
                    }
                }
            }

            Event::RegistrationSucceeded { device } => {
                if self.registration == Registration::Pending(device)
                    && self.state == ConnectionState::Connected
                {
                    self.registration = Registration::Active(device);
                    self.state = ConnectionState::AppRegistered;
                    if let Some(identity) = self.current.clone() {
                        actions.push(Action::PersistIdentity { identity });
                    }
                }
            }

            Event::RegistrationFailed { device, error } => {
                if self.registration == Registration::Pending(device) {
                    self.registration = Registration::None;
                    actions.push(Action::ReportError(Fault::AppNotRegistered(error)));
                }
            }

            Event::PollStatus => {
                if let Some(current) = &self.current {
                    actions.push(Action::QueryDeviceStatus {
                        device: current.uuid,
                    });
                }
            }
        }

        (self, actions)
    }

    fn on_device_status(&mut self, device: DeviceUuid, status: DeviceStatus, actions: &mut Vec<Action>) {
        match status {
            DeviceStatus::Connected => {
                if matches!(
                    self.state,
                    ConnectionState::Disconnected | ConnectionState::Discovering
                ) {
                    self.state = ConnectionState::Connected;
                    actions.push(Action::QueryAppStatus { device });
                }
            }
            DeviceStatus::NotConnected => {
                if self.state != ConnectionState::Disconnected {
                    self.release_registration(actions);
                    self.state = ConnectionState::Disconnected;
                    actions.push(Action::ReportError(Fault::DeviceNotReachable));
                }
            }
            DeviceStatus::NotFound => self.degrade(DegradedReason::DeviceNotFound, actions),
            DeviceStatus::BluetoothNotReady => {
                self.degrade(DegradedReason::BluetoothNotReady, actions)
            }
            DeviceStatus::InvalidDevice => self.degrade(DegradedReason::InvalidDevice, actions),
        }
    }

    fn degrade(&mut self, reason: DegradedReason, actions: &mut Vec<Action>) {
        self.release_registration(actions);
        self.state = ConnectionState::Degraded { reason };
        actions.push(Action::ReportError(Fault::Degraded(reason)));
    }

    fn watch(&mut self, device: DeviceUuid, actions: &mut Vec<Action>) {
        if !self.watched.contains(&device) {
            self.watched.push(device);
            actions.push(Action::RegisterDeviceEvents { device });
        }
    }

    fn switch_current(&mut self, identity: DeviceIdentity, actions: &mut Vec<Action>) {
        let changed = self.current.as_ref().map(|c| c.uuid) != Some(identity.uuid);
        if changed {
            self.release_registration(actions);
        }
        self.current = Some(identity);
    }

    fn release_registration(&mut self, actions: &mut Vec<Action>) {
        match self.registration {
            Registration::Pending(device) | Registration::Active(device) => {
                actions.push(Action::UnregisterAppMessages { device });
            }
            Registration::None => {}
        }
        self.registration = Registration::None;
    }

    fn release_all(&mut self, actions: &mut Vec<Action>) {
        self.release_registration(actions);
        for device in self.watched.drain(..) {
            actions.push(Action::UnregisterDeviceEvents { device });
        }
        self.current = None;
    }

    fn is_current(&self, device: DeviceUuid) -> bool {
        self.current.as_ref().map(|c| c.uuid) == Some(device)
    }

    fn is_degraded(&self) -> bool {
        matches!(self.state, ConnectionState::Degraded { .. })
    }

    /// Current generic state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// UI-facing status projection.
    pub fn status(&self) -> ConnectionStatus {
        match self.state {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Discovering => ConnectionStatus::Discovering,
            ConnectionState::Connected => ConnectionStatus::Connected,
            ConnectionState::AppRegistered => ConnectionStatus::Registered,
            ConnectionState::Degraded { .. } => ConnectionStatus::Degraded,
        }
    }

    /// The device promoted to "current", if any.
    pub fn current_device(&self) -> Option<&DeviceIdentity> {
        self.current.as_ref()
    }

    /// Devices with registered event listeners.
    pub fn watched(&self) -> &[DeviceUuid] {
        &self.watched
    }

    /// Check if app-level messaging is usable.
    pub fn is_registered(&self) -> bool {
        self.state == ConnectionState::AppRegistered
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(name: &str) -> DeviceIdentity {
        DeviceIdentity::new(DeviceUuid::random(), "fenix 7", name)
    }

    /// Drive a machine to AppRegistered for the given device.
    fn registered(device: &DeviceIdentity) -> ConnectionMachine {
        let m = ConnectionMachine::new();
        let (m, _) = m.on_event(Event::ReconnectRequested {
            identity: device.clone(),
        });
        let (m, _) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::Connected,
        });
        let (m, _) = m.on_event(Event::AppStatusReported {
            device: device.uuid,
            status: AppStatus::Installed,
        });
        let (m, _) = m.on_event(Event::RegistrationSucceeded {
            device: device.uuid,
        });
        assert!(m.is_registered());
        m
    }

    #[test]
    fn starts_disconnected() {
        let m = ConnectionMachine::new();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.status(), ConnectionStatus::Disconnected);
        assert!(m.current_device().is_none());
    }

    #[test]
    fn discovery_request_opens_picker() {
        let (m, actions) = ConnectionMachine::new().on_event(Event::DiscoveryRequested);
        assert_eq!(m.state(), ConnectionState::Discovering);
        assert_eq!(actions, vec![Action::OpenDeviceSelection]);
    }

    #[test]
    fn reconnect_queries_status_without_picker() {
        let device = identity("Watch");
        let (m, actions) = ConnectionMachine::new().on_event(Event::ReconnectRequested {
            identity: device.clone(),
        });

        assert_eq!(m.state(), ConnectionState::Discovering);
        assert!(!actions.contains(&Action::OpenDeviceSelection));
        assert_eq!(
            actions,
            vec![
                Action::RegisterDeviceEvents {
                    device: device.uuid
                },
                Action::QueryDeviceStatus {
                    device: device.uuid
                },
            ]
        );
    }

    #[test]
    fn zero_candidates_is_discovery_failure() {
        let (m, _) = ConnectionMachine::new().on_event(Event::DiscoveryRequested);
        let (m, actions) = m.on_event(Event::DevicesSelected { devices: vec![] });

        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::ReportError(Fault::DiscoveryFailed(_)))));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, Action::PersistIdentity { .. })));
    }

    #[test]
    fn multiple_candidates_watch_all_promote_first() {
        let a = identity("A");
        let b = identity("B");
        let (m, _) = ConnectionMachine::new().on_event(Event::DiscoveryRequested);
        let (m, actions) = m.on_event(Event::DevicesSelected {
            devices: vec![a.clone(), b.clone()],
        });

        assert_eq!(m.current_device(), Some(&a));
        assert_eq!(m.watched(), &[a.uuid, b.uuid]);
        assert_eq!(
            actions,
            vec![
                Action::RegisterDeviceEvents { device: a.uuid },
                Action::RegisterDeviceEvents { device: b.uuid },
                Action::PersistIdentity {
                    identity: a.clone()
                },
                Action::QueryDeviceStatus { device: a.uuid },
            ]
        );
    }

    #[test]
    fn status_for_non_current_device_is_ignored() {
        let a = identity("A");
        let b = identity("B");
        let (m, _) = ConnectionMachine::new().on_event(Event::DevicesSelected {
            devices: vec![a, b.clone()],
        });
        let (m, actions) = m.on_event(Event::DeviceStatusChanged {
            device: b.uuid,
            status: DeviceStatus::Connected,
        });

        assert_eq!(m.state(), ConnectionState::Discovering);
        assert!(actions.is_empty());
    }

    #[test]
    fn connected_status_queries_app_status() {
        let device = identity("Watch");
        let (m, _) = ConnectionMachine::new().on_event(Event::ReconnectRequested {
            identity: device.clone(),
        });
        let (m, actions) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::Connected,
        });

        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(m.status(), ConnectionStatus::Connected);
        assert_eq!(
            actions,
            vec![Action::QueryAppStatus {
                device: device.uuid
            }]
        );
    }

    #[test]
    fn connected_is_not_registered_until_registration_succeeds() {
        let device = identity("Watch");
        let (m, _) = ConnectionMachine::new().on_event(Event::ReconnectRequested {
            identity: device.clone(),
        });
        let (m, _) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::Connected,
        });
        let (m, actions) = m.on_event(Event::AppStatusReported {
            device: device.uuid,
            status: AppStatus::Installed,
        });

        assert!(!m.is_registered());
        assert_eq!(
            actions,
            vec![Action::RegisterAppMessages {
                device: device.uuid
            }]
        );

        let (m, actions) = m.on_event(Event::RegistrationSucceeded {
            device: device.uuid,
        });
        assert_eq!(m.state(), ConnectionState::AppRegistered);
        assert_eq!(m.status(), ConnectionStatus::Registered);
        assert_eq!(actions, vec![Action::PersistIdentity { identity: device }]);
    }

    #[test]
    fn unknown_app_status_registers_optimistically() {
        let device = identity("Watch");
        let (m, _) = ConnectionMachine::new().on_event(Event::ReconnectRequested {
            identity: device.clone(),
        });
        let (m, _) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::Connected,
        });
        let (_, actions) = m.on_event(Event::AppStatusReported {
            device: device.uuid,
            status: AppStatus::Unknown,
        });

        assert_eq!(
            actions,
            vec![Action::RegisterAppMessages {
                device: device.uuid
            }]
        );
    }

    #[test]
    fn not_installed_is_authoritative() {
        let device = identity("Watch");
        let (m, _) = ConnectionMachine::new().on_event(Event::ReconnectRequested {
            identity: device.clone(),
        });
        let (m, _) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::Connected,
        });
        let (m, actions) = m.on_event(Event::AppStatusReported {
            device: device.uuid,
            status: AppStatus::NotInstalled,
        });

        assert_eq!(m.state(), ConnectionState::Connected);
        assert!(matches!(
            actions.as_slice(),
            [Action::ReportError(Fault::AppNotRegistered(_))]
        ));
    }

    #[test]
    fn duplicate_app_status_does_not_double_register() {
        let device = identity("Watch");
        let (m, _) = ConnectionMachine::new().on_event(Event::ReconnectRequested {
            identity: device.clone(),
        });
        let (m, _) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::Connected,
        });
        let (m, first) = m.on_event(Event::AppStatusReported {
            device: device.uuid,
            status: AppStatus::Installed,
        });
        let (_, second) = m.on_event(Event::AppStatusReported {
            device: device.uuid,
            status: AppStatus::Installed,
        });

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn registration_failure_allows_retry() {
        let device = identity("Watch");
        let (m, _) = ConnectionMachine::new().on_event(Event::ReconnectRequested {
            identity: device.clone(),
        });
        let (m, _) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::Connected,
        });
        let (m, _) = m.on_event(Event::AppStatusReported {
            device: device.uuid,
            status: AppStatus::Installed,
        });
        let (m, actions) = m.on_event(Event::RegistrationFailed {
            device: device.uuid,
            error: "timeout".into(),
        });
        assert!(matches!(
            actions.as_slice(),
            [Action::ReportError(Fault::AppNotRegistered(_))]
        ));

        let (_, actions) = m.on_event(Event::AppStatusReported {
            device: device.uuid,
            status: AppStatus::Installed,
        });
        assert_eq!(
            actions,
            vec![Action::RegisterAppMessages {
                device: device.uuid
            }]
        );
    }

    #[test]
    fn bluetooth_not_ready_degrades() {
        let device = identity("Watch");
        let m = registered(&device);
        let (m, actions) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::BluetoothNotReady,
        });

        assert_eq!(
            m.state(),
            ConnectionState::Degraded {
                reason: DegradedReason::BluetoothNotReady
            }
        );
        assert_eq!(m.status(), ConnectionStatus::Degraded);
        assert!(actions.contains(&Action::UnregisterAppMessages {
            device: device.uuid
        }));
    }

    #[test]
    fn degraded_ignores_everything_but_reset() {
        let device = identity("Watch");
        let (m, _) = ConnectionMachine::new().on_event(Event::ReconnectRequested {
            identity: device.clone(),
        });
        let (m, _) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::NotFound,
        });

        let (m, actions) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::Connected,
        });
        assert!(actions.is_empty());
        let (m, actions) = m.on_event(Event::DiscoveryRequested);
        assert!(actions.is_empty());
        assert!(matches!(m.state(), ConnectionState::Degraded { .. }));

        let (m, actions) = m.on_event(Event::Reset);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(
            actions,
            vec![Action::UnregisterDeviceEvents {
                device: device.uuid
            }]
        );
    }

    #[test]
    fn out_of_range_drops_registration() {
        let device = identity("Watch");
        let m = registered(&device);
        let (m, actions) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::NotConnected,
        });

        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.current_device(), Some(&device));
        assert!(actions.contains(&Action::UnregisterAppMessages {
            device: device.uuid
        }));

        // Coming back in range restarts the registration round trip
        let (m, actions) = m.on_event(Event::DeviceStatusChanged {
            device: device.uuid,
            status: DeviceStatus::Connected,
        });
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(
            actions,
            vec![Action::QueryAppStatus {
                device: device.uuid
            }]
        );
    }

    #[test]
    fn session_end_unregisters_everything() {
        let a = identity("A");
        let b = identity("B");
        let (m, _) = ConnectionMachine::new().on_event(Event::DevicesSelected {
            devices: vec![a.clone(), b.clone()],
        });
        let (m, _) = m.on_event(Event::DeviceStatusChanged {
            device: a.uuid,
            status: DeviceStatus::Connected,
        });
        let (m, _) = m.on_event(Event::AppStatusReported {
            device: a.uuid,
            status: AppStatus::Installed,
        });
        let (m, _) = m.on_event(Event::RegistrationSucceeded { device: a.uuid });

        let (m, actions) = m.on_event(Event::SessionEnded);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(m.watched().is_empty());
        assert!(m.current_device().is_none());
        assert_eq!(
            actions,
            vec![
                Action::UnregisterAppMessages { device: a.uuid },
                Action::UnregisterDeviceEvents { device: a.uuid },
                Action::UnregisterDeviceEvents { device: b.uuid },
            ]
        );
    }

    #[test]
    fn forget_clears_identity() {
        let device = identity("Watch");
        let m = registered(&device);
        let (m, actions) = m.on_event(Event::Forget);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(actions.last(), Some(&Action::ClearIdentity));
    }

    #[test]
    fn reconnect_while_registered_only_polls() {
        let device = identity("Watch");
        let m = registered(&device);
        let (m, actions) = m.on_event(Event::ReconnectRequested {
            identity: device.clone(),
        });

        assert!(m.is_registered());
        assert_eq!(
            actions,
            vec![Action::QueryDeviceStatus {
                device: device.uuid
            }]
        );
    }

    #[test]
    fn selecting_new_device_releases_old_registration() {
        let a = identity("A");
        let b = identity("B");
        let m = registered(&a);
        let (m, actions) = m.on_event(Event::DevicesSelected {
            devices: vec![b.clone()],
        });

        assert_eq!(m.current_device(), Some(&b));
        assert_eq!(m.state(), ConnectionState::Discovering);
        assert!(actions.contains(&Action::UnregisterAppMessages { device: a.uuid }));
    }

    #[test]
    fn poll_without_device_is_noop() {
        let (_, actions) = ConnectionMachine::new().on_event(Event::PollStatus);
        assert!(actions.is_empty());
    }

    #[test]
    fn status_names() {
        assert_eq!(ConnectionStatus::Registered.to_string(), "registered");
        assert_eq!(ConnectionStatus::Unavailable.as_str(), "unavailable");
    }
}
