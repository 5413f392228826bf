//! Vendor link actor.
//!
//! One task per vendor transport owns the [`ConnectionMachine`]. Requests
//! (reconnect, discovery results, sends) and SDK callbacks (status, app
//! status, registration results, inbound payloads) are all applied from this
//! task, one at a time, so a discovery callback, a manual reconnect and a
//! status poll can never interleave.
//!
//! ```text
//! ReconnectionSupervisor ─┐                 ┌─► VendorSdk
//! VendorTransport ────────┼─► LinkActor ────┼─► DevicePersistenceStore
//! VendorSdk callbacks ────┘      │          └─► inbound commands
//!                                ▼
//!                       watch<LinkSnapshot>
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use watchlink_sync_core::{Action, ConnectionMachine, ConnectionState, ConnectionStatus, Event, Fault};
use watchlink_sync_types::{DeviceIdentity, Message, TransportId};

use crate::store::{DevicePersistenceStore, StoreError};
use crate::transport::{InboundCommand, VendorEvent, VendorSdk};
use crate::LinkError;

/// Request queue depth per link.
const REQUEST_QUEUE: usize = 32;

/// Read-only view of one vendor link, published after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSnapshot {
    /// Generic connection state.
    pub state: ConnectionState,
    /// UI-facing status.
    pub status: ConnectionStatus,
    /// The current device, if one has been selected.
    pub device: Option<DeviceIdentity>,
    /// Most recent failure.
    pub last_error: Option<LinkError>,
}

impl Default for LinkSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            status: ConnectionStatus::Disconnected,
            device: None,
            last_error: None,
        }
    }
}

enum LinkRequest {
    Apply {
        event: Event,
        reply: oneshot::Sender<Result<(), LinkError>>,
    },
    Send {
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<(), LinkError>>,
    },
}

/// Handle to a running link actor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct VendorLink {
    requests: mpsc::Sender<LinkRequest>,
    snapshot: watch::Receiver<LinkSnapshot>,
}

impl std::fmt::Debug for LinkRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkRequest::Apply { event, .. } => write!(f, "Apply({:?})", event),
            LinkRequest::Send { payload, .. } => write!(f, "Send([{} bytes])", payload.len()),
        }
    }
}

impl VendorLink {
    /// Start the actor.
    ///
    /// `events` carries the SDK's callbacks; decoded inbound commands are
    /// pushed to `inbound`. The actor stops once every handle is dropped.
    pub fn spawn(
        sdk: Arc<dyn VendorSdk>,
        store: Arc<dyn DevicePersistenceStore>,
        events: mpsc::UnboundedReceiver<VendorEvent>,
        inbound: mpsc::Sender<InboundCommand>,
    ) -> (Self, JoinHandle<()>) {
        let (requests, request_rx) = mpsc::channel(REQUEST_QUEUE);
        let (snapshot_tx, snapshot) = watch::channel(LinkSnapshot::default());

        let actor = LinkActor {
            machine: ConnectionMachine::new(),
            sdk,
            store,
            inbound,
            snapshot: snapshot_tx,
            last_error: None,
        };
        let task = tokio::spawn(actor.run(request_rx, events));

        (Self { requests, snapshot }, task)
    }

    /// Apply a state machine event and execute its actions.
    ///
    /// Returns the first failure raised while executing them.
    pub async fn apply(&self, event: Event) -> Result<(), LinkError> {
        let (reply, rx) = oneshot::channel();
        self.request(LinkRequest::Apply { event, reply }, rx).await
    }

    /// Send an encoded payload to the current device.
    ///
    /// Fails with [`LinkError::AppNotRegistered`] unless the link is
    /// app-registered.
    pub async fn send(&self, payload: Vec<u8>) -> Result<(), LinkError> {
        let (reply, rx) = oneshot::channel();
        self.request(LinkRequest::Send { payload, reply }, rx).await
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> LinkSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<LinkSnapshot> {
        self.snapshot.clone()
    }

    async fn request(
        &self,
        request: LinkRequest,
        rx: oneshot::Receiver<Result<(), LinkError>>,
    ) -> Result<(), LinkError> {
        let gone = || LinkError::TransportUnavailable(TransportId::Vendor);
        self.requests.send(request).await.map_err(|_| gone())?;
        rx.await.map_err(|_| gone())?
    }
}

struct LinkActor {
    machine: ConnectionMachine,
    sdk: Arc<dyn VendorSdk>,
    store: Arc<dyn DevicePersistenceStore>,
    inbound: mpsc::Sender<InboundCommand>,
    snapshot: watch::Sender<LinkSnapshot>,
    last_error: Option<LinkError>,
}

impl LinkActor {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<LinkRequest>,
        mut events: mpsc::UnboundedReceiver<VendorEvent>,
    ) {
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(LinkRequest::Apply { event, reply }) => {
                        let result = self.apply(event).await;
                        let _ = reply.send(result);
                    }
                    Some(LinkRequest::Send { payload, reply }) => {
                        let result = self.send(payload).await;
                        let _ = reply.send(result);
                    }
                    None => break,
                },
                Some(event) = events.recv() => self.on_vendor_event(event).await,
            }
        }
        debug!(transport = "vendor", "link actor stopped");
    }

    async fn on_vendor_event(&mut self, event: VendorEvent) {
        let machine_event = match event {
            VendorEvent::DeviceStatus { device, status } => {
                debug!(transport = "vendor", ?device, ?status, "device status");
                Event::DeviceStatusChanged { device, status }
            }
            VendorEvent::AppStatus { device, status } => {
                debug!(transport = "vendor", ?device, ?status, "app status");
                Event::AppStatusReported { device, status }
            }
            VendorEvent::Registration { device, result } => match result {
                Ok(()) => Event::RegistrationSucceeded { device },
                Err(e) => Event::RegistrationFailed {
                    device,
                    error: e.to_string(),
                },
            },
            VendorEvent::MessageReceived { device, payload } => {
                self.on_payload(device, payload).await;
                return;
            }
        };
        // Callback-driven failures are already recorded
        let _ = self.apply(machine_event).await;
    }

    async fn on_payload(&mut self, device: watchlink_sync_types::DeviceUuid, payload: Vec<u8>) {
        if self.machine.current_device().map(|d| d.uuid) != Some(device) {
            debug!(transport = "vendor", ?device, "dropping message from non-current device");
            return;
        }
        match Message::from_bytes(&payload) {
            Ok(Message::Command(command)) => {
                let inbound = InboundCommand {
                    command,
                    from: TransportId::Vendor,
                };
                if self.inbound.send(inbound).await.is_err() {
                    debug!(transport = "vendor", "router gone, dropping command");
                }
            }
            Ok(other) => {
                debug!(transport = "vendor", ?device, action = other.action().as_str(), "ignoring non-command message");
            }
            Err(e) => {
                warn!(transport = "vendor", ?device, error = %e, "dropping undecodable payload");
                self.record(LinkError::from(e));
                self.publish();
            }
        }
    }

    async fn apply(&mut self, event: Event) -> Result<(), LinkError> {
        let mut pending = VecDeque::from([event]);
        let mut first_error = None;

        while let Some(event) = pending.pop_front() {
            let before = self.machine.state();
            let machine = std::mem::take(&mut self.machine);
            let (machine, actions) = machine.on_event(event);
            self.machine = machine;

            let after = self.machine.state();
            if before != after {
                info!(transport = "vendor", from = ?before, to = ?after, "vendor link transition");
            }

            for action in actions {
                if let Err(e) = self.execute(action, &mut pending).await {
                    first_error.get_or_insert(e);
                }
            }
        }

        self.publish();
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn execute(&mut self, action: Action, follow_up: &mut VecDeque<Event>) -> Result<(), LinkError> {
        match action {
            Action::OpenDeviceSelection => {
                self.sdk.open_device_selection().await.map_err(|e| {
                    let err = LinkError::DiscoveryFailed(format!("device selection unavailable: {}", e));
                    warn!(transport = "vendor", error = %err, "cannot open device selection");
                    self.record(err.clone());
                    err
                })
            }
            Action::RegisterDeviceEvents { device } => {
                if let Err(e) = self.sdk.register_device_events(device).await {
                    warn!(transport = "vendor", ?device, error = %e, "device event registration failed");
                    self.record(LinkError::SendFailed(format!("device event registration: {}", e)));
                }
                Ok(())
            }
            Action::UnregisterDeviceEvents { device } => {
                if let Err(e) = self.sdk.unregister_device_events(device).await {
                    debug!(transport = "vendor", ?device, error = %e, "device event unregistration failed");
                }
                Ok(())
            }
            Action::QueryDeviceStatus { device } => {
                if let Err(e) = self.sdk.query_device_status(device).await {
                    warn!(transport = "vendor", ?device, error = %e, "device status query failed");
                    self.record(LinkError::DeviceNotReachable);
                }
                Ok(())
            }
            Action::QueryAppStatus { device } => {
                if let Err(e) = self.sdk.query_app_status(device).await {
                    // Treat an unanswerable query like an unknown status
                    debug!(transport = "vendor", ?device, error = %e, "app status query failed");
                    follow_up.push_back(Event::AppStatusReported {
                        device,
                        status: watchlink_sync_core::AppStatus::Unknown,
                    });
                }
                Ok(())
            }
            Action::RegisterAppMessages { device } => {
                if let Err(e) = self.sdk.register_app_messages(device).await {
                    follow_up.push_back(Event::RegistrationFailed {
                        device,
                        error: e.to_string(),
                    });
                }
                Ok(())
            }
            Action::UnregisterAppMessages { device } => {
                if let Err(e) = self.sdk.unregister_app_messages(device).await {
                    debug!(transport = "vendor", ?device, error = %e, "app message unregistration failed");
                }
                Ok(())
            }
            Action::PersistIdentity { identity } => {
                match self.store.save(&identity).await {
                    Ok(()) => {
                        info!(transport = "vendor", device = ?identity.uuid, name = %identity.friendly_name, "persisted device identity");
                    }
                    Err(e) => self.store_failed("save", e),
                }
                Ok(())
            }
            Action::ClearIdentity => {
                match self.store.clear().await {
                    Ok(()) => info!(transport = "vendor", "cleared persisted device identity"),
                    Err(e) => self.store_failed("clear", e),
                }
                Ok(())
            }
            Action::ReportError(fault) => {
                match &fault {
                    Fault::DeviceNotReachable => info!(transport = "vendor", "device out of range"),
                    other => warn!(transport = "vendor", fault = %other, "vendor link fault"),
                }
                let err = LinkError::from(fault);
                self.record(err.clone());
                Err(err)
            }
        }
    }

    async fn send(&mut self, payload: Vec<u8>) -> Result<(), LinkError> {
        let device = match (self.machine.is_registered(), self.machine.current_device()) {
            (true, Some(current)) => current.uuid,
            _ => {
                let err = LinkError::AppNotRegistered(format!("vendor link is {}", self.machine.status()));
                self.record(err.clone());
                self.publish();
                return Err(err);
            }
        };

        let result = self
            .sdk
            .send_message(device, payload)
            .await
            .map_err(|e| LinkError::SendFailed(e.to_string()));
        if let Err(e) = &result {
            self.record(e.clone());
            self.publish();
        }
        result
    }

    fn store_failed(&mut self, op: &str, e: StoreError) {
        warn!(transport = "vendor", op, error = %e, "device store failure");
        if let StoreError::InvalidDeviceIdentity(msg) = e {
            self.record(LinkError::InvalidDeviceIdentity(msg));
        }
    }

    fn record(&mut self, error: LinkError) {
        self.last_error = Some(error);
    }

    fn publish(&self) {
        self.snapshot.send_replace(LinkSnapshot {
            state: self.machine.state(),
            status: self.machine.status(),
            device: self.machine.current_device().cloned(),
            last_error: self.last_error.clone(),
        });
    }
}
