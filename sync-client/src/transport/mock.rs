//! Mock SDKs for testing.
//!
//! Both mocks record every call, allow failure injection, and emit the
//! callbacks a real SDK would, through the same event channels.

use super::{SdkError, SessionEvent, SessionSdk, VendorEvent, VendorSdk};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use watchlink_sync_core::{AppStatus, DeviceStatus};
use watchlink_sync_types::{DeviceUuid, JsonMap};

// ===========================================
// Session SDK
// ===========================================

/// Mock platform session.
///
/// Supported, reachable and with the companion installed by default.
#[derive(Debug, Clone)]
pub struct MockSessionSdk {
    inner: Arc<Mutex<MockSessionInner>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

#[derive(Debug)]
struct MockSessionInner {
    supported: bool,
    reachable: bool,
    companion_installed: bool,
    activations: usize,
    contexts: Vec<JsonMap>,
    messages: Vec<JsonMap>,
    fail_next_activate: Option<String>,
    fail_next_context: Option<String>,
    fail_next_message: Option<String>,
}

impl Default for MockSessionInner {
    fn default() -> Self {
        Self {
            supported: true,
            reachable: true,
            companion_installed: true,
            activations: 0,
            contexts: Vec::new(),
            messages: Vec::new(),
            fail_next_activate: None,
            fail_next_context: None,
            fail_next_message: None,
        }
    }
}

impl MockSessionSdk {
    /// Create a mock and the event channel it reports on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let sdk = Self {
            inner: Arc::new(Mutex::new(MockSessionInner::default())),
            events,
        };
        (sdk, rx)
    }

    /// Whether the platform offers a session.
    pub fn set_supported(&self, supported: bool) {
        self.inner.lock().unwrap().supported = supported;
    }

    /// Flip peer reachability and report it.
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.lock().unwrap().reachable = reachable;
        let _ = self.events.send(SessionEvent::ReachabilityChanged(reachable));
    }

    /// Whether the companion app is installed.
    pub fn set_companion_installed(&self, installed: bool) {
        self.inner.lock().unwrap().companion_installed = installed;
    }

    /// Every persistent context written, in order.
    pub fn contexts(&self) -> Vec<JsonMap> {
        self.inner.lock().unwrap().contexts.clone()
    }

    /// Every immediate message sent, in order.
    pub fn messages(&self) -> Vec<JsonMap> {
        self.inner.lock().unwrap().messages.clone()
    }

    /// Number of successful activations.
    pub fn activations(&self) -> usize {
        self.inner.lock().unwrap().activations
    }

    /// Cause the next activate() to fail with the given error.
    pub fn fail_next_activate(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_activate = Some(error.to_string());
    }

    /// Cause the next context write to fail with the given error.
    pub fn fail_next_context(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_context = Some(error.to_string());
    }

    /// Cause the next immediate message to fail with the given error.
    pub fn fail_next_message(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_message = Some(error.to_string());
    }

    /// Simulate a message from the wearable.
    pub fn deliver_message(&self, message: JsonMap) {
        let _ = self.events.send(SessionEvent::MessageReceived(message));
    }

    /// Simulate the platform tearing the session down.
    pub fn deactivate(&self) {
        let _ = self.events.send(SessionEvent::Deactivated);
    }
}

#[async_trait]
impl SessionSdk for MockSessionSdk {
    fn is_supported(&self) -> bool {
        self.inner.lock().unwrap().supported
    }

    async fn activate(&self) -> Result<(), SdkError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_activate.take() {
            return Err(SdkError(error));
        }
        inner.activations += 1;
        Ok(())
    }

    fn is_reachable(&self) -> bool {
        self.inner.lock().unwrap().reachable
    }

    fn is_companion_installed(&self) -> bool {
        self.inner.lock().unwrap().companion_installed
    }

    async fn update_application_context(&self, context: JsonMap) -> Result<(), SdkError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_context.take() {
            return Err(SdkError(error));
        }
        inner.contexts.push(context);
        Ok(())
    }

    async fn send_message(&self, message: JsonMap) -> Result<(), SdkError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.reachable {
            return Err(SdkError::new("peer not reachable"));
        }
        if let Some(error) = inner.fail_next_message.take() {
            return Err(SdkError(error));
        }
        inner.messages.push(message);
        Ok(())
    }
}

// ===========================================
// Vendor SDK
// ===========================================

/// One recorded call into [`MockVendorSdk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorCall {
    /// Device picker opened.
    OpenDeviceSelection,
    /// Device event listener registered.
    RegisterDeviceEvents(DeviceUuid),
    /// Device event listener removed.
    UnregisterDeviceEvents(DeviceUuid),
    /// Device status queried.
    QueryDeviceStatus(DeviceUuid),
    /// App status queried.
    QueryAppStatus(DeviceUuid),
    /// App messaging registered.
    RegisterAppMessages(DeviceUuid),
    /// App messaging unregistered.
    UnregisterAppMessages(DeviceUuid),
    /// Payload sent to a device.
    SendMessage(DeviceUuid, Vec<u8>),
}

/// Mock vendor wearable SDK.
///
/// Status queries are answered through the event channel from scripted
/// values. A device without a scripted status never answers, which is how a
/// status timeout is simulated. App status defaults to installed and
/// registration succeeds unless told otherwise.
#[derive(Debug, Clone)]
pub struct MockVendorSdk {
    inner: Arc<Mutex<MockVendorInner>>,
    events: mpsc::UnboundedSender<VendorEvent>,
}

#[derive(Debug)]
struct MockVendorInner {
    calls: Vec<VendorCall>,
    device_status: HashMap<DeviceUuid, DeviceStatus>,
    app_status: AppStatus,
    registration_error: Option<String>,
    fail_open_selection: Option<String>,
    fail_next_send: Option<String>,
}

impl Default for MockVendorInner {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            device_status: HashMap::new(),
            app_status: AppStatus::Installed,
            registration_error: None,
            fail_open_selection: None,
            fail_next_send: None,
        }
    }
}

impl MockVendorSdk {
    /// Create a mock and the event channel it reports on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<VendorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let sdk = Self {
            inner: Arc::new(Mutex::new(MockVendorInner::default())),
            events,
        };
        (sdk, rx)
    }

    /// Script the answer to status queries for `device`.
    pub fn set_device_status(&self, device: DeviceUuid, status: DeviceStatus) {
        self.inner.lock().unwrap().device_status.insert(device, status);
    }

    /// Script the answer to app status queries.
    pub fn set_app_status(&self, status: AppStatus) {
        self.inner.lock().unwrap().app_status = status;
    }

    /// Make app-message registration fail with the given error.
    pub fn fail_registration(&self, error: &str) {
        self.inner.lock().unwrap().registration_error = Some(error.to_string());
    }

    /// Make the next picker request fail with the given error.
    pub fn fail_open_selection(&self, error: &str) {
        self.inner.lock().unwrap().fail_open_selection = Some(error.to_string());
    }

    /// Cause the next send to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_send = Some(error.to_string());
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<VendorCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Payloads sent, in order.
    pub fn sent_messages(&self) -> Vec<(DeviceUuid, Vec<u8>)> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|call| match call {
                VendorCall::SendMessage(device, payload) => Some((*device, payload.clone())),
                _ => None,
            })
            .collect()
    }

    /// How many times the picker was opened.
    pub fn selection_opened(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| **call == VendorCall::OpenDeviceSelection)
            .count()
    }

    /// Push an unsolicited device status callback.
    pub fn push_device_status(&self, device: DeviceUuid, status: DeviceStatus) {
        self.set_device_status(device, status);
        let _ = self.events.send(VendorEvent::DeviceStatus { device, status });
    }

    /// Simulate a message from the wearable.
    pub fn deliver_message(&self, device: DeviceUuid, payload: Vec<u8>) {
        let _ = self
            .events
            .send(VendorEvent::MessageReceived { device, payload });
    }

    fn record(&self, call: VendorCall) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl VendorSdk for MockVendorSdk {
    async fn open_device_selection(&self) -> Result<(), SdkError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_open_selection.take() {
            return Err(SdkError(error));
        }
        inner.calls.push(VendorCall::OpenDeviceSelection);
        Ok(())
    }

    async fn register_device_events(&self, device: DeviceUuid) -> Result<(), SdkError> {
        self.record(VendorCall::RegisterDeviceEvents(device));
        Ok(())
    }

    async fn unregister_device_events(&self, device: DeviceUuid) -> Result<(), SdkError> {
        self.record(VendorCall::UnregisterDeviceEvents(device));
        Ok(())
    }

    async fn query_device_status(&self, device: DeviceUuid) -> Result<(), SdkError> {
        self.record(VendorCall::QueryDeviceStatus(device));
        let scripted = self.inner.lock().unwrap().device_status.get(&device).copied();
        if let Some(status) = scripted {
            let _ = self.events.send(VendorEvent::DeviceStatus { device, status });
        }
        Ok(())
    }

    async fn query_app_status(&self, device: DeviceUuid) -> Result<(), SdkError> {
        self.record(VendorCall::QueryAppStatus(device));
        let status = self.inner.lock().unwrap().app_status;
        let _ = self.events.send(VendorEvent::AppStatus { device, status });
        Ok(())
    }

    async fn register_app_messages(&self, device: DeviceUuid) -> Result<(), SdkError> {
        self.record(VendorCall::RegisterAppMessages(device));
        let result = match self.inner.lock().unwrap().registration_error.clone() {
            Some(error) => Err(SdkError(error)),
            None => Ok(()),
        };
        let _ = self.events.send(VendorEvent::Registration { device, result });
        Ok(())
    }

    async fn unregister_app_messages(&self, device: DeviceUuid) -> Result<(), SdkError> {
        self.record(VendorCall::UnregisterAppMessages(device));
        Ok(())
    }

    async fn send_message(&self, device: DeviceUuid, payload: Vec<u8>) -> Result<(), SdkError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(error) = inner.fail_next_send.take() {
            return Err(SdkError(error));
        }
        inner.calls.push(VendorCall::SendMessage(device, payload));
        Ok(())
    }
}
