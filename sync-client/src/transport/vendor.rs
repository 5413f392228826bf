//! Vendor SDK transport.
//!
//! The vendor SDK talks to exactly one selected wearable and only after the
//! companion app has registered for messages. Connection management lives in
//! the [`VendorLink`] actor; this adapter just encodes messages and hands
//! them to the link.

use async_trait::async_trait;
use watchlink_sync_core::{parse_selection_url, AppStatus, ConnectionStatus, DeviceStatus, DiscoveryError, Event};
use watchlink_sync_types::{CommandAck, DeviceIdentity, DeviceUuid, Message, TransportId, WorkoutState};

use super::{SdkError, TransportAdapter};
use crate::link::VendorLink;
use crate::LinkError;

/// Narrow view of the vendor wearable SDK.
///
/// Calls return once the request has been issued. Their answers (statuses,
/// registration results, inbound payloads) arrive later as [`VendorEvent`]s
/// on the channel the SDK was created with.
#[async_trait]
pub trait VendorSdk: Send + Sync {
    /// Open the external device-selection UI.
    async fn open_device_selection(&self) -> Result<(), SdkError>;

    /// Parse the deep-link callback that carries the selection result.
    fn parse_device_selection(
        &self,
        url: &str,
        scheme: &str,
    ) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
        parse_selection_url(url, scheme)
    }

    /// Start receiving status events for `device`.
    async fn register_device_events(&self, device: DeviceUuid) -> Result<(), SdkError>;

    /// Stop receiving status events for `device`.
    async fn unregister_device_events(&self, device: DeviceUuid) -> Result<(), SdkError>;

    /// Ask for the device status. Answered by [`VendorEvent::DeviceStatus`].
    async fn query_device_status(&self, device: DeviceUuid) -> Result<(), SdkError>;

    /// Ask for the companion app status. Answered by [`VendorEvent::AppStatus`].
    async fn query_app_status(&self, device: DeviceUuid) -> Result<(), SdkError>;

    /// Register for app messages. Answered by [`VendorEvent::Registration`].
    async fn register_app_messages(&self, device: DeviceUuid) -> Result<(), SdkError>;

    /// Drop the app message registration.
    async fn unregister_app_messages(&self, device: DeviceUuid) -> Result<(), SdkError>;

    /// Send an opaque payload to the companion app on `device`.
    async fn send_message(&self, device: DeviceUuid, payload: Vec<u8>) -> Result<(), SdkError>;
}

/// Callbacks from the vendor SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorEvent {
    /// Device status report.
    DeviceStatus {
        /// Device reported on.
        device: DeviceUuid,
        /// Reported status.
        status: DeviceStatus,
    },
    /// Companion app status report.
    AppStatus {
        /// Device reported on.
        device: DeviceUuid,
        /// Reported status.
        status: AppStatus,
    },
    /// Result of an app message registration.
    Registration {
        /// Device registered for.
        device: DeviceUuid,
        /// Outcome.
        result: Result<(), SdkError>,
    },
    /// Payload from the companion app.
    MessageReceived {
        /// Sending device.
        device: DeviceUuid,
        /// Raw bytes.
        payload: Vec<u8>,
    },
}

/// [`TransportAdapter`] over a [`VendorLink`].
///
/// Messages are MessagePack-encoded. Nothing reaches the SDK unless the link
/// is app-registered.
#[derive(Debug, Clone)]
pub struct VendorTransport {
    link: VendorLink,
}

impl VendorTransport {
    /// Wrap a running link.
    pub fn new(link: VendorLink) -> Self {
        Self { link }
    }

    /// The underlying link.
    pub fn link(&self) -> &VendorLink {
        &self.link
    }

    async fn send_message(&self, message: &Message) -> Result<(), LinkError> {
        let payload = message.to_bytes()?;
        self.link.send(payload).await
    }
}

#[async_trait]
impl TransportAdapter for VendorTransport {
    fn id(&self) -> TransportId {
        TransportId::Vendor
    }

    fn status(&self) -> ConnectionStatus {
        self.link.snapshot().status
    }

    fn last_error(&self) -> Option<LinkError> {
        self.link.snapshot().last_error
    }

    async fn send_state(&self, state: &WorkoutState) -> Result<(), LinkError> {
        self.send_message(&Message::StateUpdate(state.clone())).await
    }

    async fn send_ack(&self, ack: &CommandAck) -> Result<(), LinkError> {
        self.send_message(&Message::CommandAck(ack.clone())).await
    }

    async fn shutdown(&self) {
        // Only fails if the actor is already gone
        let _ = self.link.apply(Event::SessionEnded).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDeviceStore;
    use crate::transport::{MockVendorSdk, VendorCall};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use watchlink_sync_core::ConnectionState;
    use watchlink_sync_types::{CommandId, StateVersion, WorkoutId};

    fn state(version: u64) -> WorkoutState {
        WorkoutState::ended_marker(WorkoutId::new("w1"), "Intervals", StateVersion::new(version))
    }

    async fn registered() -> (VendorTransport, MockVendorSdk, DeviceIdentity) {
        let (sdk, events) = MockVendorSdk::new();
        let (tx, _rx) = mpsc::channel(8);
        let (link, _task) = VendorLink::spawn(
            Arc::new(sdk.clone()),
            Arc::new(MemoryDeviceStore::new()),
            events,
            tx,
        );
        let device = DeviceIdentity::new(DeviceUuid::random(), "fenix 7", "Watch");
        sdk.set_device_status(device.uuid, DeviceStatus::Connected);
        link.apply(Event::ReconnectRequested { identity: device.clone() })
            .await
            .unwrap();

        let mut rx = link.subscribe();
        tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.state == ConnectionState::AppRegistered),
        )
        .await
        .unwrap()
        .unwrap();
        (VendorTransport::new(link), sdk, device)
    }

    #[tokio::test]
    async fn state_is_sent_as_msgpack() {
        let (transport, sdk, device) = registered().await;
        let s = state(7);

        transport.send_state(&s).await.unwrap();

        let sent = sdk.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, device.uuid);
        assert_eq!(Message::from_bytes(&sent[0].1).unwrap(), Message::StateUpdate(s));
        assert_eq!(transport.status(), ConnectionStatus::Registered);
    }

    #[tokio::test]
    async fn ack_is_sent_as_msgpack() {
        let (transport, sdk, _) = registered().await;
        let ack = CommandAck::executed(CommandId::new("c1"));

        transport.send_ack(&ack).await.unwrap();

        let sent = sdk.sent_messages();
        assert_eq!(Message::from_bytes(&sent[0].1).unwrap(), Message::CommandAck(ack));
    }

    #[tokio::test]
    async fn sdk_send_failure_is_recorded() {
        let (transport, sdk, _) = registered().await;
        sdk.fail_next_send("radio busy");

        let err = transport.send_state(&state(1)).await.unwrap_err();
        assert_eq!(err, LinkError::SendFailed("radio busy".into()));
        assert_eq!(transport.last_error(), Some(err));
    }

    #[tokio::test]
    async fn shutdown_releases_registrations() {
        let (transport, sdk, device) = registered().await;

        transport.shutdown().await;

        assert!(sdk.calls().contains(&VendorCall::UnregisterAppMessages(device.uuid)));
        assert_eq!(transport.status(), ConnectionStatus::Disconnected);
        let err = transport.send_state(&state(2)).await.unwrap_err();
        assert!(matches!(err, LinkError::AppNotRegistered(_)));
    }

    #[test]
    fn default_selection_parser_uses_callback_scheme() {
        let (sdk, _events) = MockVendorSdk::new();
        let url = "other-scheme://device-select-resp";
        assert!(sdk.parse_device_selection(url, "watchlink-ciq").is_err());
    }
}
