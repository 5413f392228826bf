//! Transport used when an SDK is not available.

use async_trait::async_trait;
use watchlink_sync_core::ConnectionStatus;
use watchlink_sync_types::{CommandAck, TransportId, WorkoutState};

use super::TransportAdapter;
use crate::LinkError;

/// Adapter that is always unavailable.
///
/// Stands in for a transport whose SDK is absent, so the rest of the system
/// keeps a uniform set of adapters. Every send fails fast without side
/// effects.
#[derive(Debug, Clone, Copy)]
pub struct NullTransport {
    id: TransportId,
}

impl NullTransport {
    /// A placeholder with no transport behind it.
    pub fn new() -> Self {
        Self {
            id: TransportId::Null,
        }
    }

    /// A placeholder for the missing `id` transport.
    pub fn replacing(id: TransportId) -> Self {
        Self { id }
    }

    fn unavailable(&self) -> LinkError {
        LinkError::TransportUnavailable(self.id)
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportAdapter for NullTransport {
    fn id(&self) -> TransportId {
        self.id
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::Unavailable
    }

    fn last_error(&self) -> Option<LinkError> {
        Some(self.unavailable())
    }

    async fn send_state(&self, _state: &WorkoutState) -> Result<(), LinkError> {
        Err(self.unavailable())
    }

    async fn send_ack(&self, _ack: &CommandAck) -> Result<(), LinkError> {
        Err(self.unavailable())
    }

    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlink_sync_types::{CommandId, StateVersion, WorkoutId};

    #[tokio::test]
    async fn every_send_is_unavailable() {
        let null = NullTransport::replacing(TransportId::Vendor);
        let state = WorkoutState::ended_marker(WorkoutId::new("w"), "W", StateVersion::new(1));

        assert_eq!(
            null.send_state(&state).await,
            Err(LinkError::TransportUnavailable(TransportId::Vendor))
        );
        assert!(null.send_ack(&CommandAck::received(CommandId::new("c"))).await.is_err());
        assert_eq!(null.status(), ConnectionStatus::Unavailable);
    }

    #[test]
    fn default_is_null_id() {
        assert_eq!(NullTransport::default().id(), TransportId::Null);
    }
}
