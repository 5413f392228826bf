//! Transport abstraction for watchlink.
//!
//! This module provides one adapter per channel to the wearable, each hiding
//! a platform SDK behind a small trait so it can be swapped for a mock or for
//! [`NullTransport`] when the SDK is absent.
//!
//! # Design
//!
//! Adapters are send-oriented:
//! - `send_state()` pushes a [`WorkoutState`] under the adapter's policy
//! - `send_ack()` answers one inbound command on this adapter only
//! - `status()` / `last_error()` feed the UI
//!
//! Inbound commands do not go through the trait. Every adapter pushes them
//! into one shared channel of [`InboundCommand`], drained by the router.

mod mock;
mod null;
mod session;
mod vendor;

pub use mock::{MockSessionSdk, MockVendorSdk, VendorCall};
pub use null::NullTransport;
pub use session::{SessionEvent, SessionSdk, SessionTransport};
pub use vendor::{VendorEvent, VendorSdk, VendorTransport};

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use watchlink_sync_core::ConnectionStatus;
use watchlink_sync_types::{Command, CommandAck, TransportId, WorkoutState};

use crate::LinkError;

/// Error reported by a platform SDK call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SdkError(pub String);

impl SdkError {
    /// Create an SDK error from any message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A command received from the wearable, tagged with its transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    /// The decoded command.
    pub command: Command,
    /// Transport it arrived on; the ack goes back on the same one.
    pub from: TransportId,
}

/// One channel to the wearable.
///
/// Implementations never panic on failure; errors are returned to the
/// broadcaster lane, which logs them, and kept as the adapter's last error.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Which transport this is.
    fn id(&self) -> TransportId;

    /// Current UI-facing status.
    fn status(&self) -> ConnectionStatus;

    /// Most recent failure, for diagnostics display.
    fn last_error(&self) -> Option<LinkError>;

    /// Push a workout state.
    async fn send_state(&self, state: &WorkoutState) -> Result<(), LinkError>;

    /// Send a command acknowledgement.
    async fn send_ack(&self, ack: &CommandAck) -> Result<(), LinkError>;

    /// Release SDK resources. Further sends fail.
    async fn shutdown(&self);
}

/// Shared last-error slot.
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorSlot {
    inner: Arc<Mutex<Option<LinkError>>>,
}

impl ErrorSlot {
    pub(crate) fn record(&self, error: &LinkError) {
        if let Ok(mut slot) = self.inner.lock() {
            *slot = Some(error.clone());
        }
    }

    pub(crate) fn get(&self) -> Option<LinkError> {
        self.inner.lock().ok().and_then(|slot| slot.clone())
    }
}
