//! # sync-client
//!
//! Client library for watchlink workout-state sync.
//!
//! This is the library the phone-side application uses to keep a companion
//! wearable in step with the workout engine.
//!
//! ## Features
//!
//! - **Two transports**: OS session (persistent context + immediate messages)
//!   and a vendor wearable SDK, each behind [`TransportAdapter`]
//! - **Serialized vendor link**: one actor task owns the connection state
//!   machine from sync-core
//! - **Fast-path reconnect**: the persisted device is tried before the picker
//! - **Idempotent commands**: redelivered commands reach the engine once
//!
//! ## Example
//!
//! ```ignore
//! use watchlink_sync_client::{CompanionLink, FileDeviceStore, LinkConfig};
//!
//! let link = CompanionLink::builder(config, engine, Arc::new(FileDeviceStore::in_dir(&dir)))
//!     .with_vendor(sdk, events)
//!     .build()
//!     .await;
//!
//! link.broadcast(state);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod broadcaster;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod link;
pub mod router;
pub mod store;
pub mod supervisor;
pub mod transport;

pub use broadcaster::{StateBroadcaster, TransportStatus};
pub use client::{CompanionLink, CompanionLinkBuilder};
pub use config::{ConfigError, LinkConfig, LinkSettings};
pub use engine::{AckOutcome, ScriptedEngine, WorkoutEngine};
pub use error::LinkError;
pub use link::{LinkSnapshot, VendorLink};
pub use router::{CommandRouter, RouteOutcome};
pub use store::{DevicePersistenceStore, FileDeviceStore, MemoryDeviceStore, StoreError, DEVICE_FILE};
pub use supervisor::{DiscoveryReason, ReconnectOutcome, ReconnectionSupervisor};
pub use transport::{
    InboundCommand, MockSessionSdk, MockVendorSdk, NullTransport, SdkError, SessionEvent,
    SessionSdk, SessionTransport, TransportAdapter, VendorCall, VendorEvent, VendorSdk,
    VendorTransport,
};
