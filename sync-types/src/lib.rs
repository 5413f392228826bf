//! # sync-types
//!
//! Wire format types for watchlink workout state synchronization.
//!
//! This crate provides the value types exchanged between the phone-side
//! execution engine and a companion wearable:
//! - [`WorkoutState`] - Snapshot of execution progress sent outward
//! - [`Command`] / [`CommandAck`] - Remote control requests and their acknowledgements
//! - [`DeviceIdentity`] - Persisted reference to a previously-connected wearable
//! - [`Message`] - The closed set of wire messages (state / ack / command)
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod models;

pub use error::WireError;
pub use ids::{CommandId, DeviceUuid, StateVersion, TransportId, WorkoutId};
pub use messages::{Action, JsonMap, Message};
pub use models::{
    AckStatus, Command, CommandAck, DeviceIdentity, StepType, WorkoutPhase, WorkoutState,
};
