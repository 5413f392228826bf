//! # sync-core
//!
//! Pure logic for watchlink (no I/O, instant tests).
//!
//! This crate implements the state machines and algorithms for wearable
//! sync without any SDK, network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (vendor SDK calls, persistence, sending) is performed by
//! `sync-client`, which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod dedupe;
pub mod discovery;
pub mod policy;
pub mod version;

pub use connection::{
    Action, AppStatus, ConnectionMachine, ConnectionState, ConnectionStatus, DegradedReason,
    DeviceStatus, Event, Fault,
};
pub use dedupe::{Admission, CommandDedupe, DEFAULT_DEDUPE_CAPACITY};
pub use discovery::{parse_selection_url, selection_url, validate_scheme, DiscoveryError};
pub use policy::{ContextPolicy, ContextWrite};
pub use version::VersionTracker;
