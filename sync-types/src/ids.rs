//! Identity and ordering types for watchlink.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A monotonically increasing version stamped on every [`WorkoutState`].
///
/// Scoped to one workout session and assigned by the engine, never by the
/// sync layer. Receivers discard any state whose version is not greater than
/// the last one they applied.
///
/// [`WorkoutState`]: crate::WorkoutState
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct StateVersion(u64);

impl StateVersion {
    /// Create a new StateVersion with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this version.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The version that precedes every real state.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Increment the version by one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for StateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for StateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateVersion({})", self.0)
    }
}

/// Identifier of one workout session.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkoutId(String);

impl WorkoutId {
    /// Create a WorkoutId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for WorkoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkoutId({})", self.0)
    }
}

/// Opaque identifier of one command issuance.
///
/// Unique per issuance on the wearable; used for dedupe and ack correlation.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(String);

impl CommandId {
    /// Create a CommandId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the identifier is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandId({})", self.0)
    }
}

/// Unique identifier of a wearable as reported by the vendor SDK.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceUuid(uuid::Uuid);

impl DeviceUuid {
    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Create a random DeviceUuid (for testing and simulation).
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// The nil UUID is never a real device.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl FromStr for DeviceUuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for DeviceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DeviceUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceUuid({})", &self.0.to_string()[..8])
    }
}

/// One independent channel to the wearable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportId {
    /// OS-level bidirectional session (persistent context + immediate messages).
    Session,
    /// Third-party vendor wearable protocol.
    Vendor,
    /// Placeholder for a transport whose SDK is absent.
    Null,
}

impl TransportId {
    /// Stable lowercase name for log fields and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportId::Session => "session",
            TransportId::Vendor => "vendor",
            TransportId::Null => "null",
        }
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        let v1 = StateVersion::new(1);
        let v2 = StateVersion::new(2);
        assert!(v1 < v2);
        assert_eq!(v1.next(), v2);
    }

    #[test]
    fn version_saturates() {
        let v = StateVersion::new(u64::MAX);
        assert_eq!(v.next().value(), u64::MAX);
    }

    #[test]
    fn version_serializes_as_plain_number() {
        let json = serde_json::to_string(&StateVersion::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn device_uuid_parses_hyphenated() {
        let id: DeviceUuid = "6f1c2a9e-3b7d-4c1e-9a55-0d2f8e4b7c61".parse().unwrap();
        assert_eq!(id.to_string(), "6f1c2a9e-3b7d-4c1e-9a55-0d2f8e4b7c61");
        assert!(!id.is_nil());
    }

    #[test]
    fn device_uuid_rejects_garbage() {
        assert!("not-a-uuid".parse::<DeviceUuid>().is_err());
    }

    #[test]
    fn device_uuid_debug_is_short() {
        let id: DeviceUuid = "6f1c2a9e-3b7d-4c1e-9a55-0d2f8e4b7c61".parse().unwrap();
        assert_eq!(format!("{:?}", id), "DeviceUuid(6f1c2a9e)");
    }

    #[test]
    fn transport_id_names() {
        assert_eq!(TransportId::Session.as_str(), "session");
        assert_eq!(TransportId::Vendor.to_string(), "vendor");
    }

    #[test]
    fn command_id_empty_check() {
        assert!(CommandId::new("").is_empty());
        assert!(!CommandId::new("c1").is_empty());
    }
}
