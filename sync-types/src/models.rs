//! Value types exchanged between the execution engine and the wearable.
//!
//! The sync layer treats all of these as opaque and immutable: it serializes
//! and fans them out without mutation.

use serde::{Deserialize, Serialize};

use crate::{CommandId, DeviceUuid, StateVersion, WireError, WorkoutId};

/// Execution phase of a workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutPhase {
    /// No workout loaded.
    Idle,
    /// Workout loaded, waiting to start.
    Ready,
    /// Interval in progress.
    Running,
    /// Paused by the user or a remote command.
    Paused,
    /// Workout finished or abandoned.
    Ended,
}

impl WorkoutPhase {
    /// Phases during which a companion session is live.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Ready | Self::Running | Self::Paused)
    }

    /// Stable lowercase name for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }
}

/// How the current step is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    /// Counts down a duration.
    Timed,
    /// Completed after a number of repetitions.
    Reps,
    /// Completed after covering a distance.
    Distance,
}

/// Snapshot of execution progress sent outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutState {
    /// Staleness guard, strictly increasing within one workout.
    #[serde(rename = "version")]
    pub state_version: StateVersion,
    /// Workout session this state belongs to.
    pub workout_id: WorkoutId,
    /// Display name of the workout.
    pub workout_name: String,
    /// Current phase.
    pub phase: WorkoutPhase,
    /// Zero-based index of the current step.
    pub step_index: u32,
    /// Total number of steps.
    pub step_count: u32,
    /// Display name of the current step.
    pub step_name: String,
    /// How the current step is measured.
    pub step_type: StepType,
    /// Milliseconds left in a timed step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
    /// Free-form round context, e.g. "Round 2 of 3".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_info: Option<String>,
}

impl WorkoutState {
    /// Terminal marker sent once when a workout finishes.
    pub fn ended_marker(
        workout_id: WorkoutId,
        workout_name: impl Into<String>,
        state_version: StateVersion,
    ) -> Self {
        Self {
            state_version,
            workout_id,
            workout_name: workout_name.into(),
            phase: WorkoutPhase::Ended,
            step_index: 0,
            step_count: 0,
            step_name: String::new(),
            step_type: StepType::Timed,
            remaining_ms: None,
            round_info: None,
        }
    }

    /// Check field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), WireError> {
        if self.workout_id.as_str().is_empty() {
            return Err(WireError::InvalidData("workoutId must not be empty".into()));
        }
        if self.step_count > 0 && self.step_index >= self.step_count {
            return Err(WireError::InvalidData(format!(
                "stepIndex {} out of range for stepCount {}",
                self.step_index, self.step_count
            )));
        }
        Ok(())
    }
}

/// Inbound instruction from the wearable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Unique per issuance; drives dedupe and ack correlation.
    pub command_id: CommandId,
    /// Token interpreted by the engine (`pause`, `resume`, `skip`, ...).
    pub command: String,
}

impl Command {
    /// Create a new command.
    pub fn new(command_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            command_id: CommandId::new(command_id),
            command: command.into(),
        }
    }

    /// Check field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), WireError> {
        if self.command_id.is_empty() {
            return Err(WireError::InvalidData("commandId must not be empty".into()));
        }
        if self.command.is_empty() {
            return Err(WireError::InvalidData("command must not be empty".into()));
        }
        Ok(())
    }
}

/// Outcome reported back to the wearable for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    /// Accepted for asynchronous handling.
    Received,
    /// Applied by the engine.
    Executed,
    /// Refused by the engine.
    Rejected,
}

/// Outbound acknowledgement, correlated 1:1 with a [`Command`].
///
/// Never retried: the next periodic state push is the recovery path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandAck {
    /// The command being acknowledged.
    pub command_id: CommandId,
    /// What happened to it.
    pub status: AckStatus,
    /// Engine-specific reason for a rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CommandAck {
    /// Ack with status `received`.
    pub fn received(command_id: CommandId) -> Self {
        Self {
            command_id,
            status: AckStatus::Received,
            error_code: None,
        }
    }

    /// Ack with status `executed`.
    pub fn executed(command_id: CommandId) -> Self {
        Self {
            command_id,
            status: AckStatus::Executed,
            error_code: None,
        }
    }

    /// Ack with status `rejected` and an optional reason.
    pub fn rejected(command_id: CommandId, error_code: Option<String>) -> Self {
        Self {
            command_id,
            status: AckStatus::Rejected,
            error_code,
        }
    }
}

/// Persisted record of a previously-connected wearable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    /// Vendor-assigned device identifier.
    pub uuid: DeviceUuid,
    /// Hardware model, e.g. "fenix 7".
    pub model_name: String,
    /// User-facing name.
    pub friendly_name: String,
}

impl DeviceIdentity {
    /// Create a new identity record.
    pub fn new(
        uuid: DeviceUuid,
        model_name: impl Into<String>,
        friendly_name: impl Into<String>,
    ) -> Self {
        Self {
            uuid,
            model_name: model_name.into(),
            friendly_name: friendly_name.into(),
        }
    }

    /// Reject records that cannot address a real device.
    pub fn validate(&self) -> Result<(), WireError> {
        if self.uuid.is_nil() {
            return Err(WireError::InvalidData("device uuid is nil".into()));
        }
        if self.friendly_name.trim().is_empty() {
            return Err(WireError::InvalidData("device friendly name is empty".into()));
        }
        Ok(())
    }
}
