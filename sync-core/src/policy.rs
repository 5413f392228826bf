//! Persistent-context write policy.
//!
//! The OS session's persistent context is read by the wearable's OS as a
//! sign of an always-on companion session. A live state written there makes
//! the OS surface a stale "resume on phone" affordance after the workout
//! has ended. The default policy therefore only writes real payloads for
//! inactive phases and writes the cleared marker otherwise.

use serde::{Deserialize, Serialize};
use watchlink_sync_types::WorkoutState;

/// Which payload the persistent-context channel receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContextPolicy {
    /// Write the cleared marker for `ready`, `running` and `paused`.
    #[default]
    #[serde(rename = "clear-during-active")]
    ClearDuringActivePhases,
    /// Write every state as-is.
    #[serde(rename = "always-write")]
    AlwaysWriteState,
}

/// Outcome of applying a [`ContextPolicy`] to one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextWrite<'a> {
    /// Write this state.
    State(&'a WorkoutState),
    /// Write the cleared marker (empty context).
    Cleared,
}

impl ContextPolicy {
    /// Decide what goes into the persistent context for `state`.
    pub fn context_write<'a>(&self, state: &'a WorkoutState) -> ContextWrite<'a> {
        match self {
            ContextPolicy::AlwaysWriteState => ContextWrite::State(state),
            ContextPolicy::ClearDuringActivePhases if state.phase.is_active() => {
                ContextWrite::Cleared
            }
            ContextPolicy::ClearDuringActivePhases => ContextWrite::State(state),
        }
    }

    /// Config file token.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextPolicy::ClearDuringActivePhases => "clear-during-active",
            ContextPolicy::AlwaysWriteState => "always-write",
        }
    }
}
