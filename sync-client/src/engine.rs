//! Boundary to the workout execution engine.
//!
//! The engine owns phase and interval logic. This crate only forwards
//! commands to it and reports the outcome back to the wearable.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use watchlink_sync_types::{AckStatus, Command, CommandAck};

/// Engine's answer to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckOutcome {
    /// Status reported to the wearable.
    pub status: AckStatus,
    /// Engine-specific reason, for rejections.
    pub error_code: Option<String>,
}

impl AckOutcome {
    /// The command was applied.
    pub fn executed() -> Self {
        Self {
            status: AckStatus::Executed,
            error_code: None,
        }
    }

    /// The command was accepted and will be applied later.
    pub fn received() -> Self {
        Self {
            status: AckStatus::Received,
            error_code: None,
        }
    }

    /// The command was refused.
    pub fn rejected(code: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Rejected,
            error_code: Some(code.into()),
        }
    }

    /// Build the wire ack for `command`.
    pub fn into_ack(self, command: &Command) -> CommandAck {
        CommandAck {
            command_id: command.command_id.clone(),
            status: self.status,
            error_code: self.error_code,
        }
    }
}

/// Command-handling entry point of the execution engine.
///
/// Conflicting commands are delivered in receipt order; arbitration is up to
/// the engine.
#[async_trait]
pub trait WorkoutEngine: Send + Sync {
    /// Handle one command.
    async fn handle(&self, command: &Command) -> AckOutcome;
}

/// Engine stand-in that records commands and executes `pause`, `resume` and
/// `skip`. Anything else is rejected with `unknown_command`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    handled: Arc<Mutex<Vec<Command>>>,
}

impl ScriptedEngine {
    /// Create an engine that has handled nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands handled so far, in order.
    pub fn handled(&self) -> Vec<Command> {
        self.handled.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// How many times `token` was handled.
    pub fn count(&self, token: &str) -> usize {
        self.handled().iter().filter(|c| c.command == token).count()
    }
}

#[async_trait]
impl WorkoutEngine for ScriptedEngine {
    async fn handle(&self, command: &Command) -> AckOutcome {
        self.handled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.clone());

        match command.command.as_str() {
            "pause" | "resume" | "skip" => AckOutcome::executed(),
            _ => AckOutcome::rejected("unknown_command"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_commands_execute() {
        let engine = ScriptedEngine::new();
        let outcome = engine.handle(&Command::new("c1", "pause")).await;
        assert_eq!(outcome, AckOutcome::executed());
        assert_eq!(engine.count("pause"), 1);
    }

    #[tokio::test]
    async fn unknown_command_is_rejected() {
        let engine = ScriptedEngine::new();
        let command = Command::new("c2", "rewind");

        let ack = engine.handle(&command).await.into_ack(&command);
        assert_eq!(ack.status, AckStatus::Rejected);
        assert_eq!(ack.error_code.as_deref(), Some("unknown_command"));
        assert_eq!(ack.command_id, command.command_id);
    }
}
