//! Wire messages for watchlink.
//!
//! One closed set of tagged variants, discriminated by the `action` key.
//! The same schema is carried two ways:
//! - as a string-keyed JSON dictionary over the OS session transport
//! - as MessagePack bytes (named fields) over the vendor transport
//!
//! Both decoders go through the same validation, so an unknown `action`
//! is rejected explicitly instead of being ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Command, CommandAck, WireError, WorkoutState};

/// String-keyed dictionary as exchanged by the OS session SDK.
pub type JsonMap = serde_json::Map<String, Value>;

/// The `action` discriminator values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Outbound workout state.
    StateUpdate,
    /// Outbound command acknowledgement.
    CommandAck,
    /// Inbound command.
    Command,
}

impl Action {
    /// Wire token for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::StateUpdate => "stateUpdate",
            Action::CommandAck => "commandAck",
            Action::Command => "command",
        }
    }

    /// Parse a wire token.
    pub fn from_token(token: &str) -> Result<Self, WireError> {
        match token {
            "stateUpdate" => Ok(Action::StateUpdate),
            "commandAck" => Ok(Action::CommandAck),
            "command" => Ok(Action::Command),
            other => Err(WireError::UnknownAction(other.to_string())),
        }
    }
}

/// All possible wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Message {
    /// Workout state pushed to the wearable
    #[serde(rename = "stateUpdate")]
    StateUpdate(WorkoutState),
    /// Acknowledgement of an inbound command
    #[serde(rename = "commandAck")]
    CommandAck(CommandAck),
    /// Remote control request from the wearable
    #[serde(rename = "command")]
    Command(Command),
}

impl Message {
    /// The discriminator of this message.
    pub fn action(&self) -> Action {
        match self {
            Message::StateUpdate(_) => Action::StateUpdate,
            Message::CommandAck(_) => Action::CommandAck,
            Message::Command(_) => Action::Command,
        }
    }

    /// Serialize to MessagePack bytes with named fields.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec_named(self).map_err(WireError::Serialization)
    }

    /// Deserialize and validate from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let value: Value = rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)?;
        match value {
            Value::Object(map) => Self::from_json_map(map),
            _ => Err(WireError::InvalidData("payload is not a dictionary".into())),
        }
    }

    /// Serialize to a string-keyed dictionary.
    pub fn to_json_map(&self) -> Result<JsonMap, WireError> {
        match serde_json::to_value(self).map_err(WireError::Json)? {
            Value::Object(map) => Ok(map),
            _ => Err(WireError::InvalidData("message did not encode as a dictionary".into())),
        }
    }

    /// Deserialize and validate from a string-keyed dictionary.
    pub fn from_json_map(map: JsonMap) -> Result<Self, WireError> {
        match map.get("action") {
            None => return Err(WireError::MissingAction),
            Some(Value::String(token)) => {
                Action::from_token(token)?;
            }
            Some(other) => {
                return Err(WireError::InvalidData(format!(
                    "action must be a string, got {}",
                    other
                )))
            }
        }

        let message: Message =
            serde_json::from_value(Value::Object(map)).map_err(WireError::Json)?;
        message.validate()?;
        Ok(message)
    }

    /// Deserialize and validate from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, WireError> {
        let value: Value = serde_json::from_str(text).map_err(WireError::Json)?;
        match value {
            Value::Object(map) => Self::from_json_map(map),
            _ => Err(WireError::InvalidData("payload is not a dictionary".into())),
        }
    }

    fn validate(&self) -> Result<(), WireError> {
        match self {
            Message::StateUpdate(state) => state.validate(),
            Message::Command(command) => command.validate(),
            Message::CommandAck(ack) => {
                if ack.command_id.is_empty() {
                    Err(WireError::InvalidData("commandId must not be empty".into()))
                } else {
                    Ok(())
                }
            }
        }
    }
}
