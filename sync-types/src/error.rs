//! Error types for watchlink wire handling.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// JSON dictionary conversion failed
    #[error("json error: {0}")]
    Json(#[source] serde_json::Error),

    /// Message carried no `action` discriminator
    #[error("message has no action")]
    MissingAction,

    /// Message carried an `action` outside the known set
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Payload decoded but violates a field constraint
    #[error("invalid data: {0}")]
    InvalidData(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = WireError::UnknownAction("reboot".into());
        assert_eq!(err.to_string(), "unknown action: reboot");
        assert_eq!(WireError::MissingAction.to_string(), "message has no action");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WireError>();
    }
}
