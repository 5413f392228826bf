//! Discovery callback codec for watchlink.
//!
//! The vendor's device picker runs out of process. When the user picks one or
//! more wearables it hands control back to the app by opening a URL on the
//! callback scheme registered at startup:
//!
//! ```text
//! <scheme>://device-select-resp?devices=<BASE64URL(JSON([identity, ...]))>
//! ```
//!
//! Candidates keep the order the picker returned them in; the first one is
//! promoted to the current device by the caller.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use thiserror::Error;
use url::Url;
use watchlink_sync_types::DeviceIdentity;

/// Host component of a device selection response.
pub const SELECTION_HOST: &str = "device-select-resp";

/// Query parameter carrying the encoded candidates.
pub const DEVICES_PARAM: &str = "devices";

/// Errors from parsing or building discovery callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// The callback is not a URL at all.
    #[error("invalid callback url: {0}")]
    InvalidUrl(String),

    /// The callback targets a different application.
    #[error("callback scheme mismatch: expected {expected}, got {actual}")]
    SchemeMismatch {
        /// Scheme registered at startup.
        expected: String,
        /// Scheme found in the callback.
        actual: String,
    },

    /// The callback is not a device selection response.
    #[error("unexpected callback host: {0}")]
    UnexpectedHost(String),

    /// The candidate list could not be decoded or a candidate is malformed.
    #[error("invalid device payload: {0}")]
    InvalidPayload(String),

    /// The callback scheme itself is not a valid URL scheme.
    #[error("invalid callback scheme: {0:?}")]
    InvalidScheme(String),
}

/// Check that `scheme` is usable as a URL scheme (RFC 3986).
pub fn validate_scheme(scheme: &str) -> Result<(), DiscoveryError> {
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if starts_alpha && rest_ok {
        Ok(())
    } else {
        Err(DiscoveryError::InvalidScheme(scheme.to_string()))
    }
}

/// Parse a device selection callback into its candidates.
///
/// A response without a `devices` parameter yields an empty list; the caller
/// decides what zero candidates means.
pub fn parse_selection_url(
    url: &str,
    expected_scheme: &str,
) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
    let parsed = Url::parse(url.trim()).map_err(|e| DiscoveryError::InvalidUrl(e.to_string()))?;

    if !parsed.scheme().eq_ignore_ascii_case(expected_scheme) {
        return Err(DiscoveryError::SchemeMismatch {
            expected: expected_scheme.to_string(),
            actual: parsed.scheme().to_string(),
        });
    }

    let host = parsed.host_str().unwrap_or_default();
    if !host.eq_ignore_ascii_case(SELECTION_HOST) {
        return Err(DiscoveryError::UnexpectedHost(host.to_string()));
    }

    let payload = parsed
        .query_pairs()
        .find(|(key, _)| key == DEVICES_PARAM)
        .map(|(_, value)| value.into_owned());

    match payload {
        None => Ok(Vec::new()),
        Some(encoded) => decode_candidates(&encoded),
    }
}

/// Build a device selection callback for `devices`.
pub fn selection_url(scheme: &str, devices: &[DeviceIdentity]) -> Result<String, DiscoveryError> {
    validate_scheme(scheme)?;
    let json = serde_json::to_vec(devices)
        .map_err(|e| DiscoveryError::InvalidPayload(format!("json encode: {}", e)))?;
    Ok(format!(
        "{}://{}?{}={}",
        scheme,
        SELECTION_HOST,
        DEVICES_PARAM,
        URL_SAFE_NO_PAD.encode(json)
    ))
}

fn decode_candidates(encoded: &str) -> Result<Vec<DeviceIdentity>, DiscoveryError> {
    let json_bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|e| DiscoveryError::InvalidPayload(format!("base64 decode: {}", e)))?;

    let devices: Vec<DeviceIdentity> = serde_json::from_slice(&json_bytes)
        .map_err(|e| DiscoveryError::InvalidPayload(format!("json parse: {}", e)))?;

    for (index, device) in devices.iter().enumerate() {
        device
            .validate()
            .map_err(|e| DiscoveryError::InvalidPayload(format!("candidate {}: {}", index, e)))?;
    }

    Ok(devices)
}
