//! Feed payload decoding.
//!
//! Platform payloads are JSON objects keyed by the feed's value label,
//! e.g. `{"sensor_reading": 17}`.  A payload that cannot be decoded is an
//! error for that one message only; the caller logs and skips it.

use twinflow_types::{Reading, TwinError};

/// Decode one raw payload into a [`Reading`] for the given value label.
///
/// Accepts any JSON number (integer or float) under `label`.
///
/// # Errors
///
/// Returns [`TwinError::Decode`] if the payload is not a JSON object, the
/// label is missing, or the value under it is not numeric.
pub fn decode_reading(raw: &[u8], label: &str) -> Result<Reading, TwinError> {
    let json: serde_json::Value = serde_json::from_slice(raw)
        .map_err(|e| TwinError::Decode(format!("invalid JSON payload: {e}")))?;

    let value = json
        .get(label)
        .ok_or_else(|| TwinError::Decode(format!("payload is missing value label '{label}'")))?;

    let value = value
        .as_f64()
        .ok_or_else(|| TwinError::Decode(format!("value under '{label}' is not numeric")))?;

    Ok(Reading {
        label: label.to_string(),
        value,
    })
}
