//! Encode/decode for the `jsonb` telemetry columns on `bug`.
//!
//! Each column has one explicit pair. Decoding validates the shape and
//! reports a [`Error::Serialization`] naming the column, so a bad row is
//! surfaced instead of silently read as empty.

use serde_json::Value as JsonValue;

use bugscope_core::{ConsoleLogEntry, Error, NetworkErrorEntry, Result, TelemetryLog, Viewport};

pub fn encode_viewport(viewport: &Viewport) -> Result<JsonValue> {
    Ok(serde_json::to_value(viewport)?)
}

pub fn decode_viewport(value: JsonValue) -> Result<Viewport> {
    serde_json::from_value(value)
        .map_err(|e| Error::Serialization(format!("bug.viewport: {}", e)))
}

/// Empty logs are stored as SQL `NULL`.
pub fn encode_console_logs(logs: &TelemetryLog<ConsoleLogEntry>) -> Result<Option<JsonValue>> {
    if logs.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_value(logs)?))
}

pub fn decode_console_logs(value: Option<JsonValue>) -> Result<TelemetryLog<ConsoleLogEntry>> {
    match value {
        None | Some(JsonValue::Null) => Ok(TelemetryLog::new()),
        Some(v) => serde_json::from_value(v)
            .map_err(|e| Error::Serialization(format!("bug.console_logs: {}", e))),
    }
}

/// Empty lists are stored as SQL `NULL`.
pub fn encode_network_errors(
    errors: &TelemetryLog<NetworkErrorEntry>,
) -> Result<Option<JsonValue>> {
    if errors.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_value(errors)?))
}

pub fn decode_network_errors(
    value: Option<JsonValue>,
) -> Result<TelemetryLog<NetworkErrorEntry>> {
    match value {
        None | Some(JsonValue::Null) => Ok(TelemetryLog::new()),
        Some(v) => serde_json::from_value(v)
            .map_err(|e| Error::Serialization(format!("bug.network_errors: {}", e))),
    }
}
