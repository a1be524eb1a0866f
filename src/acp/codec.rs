//! Tolerant frame codec for ACP socket traffic.
//!
//! A single socket frame may carry one JSON object, one Server-Sent-Events
//! `data:` line, or several newline-delimited JSON objects. [`decode_frame`]
//! tries each framing in turn and never fails: frames that match none of them
//! are logged and dropped.
//!
//! # Fallback order
//!
//! 1. The whole frame as one JSON object with a `type` field.
//! 2. The frame minus a leading `data: ` prefix (SSE).
//! 3. Each non-blank line of the frame, independently (NDJSON). Lines may
//!    themselves carry the `data: ` prefix.
//!
//! Frame size is bounded by the transport, not here.

use tracing::{debug, warn};

use crate::acp::message::ProtocolMessage;
use crate::{AppError, Result};

/// Prefix marking an SSE data line.
pub const SSE_DATA_PREFIX: &str = "data: ";

/// Decode one raw frame into zero or more protocol messages.
///
/// Never fails: undecodable frames yield an empty vector and a `WARN` log.
#[must_use]
pub fn decode_frame(frame: &str) -> Vec<ProtocolMessage> {
    if frame.trim().is_empty() {
        return Vec::new();
    }

    if let Ok(message) = parse_object(frame) {
        return vec![message];
    }

    if let Some(payload) = frame.strip_prefix(SSE_DATA_PREFIX) {
        if let Ok(message) = parse_object(payload.trim_end()) {
            return vec![message];
        }
    }

    if frame.contains('\n') {
        let messages: Vec<ProtocolMessage> = frame
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match parse_line(line) {
                Ok(message) => Some(message),
                Err(e) => {
                    debug!(error = %e, line, "acp codec: skipping undecodable line");
                    None
                }
            })
            .collect();
        if !messages.is_empty() {
            return messages;
        }
    }

    warn!(frame, "acp codec: unparseable frame, dropping");
    Vec::new()
}

/// Serialize a message into a single-line JSON text frame.
///
/// # Errors
///
/// Returns [`AppError::Decode`] if the message cannot be serialized.
pub fn encode_message(message: &ProtocolMessage) -> Result<String> {
    serde_json::to_string(message)
        .map_err(|e| AppError::Decode(format!("failed to serialise outbound message: {e}")))
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Parse one NDJSON line, accepting an optional SSE prefix.
fn parse_line(line: &str) -> Result<ProtocolMessage> {
    match line.strip_prefix(SSE_DATA_PREFIX) {
        Some(payload) => parse_object(payload),
        None => parse_object(line),
    }
}

/// Parse `text` as exactly one typed JSON object.
fn parse_object(text: &str) -> Result<ProtocolMessage> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| AppError::Decode(format!("malformed json: {e}")))?;
    ProtocolMessage::from_value(value)
}
