//! Frame types and classification for Termbridge's wire format.
//!
//! Every text frame on the wire is a JSON envelope with a `type`
//! discriminator:
//!
//! ```text
//! {"type": "ping", "id": 7}          ← control (heartbeat probe)
//! {"type": "pong", "id": 7}          ← control (heartbeat ack)
//! {"type": "output", "data": "..."}  ← application (opaque payload)
//! ```
//!
//! Only the two control types are interpreted here. Everything else is an
//! application payload: the proxy forwards or buffers the *original text*
//! unchanged, so classification never needs to understand the payload. It
//! only reads the discriminator.
//!
//! Classification is deliberately lenient: peers feed us whatever they
//! like, and a frame that fails to classify must degrade to a logged no-op,
//! never a panic. [`parse_frame`] returns `Err` for every malformed shape
//! and is total over arbitrary input strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// ControlFrame — the frames the proxy itself produces
// ---------------------------------------------------------------------------

/// A heartbeat control frame.
///
/// `#[serde(tag = "type")]` produces the internally tagged representation
/// (`{"type": "ping", "id": 7}`) rather than the externally tagged default,
/// matching what peers on the other end of the wire expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    /// Proxy → peer keepalive probe. The peer must echo the `id` back.
    Ping { id: u64 },
    /// Peer → proxy acknowledgment, echoing the probe's `id`.
    Pong { id: u64 },
}

impl ControlFrame {
    /// Serializes this control frame to its wire text.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

// ---------------------------------------------------------------------------
// Frame — the result of classifying an inbound text frame
// ---------------------------------------------------------------------------

/// What an inbound text frame turned out to be.
///
/// Application frames carry only their discriminator here; the caller keeps
/// the original text for forwarding or buffering, so there is nothing to
/// copy out of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A keepalive probe.
    Ping { id: u64 },
    /// A keepalive acknowledgment.
    Pong { id: u64 },
    /// Any non-control envelope. The payload is opaque to the proxy.
    Application { message_type: String },
}

/// Classifies a raw text frame against the envelope convention.
///
/// Total over arbitrary input: every malformed shape maps to a
/// [`ProtocolError`] variant, never a panic. The caller decides what to do
/// with the error; in practice, log a warning and drop the frame.
///
/// # Errors
/// - [`ProtocolError::Malformed`] — not JSON at all
/// - [`ProtocolError::NotAnObject`] — `null`, an array, or a bare scalar
/// - [`ProtocolError::MissingType`] / [`ProtocolError::InvalidType`] —
///   no usable `type` discriminator
/// - [`ProtocolError::MissingControlId`] — a `ping`/`pong` without an id
pub fn parse_frame(raw: &str) -> Result<Frame, ProtocolError> {
    let value: Value =
        serde_json::from_str(raw).map_err(ProtocolError::Malformed)?;

    let object = match &value {
        Value::Object(map) => map,
        Value::Null => return Err(ProtocolError::NotAnObject("null")),
        Value::Array(_) => return Err(ProtocolError::NotAnObject("an array")),
        Value::Bool(_) => {
            return Err(ProtocolError::NotAnObject("a boolean"));
        }
        Value::Number(_) => {
            return Err(ProtocolError::NotAnObject("a number"));
        }
        Value::String(_) => {
            return Err(ProtocolError::NotAnObject("a string"));
        }
    };

    let message_type = object
        .get("type")
        .ok_or(ProtocolError::MissingType)?
        .as_str()
        .ok_or(ProtocolError::InvalidType)?;

    match message_type {
        "ping" => {
            let id = control_id(object, "ping")?;
            Ok(Frame::Ping { id })
        }
        "pong" => {
            let id = control_id(object, "pong")?;
            Ok(Frame::Pong { id })
        }
        other => Ok(Frame::Application {
            message_type: other.to_string(),
        }),
    }
}

/// Extracts the numeric `id` a control frame must carry.
fn control_id(
    object: &serde_json::Map<String, Value>,
    kind: &'static str,
) -> Result<u64, ProtocolError> {
    object
        .get("id")
        .and_then(Value::as_u64)
        .ok_or(ProtocolError::MissingControlId(kind))
}

// =========================================================================
// Tests
// =========================================================================
