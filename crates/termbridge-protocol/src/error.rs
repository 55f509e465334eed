//! Error types for the protocol layer.
//!
//! Each crate in Termbridge defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in the wire envelope, not in
//! networking or session bookkeeping.
//!
//! Every variant here describes a *recoverable* condition: a frame that
//! fails classification is logged and dropped by the caller, never
//! propagated as a panic.

/// Errors that can occur while encoding or classifying wire frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a control frame into text).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not valid JSON at all.
    ///
    /// Common causes: truncated output from the peer, binary noise, or a
    /// plain-text line that was never an envelope.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The frame parsed as JSON but is not an object.
    ///
    /// The envelope convention requires a top-level object carrying a
    /// `type` field; `null`, arrays, and bare scalars are all rejected.
    #[error("frame is not a JSON object (got {0})")]
    NotAnObject(&'static str),

    /// The frame is an object but has no `type` field.
    #[error("frame has no \"type\" field")]
    MissingType,

    /// The frame has a `type` field that is not a string.
    #[error("frame \"type\" is not a string")]
    InvalidType,

    /// A `ping`/`pong` control frame is missing its numeric `id`.
    ///
    /// Heartbeat frames are matched by id; one without an id can never be
    /// matched, so it is treated as malformed rather than guessed at.
    #[error("{0} frame is missing a numeric \"id\"")]
    MissingControlId(&'static str),
}
