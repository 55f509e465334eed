//! Unified error type for Termbridge.

use termbridge_protocol::ProtocolError;
use termbridge_session::SessionError;
use termbridge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `termbridge` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate. The
/// `#[from]` attribute on each variant auto-generates `From` impls, so
/// the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TermbridgeError {
    /// A transport-level error (connect, send, close).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encoding or classifying frames).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (unknown id, invalid reattachment).
    #[error(transparent)]
    Session(#[from] SessionError),
}
