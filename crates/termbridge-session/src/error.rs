//! Error types for the session layer.

use crate::session::SessionId;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given id. Sessions disappear on explicit
    /// destruction and on terminal disconnection, so callers holding an
    /// old id can hit this at any time.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// The session already has a live transport handle. A session holds
    /// at most one; reattachment is only valid while reconnecting.
    #[error("session {0} already has a live transport handle")]
    AlreadyAttached(SessionId),
}
