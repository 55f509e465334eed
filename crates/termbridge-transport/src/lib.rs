//! Transport abstraction layer for Termbridge.
//!
//! Provides the [`TransportHandle`] trait: the capability interface the
//! session proxy drives (`send`, `close`, and an event stream). Concrete
//! transports adapt to it; the proxy never touches a socket type directly.
//!
//! A handle is supplied to the proxy already connected. The proxy "attaches
//! listeners" by pumping [`TransportHandle::next_event`] from a reader task,
//! and "detaches" by aborting that task; there is no callback registration
//! to leak.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket adapter via `tokio-tungstenite`

use std::future::Future;

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::WebSocketHandle;

/// Well-known close codes (the WebSocket registry's numbering, which the
/// envelope convention reuses for every transport).
pub mod close_code {
    /// Clean, intentional shutdown. A session closed with this code is
    /// never reconnected.
    pub const NORMAL: u16 = 1000;

    /// The peer is going away (e.g., a browser tab navigating off).
    pub const GOING_AWAY: u16 = 1001;

    /// The connection dropped without a close frame. Synthesized locally
    /// when the stream ends unannounced.
    pub const ABNORMAL: u16 = 1006;
}

/// A close event's code and human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// Close code (see [`close_code`]).
    pub code: u16,
    /// Free-form reason supplied by whoever closed the connection.
    pub reason: String,
}

impl CloseFrame {
    /// Creates a close frame.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Whether this close represents a clean, intentional shutdown.
    /// Everything else is treated as abnormal and eligible for
    /// reconnection.
    pub fn is_normal(&self) -> bool {
        self.code == close_code::NORMAL
    }
}

/// Something that happened on a live transport handle.
#[derive(Debug)]
pub enum TransportEvent {
    /// A text frame arrived from the peer.
    Message(String),

    /// The peer closed the connection (or the closure was detected
    /// locally). Delivered at most once; the event stream ends after it.
    Close(CloseFrame),

    /// A transport-level fault. Does not by itself end the stream; a
    /// `Close` (or stream end) follows when the connection actually dies.
    Error(TransportError),
}

/// A live bidirectional connection carrying text frames.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` — handles are owned by the session registry
///   and shared with its reader and timer tasks, which Tokio may run on
///   any thread.
/// - The returned futures carry an explicit `Send` bound (the desugared
///   form of `async fn`) because the registry spawns tasks that are
///   generic over the handle type; implementations still just write
///   `async fn`.
pub trait TransportHandle: Send + Sync + 'static {
    /// Sends a text frame to the peer.
    fn send(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Closes the connection with the given code and reason.
    fn close(
        &self,
        code: u16,
        reason: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next event from the peer.
    ///
    /// Returns `None` once the underlying stream is exhausted. Callers that
    /// never saw a [`TransportEvent::Close`] before `None` should treat the
    /// stream end as an abnormal closure ([`close_code::ABNORMAL`]).
    fn next_event(&self) -> impl Future<Output = Option<TransportEvent>> + Send;
}
