//! # Termbridge
//!
//! Resilient terminal-session proxy: one bidirectional streaming
//! connection per client session, with disconnect detection, message
//! buffering while disconnected, exponential-backoff reconnection pacing,
//! and heartbeat liveness monitoring.
//!
//! The [`SessionProxy`] is the entry point. Hand it a connected transport
//! handle and per-session options; it owns the session from there:
//!
//! ```no_run
//! use termbridge::prelude::*;
//!
//! # async fn example() -> Result<(), TermbridgeError> {
//! let proxy = SessionProxy::new();
//!
//! let token = proxy.subscribe(std::sync::Arc::new(|id, state, _detail| {
//!     println!("session {id} is now {state}");
//! }));
//!
//! let socket = WebSocketHandle::connect("ws://127.0.0.1:8080").await?;
//! let session_id = proxy
//!     .create_session(
//!         socket,
//!         SessionOptions {
//!             reconnect: true,
//!             ..SessionOptions::default()
//!         },
//!     )
//!     .await;
//!
//! proxy
//!     .handle_message(&session_id, r#"{"type":"input","data":"ls"}"#)
//!     .await;
//!
//! proxy.unsubscribe(token);
//! # Ok(())
//! # }
//! ```

mod error;
mod proxy;

pub use error::TermbridgeError;
pub use proxy::{SessionProxy, StateCallback, SubscriptionToken};

/// Everything a typical consumer of the proxy needs in scope.
pub mod prelude {
    pub use crate::{
        SessionProxy, StateCallback, SubscriptionToken, TermbridgeError,
    };
    pub use termbridge_protocol::{
        parse_frame, ControlFrame, Frame, ProtocolError,
    };
    pub use termbridge_session::{
        BackoffConfig, BackoffPolicy, CloseCallback, ConnectionState,
        ErrorCallback, HealthCheckConfig, MessageCallback, OverflowPolicy,
        SessionError, SessionId, SessionOptions, StateDetail,
    };
    pub use termbridge_transport::{
        close_code, CloseFrame, TransportError, TransportEvent,
        TransportHandle, WebSocketHandle,
    };
}
