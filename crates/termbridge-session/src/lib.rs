//! Session management for Termbridge.
//!
//! This crate holds everything a session *is*, without any I/O:
//!
//! 1. **Backoff** — reconnection pacing ([`BackoffPolicy`]), a pure
//!    calculator of retry delays and retry eligibility.
//! 2. **Session types** — identity ([`SessionId`]), connection state
//!    ([`ConnectionState`]), and per-session configuration
//!    ([`SessionOptions`]).
//! 3. **The state machine** — [`SessionTracker`], which applies every
//!    transition rule (close handling, retry pacing, buffering,
//!    heartbeat matching) synchronously and tells its caller what to do
//!    through disposition values.
//!
//! # How it fits in the stack
//!
//! ```text
//! Proxy layer (above)  ← owns the registry, timers, and live handles
//!     ↕
//! Session layer (this crate)  ← connection state, buffer, backoff
//!     ↕
//! Protocol layer (below)  ← frame classification
//! ```

mod backoff;
mod error;
mod session;
mod tracker;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use error::SessionError;
pub use session::{
    CloseCallback, ConnectionState, ErrorCallback, HealthCheckConfig,
    MessageCallback, OverflowPolicy, SessionId, SessionOptions, StateDetail,
};
pub use tracker::{
    CloseDisposition, MessageDisposition, RetryDisposition, SessionTracker,
};
