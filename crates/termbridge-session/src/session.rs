//! Session types: identity, state, and per-session configuration.
//!
//! A "session" is one logical terminal stream between a client and the
//! backend, identified by an opaque id. It outlives any single transport
//! handle: the handle can drop and be replaced while the session (and its
//! buffered traffic) stays put.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use termbridge_transport::TransportError;

use crate::backoff::BackoffConfig;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Opaque identifier for a session.
///
/// Callers may supply their own id (any non-empty string) or let the proxy
/// generate one. Ids are unique within a registry; the id survives
/// disconnects and reattachments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an externally chosen id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random 32-character hex id (128 bits of entropy),
    /// enough that collisions are not a practical concern.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let bytes: [u8; 16] = rng.random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// The current state of a session's transport connection.
///
/// This is a state machine with three states:
///
/// ```text
///   Connected ──(abnormal close / health timeout)──→ Reconnecting
///       │  ↑                                            │
///       │  └──────────────(reattach)────────────────────┤
///       │                                               │ (attempts
///       │ (normal close / reconnect off)                │  exhausted)
///       └────────────────→ Disconnected ←───────────────┘
/// ```
///
/// `Disconnected` is terminal: the session is removed from the registry
/// and observers receive the final close detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// A live transport handle is attached; traffic flows immediately.
    Connected,

    /// The handle is gone but the session is waiting for a replacement.
    /// Outbound application messages are buffered meanwhile.
    Reconnecting,

    /// Terminal. No handle, no retries left (or none were wanted).
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// StateDetail
// ---------------------------------------------------------------------------

/// Diagnostic payload attached to a state-change notification.
///
/// Close transitions carry the close code and reason; health-check
/// timeouts and retry exhaustion carry only a reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDetail {
    /// Transport close code, when the transition came from a close event.
    pub code: Option<u16>,
    /// Human-readable description of what happened.
    pub reason: Option<String>,
}

impl StateDetail {
    /// Detail for a close event.
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: Some(reason.into()),
        }
    }

    /// Detail carrying only a reason (health timeout, retry exhaustion).
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: Some(reason.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// HealthCheckConfig
// ---------------------------------------------------------------------------

/// Heartbeat configuration for one session.
///
/// When enabled, the proxy sends a `ping` frame every `interval` and
/// expects the matching `pong` within `timeout`. A ping that goes
/// unanswered past its deadline marks the connection stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckConfig {
    /// Whether heartbeats run at all. Default: disabled.
    pub enabled: bool,

    /// Gap between pings. Default: 30 seconds.
    pub interval: Duration,

    /// How long a ping may stay unanswered. Default: 10 seconds.
    pub timeout: Duration,
}

impl HealthCheckConfig {
    /// An enabled heartbeat with the given cadence.
    pub fn enabled(interval: Duration, timeout: Duration) -> Self {
        Self {
            enabled: true,
            interval,
            timeout,
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// OverflowPolicy
// ---------------------------------------------------------------------------

/// What to do when a bounded buffer is full and another message arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest buffered message to make room. The replayed
    /// stream stays current at the cost of its oldest entries.
    #[default]
    DropOldest,

    /// Drop the incoming message. The replayed stream keeps its oldest
    /// entries at the cost of recency.
    DropNewest,
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// Invoked when the session's transport closes: `(code, reason)`.
pub type CloseCallback = Arc<dyn Fn(u16, &str) + Send + Sync>;

/// Invoked on transport-level errors. Errors never change session state
/// by themselves; the close that usually follows does.
pub type ErrorCallback = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Invoked with the raw text of inbound application frames, the surface a
/// forwarding layer consumes. Control frames never reach it.
pub type MessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

// ---------------------------------------------------------------------------
// SessionOptions
// ---------------------------------------------------------------------------

/// Per-session configuration, supplied at creation time.
///
/// The defaults give a one-shot session: no reconnection, no heartbeat,
/// unbounded buffer. Enable what the deployment needs:
///
/// ```
/// use std::time::Duration;
/// use termbridge_session::{HealthCheckConfig, SessionOptions};
///
/// let options = SessionOptions {
///     reconnect: true,
///     health_check: HealthCheckConfig::enabled(
///         Duration::from_secs(15),
///         Duration::from_secs(5),
///     ),
///     ..SessionOptions::default()
/// };
/// # let _ = options;
/// ```
#[derive(Clone, Default)]
pub struct SessionOptions {
    /// Explicit session id. Generated when absent. Creating a session
    /// with the id of an existing one supersedes it.
    pub id: Option<SessionId>,

    /// Whether an abnormal close starts the reconnection lifecycle.
    /// Default: `false`, meaning any close is terminal.
    pub reconnect: bool,

    /// Reconnection pacing, including the attempt limit.
    pub backoff: BackoffConfig,

    /// Heartbeat liveness probing.
    pub health_check: HealthCheckConfig,

    /// Maximum buffered messages while disconnected. `None` (default) is
    /// unbounded; bound it when peers may stay away indefinitely.
    pub buffer_capacity: Option<usize>,

    /// Eviction behavior once `buffer_capacity` is reached.
    pub overflow: OverflowPolicy,

    /// Called when the transport closes, with the close code and reason.
    pub on_close: Option<CloseCallback>,

    /// Called on transport-level errors.
    pub on_error: Option<ErrorCallback>,

    /// Called with inbound application frames from the transport.
    pub on_message: Option<MessageCallback>,
}

// =========================================================================
// Tests
// =========================================================================
