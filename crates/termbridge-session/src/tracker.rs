//! The per-session state machine: connection state, the outbound buffer,
//! and heartbeat bookkeeping.
//!
//! `SessionTracker` is the synchronous heart of a session. It owns every
//! piece of per-session state that is *not* an I/O resource: the
//! [`ConnectionState`], the FIFO message buffer, the [`BackoffPolicy`],
//! and the pending-ping ledger. It performs no I/O and owns no timers;
//! each transition method returns a disposition telling the caller (the
//! registry) what to do next: forward a frame, schedule a retry, tear the
//! session down.
//!
//! Keeping the machine synchronous keeps it exhaustively testable: every
//! transition in this file is covered without a runtime or a socket.

use std::collections::VecDeque;

use termbridge_protocol::{parse_frame, Frame};
use termbridge_transport::close_code;

use crate::backoff::BackoffPolicy;
use crate::session::{
    ConnectionState, HealthCheckConfig, OverflowPolicy, SessionId,
    SessionOptions,
};

// ---------------------------------------------------------------------------
// Dispositions
// ---------------------------------------------------------------------------

/// What the registry must do after a close (or health-timeout) event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Terminal: remove the session and report `Disconnected`.
    Finished,
    /// The session is now `Reconnecting`; fire a retry timer after
    /// `delay`.
    Retry { delay: std::time::Duration },
}

/// What the registry must do when a retry timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Attempts are exhausted: remove the session and report the
    /// terminal `Disconnected`.
    Exhausted,
    /// Still waiting for a reattachment; fire another timer after
    /// `delay`.
    Again { delay: std::time::Duration },
}

/// What became of a message handed to [`SessionTracker::handle_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDisposition {
    /// An application frame while connected: forward it over the live
    /// handle now.
    Forward,
    /// An application frame while disconnected: appended to the buffer.
    Buffered,
    /// A `pong` matching the outstanding ping: cancel the heartbeat
    /// deadline.
    PongMatched,
    /// Consumed with no action needed (control frames with nothing to
    /// match, malformed input, overflow-dropped messages).
    Ignored,
}

// ---------------------------------------------------------------------------
// SessionTracker
// ---------------------------------------------------------------------------

/// State machine for a single session.
///
/// Mutated only by the registry that owns it, from transport-event and
/// timer paths; it never sees concurrent access.
pub struct SessionTracker {
    id: SessionId,
    state: ConnectionState,
    reconnect: bool,
    buffer: VecDeque<String>,
    buffer_capacity: Option<usize>,
    overflow: OverflowPolicy,
    policy: BackoffPolicy,
    health_check: HealthCheckConfig,
    /// Id of the ping awaiting its pong, if any. While set, heartbeat
    /// ticks do not issue a new ping: the outstanding one must be
    /// answered or time out first.
    pending_ping_id: Option<u64>,
    /// Monotonically increasing ping counter. Ids are never reused, so a
    /// stale pong can never be misattributed to a later ping.
    next_ping_id: u64,
}

impl SessionTracker {
    /// Creates a tracker in the `Connected` state.
    pub fn new(id: SessionId, options: &SessionOptions) -> Self {
        Self {
            id,
            state: ConnectionState::Connected,
            reconnect: options.reconnect,
            buffer: VecDeque::new(),
            buffer_capacity: options.buffer_capacity,
            overflow: options.overflow,
            policy: BackoffPolicy::new(options.backoff.clone()),
            health_check: options.health_check,
            pending_ping_id: None,
            next_ping_id: 0,
        }
    }

    /// The session's id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of messages waiting for a live handle.
    pub fn buffered_count(&self) -> usize {
        self.buffer.len()
    }

    /// Reconnection attempts recorded since the last successful attach.
    pub fn attempts(&self) -> u32 {
        self.policy.attempts()
    }

    /// The session's heartbeat configuration.
    pub fn health_check(&self) -> &HealthCheckConfig {
        &self.health_check
    }

    // -- Close / retry / reattach -----------------------------------------

    /// Handles the transport closing (or being declared stale).
    ///
    /// `code` is the close code when the trigger was an actual close
    /// frame; health-check timeouts pass `None`. A normal closure, a
    /// session without reconnection, or an exhausted policy all end the
    /// session; anything else enters `Reconnecting` with a retry delay.
    pub fn handle_close(
        &mut self,
        code: Option<u16>,
        reason: &str,
    ) -> CloseDisposition {
        self.pending_ping_id = None;

        let normal = code == Some(close_code::NORMAL);
        if normal || !self.reconnect || !self.policy.should_retry() {
            self.state = ConnectionState::Disconnected;
            tracing::debug!(
                session_id = %self.id,
                code,
                reason,
                "connection closed, session finished"
            );
            CloseDisposition::Finished
        } else {
            self.state = ConnectionState::Reconnecting;
            let delay = self.policy.next_delay();
            tracing::debug!(
                session_id = %self.id,
                code,
                reason,
                delay_ms = delay.as_millis() as u64,
                "connection lost, awaiting reattachment"
            );
            CloseDisposition::Retry { delay }
        }
    }

    /// Advances the retry clock: records the elapsed attempt and decides
    /// whether to keep waiting.
    pub fn retry_tick(&mut self) -> RetryDisposition {
        self.policy.record_attempt();

        if self.policy.should_retry() {
            RetryDisposition::Again {
                delay: self.policy.next_delay(),
            }
        } else {
            self.state = ConnectionState::Disconnected;
            tracing::debug!(
                session_id = %self.id,
                attempts = self.policy.attempts(),
                "reconnection attempts exhausted"
            );
            RetryDisposition::Exhausted
        }
    }

    /// Accepts a replacement transport handle: back to `Connected`, the
    /// backoff forgotten. Returns the buffered messages, oldest first,
    /// for the caller to replay over the new handle.
    pub fn reattach(&mut self) -> Vec<String> {
        self.state = ConnectionState::Connected;
        self.policy.reset();
        self.pending_ping_id = None;
        self.buffer.drain(..).collect()
    }

    /// Returns messages that failed to replay to the front of the buffer,
    /// preserving their original order ahead of anything buffered since.
    pub fn requeue_front(&mut self, messages: Vec<String>) {
        for message in messages.into_iter().rev() {
            self.buffer.push_front(message);
        }
    }

    // -- Messages ----------------------------------------------------------

    /// Classifies a raw text frame and applies the buffering rules.
    ///
    /// Never fails, whatever the input: malformed frames are logged and
    /// reported as [`MessageDisposition::Ignored`].
    pub fn handle_message(&mut self, raw: &str) -> MessageDisposition {
        let frame = match parse_frame(raw) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(
                    session_id = %self.id,
                    %error,
                    "ignoring unclassifiable frame"
                );
                return MessageDisposition::Ignored;
            }
        };

        match frame {
            Frame::Ping { id } => {
                // Keepalive probes are proxy → peer; one arriving here is
                // consumed without effect.
                tracing::trace!(
                    session_id = %self.id,
                    ping_id = id,
                    "ping frame consumed"
                );
                MessageDisposition::Ignored
            }
            Frame::Pong { id } => {
                if self.match_pong(id) {
                    MessageDisposition::PongMatched
                } else {
                    MessageDisposition::Ignored
                }
            }
            Frame::Application { message_type } => {
                if self.state == ConnectionState::Connected {
                    tracing::trace!(
                        session_id = %self.id,
                        message_type,
                        "forwarding application frame"
                    );
                    MessageDisposition::Forward
                } else if self.push_buffered(raw) {
                    MessageDisposition::Buffered
                } else {
                    MessageDisposition::Ignored
                }
            }
        }
    }

    /// Appends a message to the buffer, applying the capacity policy.
    /// Returns `false` when the incoming message was dropped instead.
    fn push_buffered(&mut self, raw: &str) -> bool {
        if let Some(capacity) = self.buffer_capacity {
            if self.buffer.len() >= capacity {
                match self.overflow {
                    OverflowPolicy::DropOldest => {
                        self.buffer.pop_front();
                        tracing::warn!(
                            session_id = %self.id,
                            capacity,
                            "buffer full, evicted oldest message"
                        );
                    }
                    OverflowPolicy::DropNewest => {
                        tracing::warn!(
                            session_id = %self.id,
                            capacity,
                            "buffer full, dropping incoming message"
                        );
                        return false;
                    }
                }
            }
        }
        self.buffer.push_back(raw.to_string());
        true
    }

    // -- Heartbeat ---------------------------------------------------------

    /// Starts a heartbeat probe: allocates the next ping id and marks it
    /// pending. Returns `None` while a previous ping is still
    /// unanswered; its deadline must resolve first.
    pub fn start_ping(&mut self) -> Option<u64> {
        if self.pending_ping_id.is_some() {
            return None;
        }
        self.next_ping_id += 1;
        self.pending_ping_id = Some(self.next_ping_id);
        Some(self.next_ping_id)
    }

    /// Tries to match a `pong` against the outstanding ping. On a match
    /// the pending id is cleared and the caller should cancel the
    /// deadline timer.
    pub fn match_pong(&mut self, id: u64) -> bool {
        if self.pending_ping_id == Some(id) {
            self.pending_ping_id = None;
            tracing::trace!(
                session_id = %self.id,
                ping_id = id,
                "pong matched"
            );
            true
        } else {
            tracing::debug!(
                session_id = %self.id,
                pong_id = id,
                pending = ?self.pending_ping_id,
                "ignoring unmatched pong"
            );
            false
        }
    }

    /// Whether a deadline firing for `ping_id` means the connection is
    /// stale: true only while that exact ping is still unanswered.
    pub fn deadline_elapsed(&self, ping_id: u64) -> bool {
        self.pending_ping_id == Some(ping_id)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for the session state machine.
    //!
    //! Naming convention: `test_{method}_{scenario}_{expected}`.
    //!
    //! Time never passes here: retry delays come back as values and the
    //! retry clock is advanced by calling `retry_tick()` directly, which
    //! keeps every transition deterministic.

    use std::time::Duration;

    use super::*;
    use crate::backoff::BackoffConfig;

    // -- Helpers ----------------------------------------------------------

    fn sid() -> SessionId {
        SessionId::new("session-1")
    }

    /// Options with reconnection on and jitter off, so retry delays are
    /// exact.
    fn reconnect_options() -> SessionOptions {
        SessionOptions {
            reconnect: true,
            backoff: BackoffConfig {
                jitter: Duration::ZERO,
                ..BackoffConfig::default()
            },
            ..SessionOptions::default()
        }
    }

    fn reconnect_tracker() -> SessionTracker {
        SessionTracker::new(sid(), &reconnect_options())
    }

    /// Drives the tracker into `Reconnecting`.
    fn lost_tracker() -> SessionTracker {
        let mut tracker = reconnect_tracker();
        let disposition = tracker.handle_close(Some(1006), "gone");
        assert!(matches!(disposition, CloseDisposition::Retry { .. }));
        tracker
    }

    const APP_FRAME: &str = r#"{"type":"input","data":"ls"}"#;

    // =====================================================================
    // new()
    // =====================================================================

    #[test]
    fn test_new_tracker_starts_connected_and_empty() {
        let tracker = reconnect_tracker();
        assert_eq!(tracker.state(), ConnectionState::Connected);
        assert_eq!(tracker.buffered_count(), 0);
        assert_eq!(tracker.attempts(), 0);
    }

    // =====================================================================
    // handle_close()
    // =====================================================================

    #[test]
    fn test_handle_close_normal_code_finishes_despite_reconnect() {
        let mut tracker = reconnect_tracker();

        let disposition = tracker.handle_close(Some(1000), "done");

        assert_eq!(disposition, CloseDisposition::Finished);
        assert_eq!(tracker.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_handle_close_abnormal_without_reconnect_finishes() {
        let mut tracker =
            SessionTracker::new(sid(), &SessionOptions::default());

        let disposition = tracker.handle_close(Some(1006), "gone");

        assert_eq!(disposition, CloseDisposition::Finished);
        assert_eq!(tracker.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_handle_close_abnormal_with_reconnect_retries() {
        let mut tracker = reconnect_tracker();

        let disposition = tracker.handle_close(Some(1006), "gone");

        assert_eq!(
            disposition,
            CloseDisposition::Retry {
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(tracker.state(), ConnectionState::Reconnecting);
    }

    #[test]
    fn test_handle_close_exhausted_policy_finishes_immediately() {
        let mut tracker = SessionTracker::new(
            sid(),
            &SessionOptions {
                backoff: BackoffConfig {
                    max_attempts: Some(0),
                    ..BackoffConfig::default()
                },
                ..reconnect_options()
            },
        );

        let disposition = tracker.handle_close(Some(1006), "gone");

        assert_eq!(disposition, CloseDisposition::Finished);
    }

    #[test]
    fn test_handle_close_without_code_follows_abnormal_path() {
        // Health-check timeouts close without a code; they reconnect like
        // any abnormal close.
        let mut tracker = reconnect_tracker();

        let disposition = tracker.handle_close(None, "health check timeout");

        assert!(matches!(disposition, CloseDisposition::Retry { .. }));
        assert_eq!(tracker.state(), ConnectionState::Reconnecting);
    }

    #[test]
    fn test_handle_close_clears_pending_ping() {
        let mut tracker = reconnect_tracker();
        let ping_id = tracker.start_ping().expect("first ping");

        tracker.handle_close(Some(1006), "gone");

        assert!(!tracker.deadline_elapsed(ping_id));
    }

    // =====================================================================
    // retry_tick()
    // =====================================================================

    #[test]
    fn test_retry_tick_unbounded_keeps_rescheduling_with_growth() {
        let mut tracker = lost_tracker();

        let mut expected = Duration::from_secs(2);
        for _ in 0..4 {
            match tracker.retry_tick() {
                RetryDisposition::Again { delay } => {
                    assert_eq!(delay, expected);
                }
                RetryDisposition::Exhausted => {
                    panic!("unbounded policy must not exhaust")
                }
            }
            expected *= 2;
        }
        assert_eq!(tracker.state(), ConnectionState::Reconnecting);
    }

    #[test]
    fn test_retry_tick_exhausts_at_attempt_limit() {
        let mut tracker = SessionTracker::new(
            sid(),
            &SessionOptions {
                backoff: BackoffConfig {
                    jitter: Duration::ZERO,
                    max_attempts: Some(2),
                    ..BackoffConfig::default()
                },
                reconnect: true,
                ..SessionOptions::default()
            },
        );
        tracker.handle_close(Some(1006), "gone");

        assert!(matches!(
            tracker.retry_tick(),
            RetryDisposition::Again { .. }
        ));
        assert_eq!(tracker.retry_tick(), RetryDisposition::Exhausted);
        assert_eq!(tracker.state(), ConnectionState::Disconnected);
    }

    // =====================================================================
    // reattach() / requeue_front()
    // =====================================================================

    #[test]
    fn test_reattach_returns_buffer_in_fifo_order() {
        let mut tracker = lost_tracker();
        for data in ["a", "b", "c"] {
            let frame = format!(r#"{{"type":"input","data":"{data}"}}"#);
            assert_eq!(
                tracker.handle_message(&frame),
                MessageDisposition::Buffered
            );
        }

        let drained = tracker.reattach();

        assert_eq!(tracker.state(), ConnectionState::Connected);
        assert_eq!(tracker.buffered_count(), 0);
        assert_eq!(drained.len(), 3);
        assert!(drained[0].contains("\"a\""), "oldest message first");
        assert!(drained[1].contains("\"b\""));
        assert!(drained[2].contains("\"c\""));
    }

    #[test]
    fn test_reattach_resets_backoff() {
        let mut tracker = lost_tracker();
        tracker.retry_tick();
        tracker.retry_tick();
        assert_eq!(tracker.attempts(), 2);

        tracker.reattach();

        assert_eq!(tracker.attempts(), 0);
        // The next disconnect starts from the initial delay again.
        let disposition = tracker.handle_close(Some(1006), "gone again");
        assert_eq!(
            disposition,
            CloseDisposition::Retry {
                delay: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn test_requeue_front_preserves_original_order() {
        let mut tracker = lost_tracker();
        tracker.handle_message(r#"{"type":"input","data":"later"}"#);

        tracker.requeue_front(vec![
            r#"{"type":"input","data":"first"}"#.to_string(),
            r#"{"type":"input","data":"second"}"#.to_string(),
        ]);

        let drained = tracker.reattach();
        assert!(drained[0].contains("first"));
        assert!(drained[1].contains("second"));
        assert!(drained[2].contains("later"));
    }

    // =====================================================================
    // handle_message()
    // =====================================================================

    #[test]
    fn test_handle_message_forwards_while_connected() {
        let mut tracker = reconnect_tracker();

        assert_eq!(
            tracker.handle_message(APP_FRAME),
            MessageDisposition::Forward
        );
        assert_eq!(tracker.buffered_count(), 0);
    }

    #[test]
    fn test_handle_message_buffers_while_reconnecting() {
        let mut tracker = lost_tracker();

        for expected in 1..=3 {
            assert_eq!(
                tracker.handle_message(APP_FRAME),
                MessageDisposition::Buffered
            );
            assert_eq!(tracker.buffered_count(), expected);
        }
    }

    #[test]
    fn test_handle_message_malformed_is_ignored_everywhere() {
        // None of these may panic or land in the buffer, in any state.
        let hostile = [
            "not valid json {{{",
            "null",
            "[1,2,3]",
            r#""just a string""#,
            "42",
            r#"{"no_type":1}"#,
            r#"{"type":7}"#,
            r#"{"type":"ping"}"#,
            "",
        ];

        let mut connected = reconnect_tracker();
        let mut lost = lost_tracker();
        for raw in hostile {
            assert_eq!(
                connected.handle_message(raw),
                MessageDisposition::Ignored,
                "connected tracker must ignore {raw:?}"
            );
            assert_eq!(
                lost.handle_message(raw),
                MessageDisposition::Ignored,
                "reconnecting tracker must ignore {raw:?}"
            );
        }
        assert_eq!(lost.buffered_count(), 0);
    }

    #[test]
    fn test_handle_message_controls_are_never_buffered() {
        let mut tracker = lost_tracker();

        tracker.handle_message(r#"{"type":"ping","id":1}"#);
        tracker.handle_message(r#"{"type":"pong","id":1}"#);

        assert_eq!(tracker.buffered_count(), 0);
    }

    #[test]
    fn test_handle_message_matching_pong_clears_pending() {
        let mut tracker = reconnect_tracker();
        let ping_id = tracker.start_ping().expect("ping");

        let disposition = tracker
            .handle_message(&format!(r#"{{"type":"pong","id":{ping_id}}}"#));

        assert_eq!(disposition, MessageDisposition::PongMatched);
        assert!(!tracker.deadline_elapsed(ping_id));
    }

    #[test]
    fn test_handle_message_stale_pong_is_ignored() {
        let mut tracker = reconnect_tracker();
        let ping_id = tracker.start_ping().expect("ping");

        let disposition =
            tracker.handle_message(r#"{"type":"pong","id":999}"#);

        assert_eq!(disposition, MessageDisposition::Ignored);
        assert!(
            tracker.deadline_elapsed(ping_id),
            "the real ping must stay pending"
        );
    }

    // =====================================================================
    // Buffer capacity
    // =====================================================================

    #[test]
    fn test_push_buffered_drop_oldest_evicts_head() {
        let mut tracker = SessionTracker::new(
            sid(),
            &SessionOptions {
                buffer_capacity: Some(2),
                overflow: OverflowPolicy::DropOldest,
                ..reconnect_options()
            },
        );
        tracker.handle_close(Some(1006), "gone");

        tracker.handle_message(r#"{"type":"input","data":"one"}"#);
        tracker.handle_message(r#"{"type":"input","data":"two"}"#);
        tracker.handle_message(r#"{"type":"input","data":"three"}"#);

        assert_eq!(tracker.buffered_count(), 2);
        let drained = tracker.reattach();
        assert!(drained[0].contains("two"), "oldest was evicted");
        assert!(drained[1].contains("three"));
    }

    #[test]
    fn test_push_buffered_drop_newest_keeps_head() {
        let mut tracker = SessionTracker::new(
            sid(),
            &SessionOptions {
                buffer_capacity: Some(2),
                overflow: OverflowPolicy::DropNewest,
                ..reconnect_options()
            },
        );
        tracker.handle_close(Some(1006), "gone");

        tracker.handle_message(r#"{"type":"input","data":"one"}"#);
        tracker.handle_message(r#"{"type":"input","data":"two"}"#);
        let disposition =
            tracker.handle_message(r#"{"type":"input","data":"three"}"#);

        assert_eq!(disposition, MessageDisposition::Ignored);
        assert_eq!(tracker.buffered_count(), 2);
        let drained = tracker.reattach();
        assert!(drained[0].contains("one"));
        assert!(drained[1].contains("two"));
    }

    // =====================================================================
    // Heartbeat bookkeeping
    // =====================================================================

    #[test]
    fn test_start_ping_allocates_monotonic_ids() {
        let mut tracker = reconnect_tracker();

        let first = tracker.start_ping().expect("first ping");
        tracker.match_pong(first);
        let second = tracker.start_ping().expect("second ping");

        assert!(second > first, "ping ids must increase");
    }

    #[test]
    fn test_start_ping_refuses_while_outstanding() {
        let mut tracker = reconnect_tracker();
        let ping_id = tracker.start_ping().expect("first ping");

        assert_eq!(tracker.start_ping(), None);
        assert!(tracker.deadline_elapsed(ping_id));
    }

    #[test]
    fn test_match_pong_only_matches_pending_id() {
        let mut tracker = reconnect_tracker();
        let ping_id = tracker.start_ping().expect("ping");

        assert!(!tracker.match_pong(ping_id + 1));
        assert!(tracker.match_pong(ping_id));
        // A second identical pong has nothing left to match.
        assert!(!tracker.match_pong(ping_id));
    }

    #[test]
    fn test_deadline_elapsed_false_after_pong() {
        let mut tracker = reconnect_tracker();
        let ping_id = tracker.start_ping().expect("ping");
        tracker.match_pong(ping_id);

        assert!(!tracker.deadline_elapsed(ping_id));
    }
}
