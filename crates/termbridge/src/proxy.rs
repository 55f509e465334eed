//! The session registry and proxy: owns every session, wires transport
//! events to state transitions, and drives the retry and heartbeat timers.
//!
//! The flow for one session:
//!   1. `create_session` stores a [`SessionTracker`] plus the live handle
//!      and spawns a reader task pumping the handle's events.
//!   2. Inbound events and outbound messages run through the tracker,
//!      which answers with a disposition; the proxy does the I/O.
//!   3. On an abnormal close the handle is dropped, a retry timer starts,
//!      and outbound traffic buffers until `reattach_session` supplies a
//!      replacement handle (or the attempts run out).
//!
//! # Concurrency note
//!
//! All per-session state lives behind one `tokio::sync::Mutex`, so every
//! transition is serialized: transport callbacks, timer callbacks, and
//! public operations never mutate a session concurrently. Reader, retry,
//! and heartbeat work runs on spawned tasks tracked per session; each is
//! aborted when the session is destroyed, superseded, or reattached.
//! A task spawned for an old handle re-checks, under the lock, that its
//! handle is still the session's current one before acting, so a straggler
//! can never drive transitions for a connection it no longer represents.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use termbridge_protocol::{parse_frame, ControlFrame, Frame};
use termbridge_session::{
    CloseCallback, CloseDisposition, ConnectionState, ErrorCallback,
    MessageCallback, MessageDisposition, RetryDisposition, SessionError,
    SessionId, SessionOptions, SessionTracker, StateDetail,
};
use termbridge_transport::{
    close_code, TransportError, TransportEvent, TransportHandle,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::TermbridgeError;

/// State-change observer: `(session_id, new_state, detail)`.
///
/// Invoked on every transition of every session. `detail` carries the
/// close code and/or reason for close, timeout, and teardown transitions.
pub type StateCallback =
    Arc<dyn Fn(&SessionId, ConnectionState, Option<&StateDetail>) + Send + Sync>;

/// Handle returned by [`SessionProxy::subscribe`]; pass it to
/// [`SessionProxy::unsubscribe`] to stop receiving notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

// ---------------------------------------------------------------------------
// Per-session bookkeeping
// ---------------------------------------------------------------------------

/// The spawned tasks serving one session. Aborting them is how listeners
/// and timers are "detached"; a task that is already finished aborts as
/// a no-op, so teardown can always abort the full set.
#[derive(Default)]
struct SessionTasks {
    /// Pumps `next_event` from the live handle.
    reader: Option<JoinHandle<()>>,
    /// Pending retry timer while `Reconnecting`.
    retry: Option<JoinHandle<()>>,
    /// Repeating heartbeat ping timer.
    ping: Option<JoinHandle<()>>,
    /// One-shot deadline for the outstanding ping.
    deadline: Option<JoinHandle<()>>,
}

impl SessionTasks {
    fn abort_all(&mut self) {
        for task in [
            self.reader.take(),
            self.retry.take(),
            self.ping.take(),
            self.deadline.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

struct SessionEntry<T: TransportHandle> {
    tracker: SessionTracker,
    /// The live transport handle. `None` while reconnecting or torn down.
    /// At most one handle is live per session at any time.
    handle: Option<Arc<T>>,
    on_close: Option<CloseCallback>,
    on_error: Option<ErrorCallback>,
    on_message: Option<MessageCallback>,
    tasks: SessionTasks,
}

impl<T: TransportHandle> SessionEntry<T> {
    /// Whether `handle` is this session's current live handle. Stale
    /// tasks fail this check and must not act.
    fn same_handle(&self, handle: &Arc<T>) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|live| Arc::ptr_eq(live, handle))
    }
}

/// What is left to do after a failure transition, once the registry lock
/// has been released.
enum FailurePlan<T: TransportHandle> {
    /// The session ended; its entry (with callbacks and tasks) in hand.
    Finished(SessionEntry<T>),
    /// The session is reconnecting; these now-stale tasks need aborting.
    Retrying([Option<JoinHandle<()>>; 3]),
}

// ---------------------------------------------------------------------------
// SessionProxy
// ---------------------------------------------------------------------------

/// Registry and event hub for resilient terminal sessions.
///
/// Cheap to clone; all clones share one registry. Generic over the
/// transport so tests can drive a scripted mock and production can use
/// `WebSocketHandle` (or any other adapter) unchanged.
///
/// ```no_run
/// use termbridge::prelude::*;
///
/// # async fn example() -> Result<(), TermbridgeError> {
/// let proxy = SessionProxy::new();
/// let socket = WebSocketHandle::connect("ws://127.0.0.1:8080").await?;
///
/// let session_id = proxy
///     .create_session(
///         socket,
///         SessionOptions {
///             reconnect: true,
///             ..SessionOptions::default()
///         },
///     )
///     .await;
///
/// proxy
///     .handle_message(&session_id, r#"{"type":"input","data":"ls"}"#)
///     .await;
/// # Ok(())
/// # }
/// ```
pub struct SessionProxy<T: TransportHandle> {
    inner: Arc<ProxyInner<T>>,
}

impl<T: TransportHandle> Clone for SessionProxy<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ProxyInner<T: TransportHandle> {
    sessions: Mutex<HashMap<SessionId, SessionEntry<T>>>,
    /// Observer registry, ordered by token so observers fire in
    /// subscription order. A std mutex: it is only held to copy the
    /// callback list out, never across an await.
    subscribers: std::sync::Mutex<BTreeMap<u64, StateCallback>>,
    next_token: AtomicU64,
}

impl<T: TransportHandle> SessionProxy<T> {
    /// Creates an empty proxy.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                sessions: Mutex::new(HashMap::new()),
                subscribers: std::sync::Mutex::new(BTreeMap::new()),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Registers a new session around a live transport handle.
    ///
    /// The session is `Connected` (and observers have been told so) by
    /// the time this returns. If `options.id` names an existing session,
    /// that session is superseded: its timers are cancelled, its handle
    /// closed, and the new session takes the id.
    pub async fn create_session(
        &self,
        handle: T,
        options: SessionOptions,
    ) -> SessionId {
        let id = options.id.clone().unwrap_or_else(SessionId::generate);
        let handle = Arc::new(handle);

        let mut entry = SessionEntry {
            tracker: SessionTracker::new(id.clone(), &options),
            handle: Some(Arc::clone(&handle)),
            on_close: options.on_close.clone(),
            on_error: options.on_error.clone(),
            on_message: options.on_message.clone(),
            tasks: SessionTasks::default(),
        };

        let mut sessions = self.inner.sessions.lock().await;
        if let Some(mut old) = sessions.remove(&id) {
            tracing::info!(session_id = %id, "superseding existing session");
            old.tasks.abort_all();
            if let Some(old_handle) = old.handle.take() {
                tokio::spawn(async move {
                    let _ = old_handle
                        .close(close_code::NORMAL, "session superseded")
                        .await;
                });
            }
        }

        entry.tasks.reader = Some(tokio::spawn(ProxyInner::run_reader(
            Arc::clone(&self.inner),
            id.clone(),
            Arc::clone(&handle),
        )));
        if options.health_check.enabled {
            entry.tasks.ping = Some(tokio::spawn(ProxyInner::run_heartbeat(
                Arc::clone(&self.inner),
                id.clone(),
                Arc::clone(&handle),
                options.health_check.interval,
                options.health_check.timeout,
            )));
        }
        sessions.insert(id.clone(), entry);

        tracing::info!(session_id = %id, "session created");
        // Notified under the lock so no event processed by the reader can
        // be reported ahead of the Connected transition.
        self.inner.notify(&id, ConnectionState::Connected, None);
        id
    }

    /// Tears a session down: cancels its reader, retry timer, and
    /// heartbeat timers, closes the handle, and removes the entry.
    ///
    /// Returns `false` if no such session exists.
    pub async fn destroy_session(&self, id: &SessionId) -> bool {
        let entry = self.inner.sessions.lock().await.remove(id);
        let Some(mut entry) = entry else {
            return false;
        };

        entry.tasks.abort_all();
        if let Some(handle) = entry.handle.take() {
            tokio::spawn(async move {
                let _ = handle
                    .close(close_code::NORMAL, "session destroyed")
                    .await;
            });
        }

        tracing::info!(session_id = %id, "session destroyed");
        self.inner.notify(
            id,
            ConnectionState::Disconnected,
            Some(&StateDetail::reason("session destroyed")),
        );
        true
    }

    /// Destroys every session. Call before dropping the proxy to avoid
    /// leaving reader or timer tasks behind.
    pub async fn shutdown(&self) {
        let ids: Vec<SessionId> = {
            self.inner.sessions.lock().await.keys().cloned().collect()
        };
        for id in ids {
            self.destroy_session(&id).await;
        }
    }

    /// Supplies a replacement transport handle for a `Reconnecting`
    /// session: cancels the retry timer, resets the backoff, replays the
    /// buffer in FIFO order over the new handle, and restarts heartbeats.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] — unknown id (the session may have
    ///   already disconnected terminally)
    /// - [`SessionError::AlreadyAttached`] — the session still has a live
    ///   handle; use `create_session` to supersede instead
    pub async fn reattach_session(
        &self,
        id: &SessionId,
        handle: T,
    ) -> Result<(), TermbridgeError> {
        let handle = Arc::new(handle);

        let mut sessions = self.inner.sessions.lock().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        if entry.tracker.state() == ConnectionState::Connected {
            return Err(SessionError::AlreadyAttached(id.clone()).into());
        }

        entry.tasks.abort_all();
        let buffered = entry.tracker.reattach();
        entry.handle = Some(Arc::clone(&handle));
        entry.tasks.reader = Some(tokio::spawn(ProxyInner::run_reader(
            Arc::clone(&self.inner),
            id.clone(),
            Arc::clone(&handle),
        )));
        let health = *entry.tracker.health_check();
        if health.enabled {
            entry.tasks.ping = Some(tokio::spawn(ProxyInner::run_heartbeat(
                Arc::clone(&self.inner),
                id.clone(),
                Arc::clone(&handle),
                health.interval,
                health.timeout,
            )));
        }

        // Replay under the registry lock: nothing may overtake the
        // buffered messages on the new handle.
        let total = buffered.len();
        let mut replay = buffered.into_iter();
        let mut unsent = Vec::new();
        for message in replay.by_ref() {
            if let Err(error) = handle.send(&message).await {
                tracing::warn!(
                    session_id = %id,
                    %error,
                    "buffer replay interrupted"
                );
                unsent.push(message);
                break;
            }
        }
        if !unsent.is_empty() {
            unsent.extend(replay);
            entry.tracker.requeue_front(unsent);
        } else if total > 0 {
            tracing::debug!(
                session_id = %id,
                replayed = total,
                "buffer replayed"
            );
        }

        tracing::info!(session_id = %id, "session reattached");
        self.inner.notify(id, ConnectionState::Connected, None);
        Ok(())
    }

    /// Feeds one raw text message through the session's buffering rules:
    /// forwarded over the live handle while `Connected`, buffered while
    /// `Reconnecting`, and control frames consumed by the heartbeat.
    ///
    /// Never fails: malformed input and unknown session ids degrade to a
    /// logged no-op.
    pub async fn handle_message(&self, id: &SessionId, raw: &str) {
        let mut sessions = self.inner.sessions.lock().await;
        let Some(entry) = sessions.get_mut(id) else {
            tracing::warn!(
                session_id = %id,
                "dropping message for unknown session"
            );
            return;
        };

        match entry.tracker.handle_message(raw) {
            MessageDisposition::Forward => {
                if let Some(handle) = entry.handle.clone() {
                    if let Err(error) = handle.send(raw).await {
                        tracing::warn!(
                            session_id = %id,
                            %error,
                            "forward failed; transport close will follow"
                        );
                    }
                }
            }
            MessageDisposition::Buffered => {
                tracing::debug!(
                    session_id = %id,
                    buffered = entry.tracker.buffered_count(),
                    "message buffered"
                );
            }
            MessageDisposition::PongMatched => {
                if let Some(deadline) = entry.tasks.deadline.take() {
                    deadline.abort();
                }
            }
            MessageDisposition::Ignored => {}
        }
    }

    /// Current state of a session, or `None` for unknown ids.
    pub async fn connection_state(
        &self,
        id: &SessionId,
    ) -> Option<ConnectionState> {
        self.inner
            .sessions
            .lock()
            .await
            .get(id)
            .map(|entry| entry.tracker.state())
    }

    /// Number of messages buffered for a session; `0` for unknown ids.
    pub async fn buffered_message_count(&self, id: &SessionId) -> usize {
        self.inner
            .sessions
            .lock()
            .await
            .get(id)
            .map(|entry| entry.tracker.buffered_count())
            .unwrap_or(0)
    }

    /// Number of registered sessions (any state).
    pub async fn session_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    /// Registers a state-change observer. The callback fires on every
    /// transition of every session until the returned token is passed to
    /// [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(&self, callback: StateCallback) -> SubscriptionToken {
        let token = SubscriptionToken(
            self.inner.next_token.fetch_add(1, Ordering::Relaxed),
        );
        self.inner.subscribers().insert(token.0, callback);
        token
    }

    /// Removes an observer. Returns `false` if the token was already
    /// unsubscribed.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.inner.subscribers().remove(&token.0).is_some()
    }
}

impl<T: TransportHandle> Default for SessionProxy<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Event and timer plumbing
// ---------------------------------------------------------------------------

impl<T: TransportHandle> ProxyInner<T> {
    fn subscribers(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<u64, StateCallback>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reports a transition to every observer. Observers run outside the
    /// subscriber lock and behind a panic guard, so a misbehaving one
    /// cannot corrupt the registry or starve its peers.
    fn notify(
        &self,
        id: &SessionId,
        state: ConnectionState,
        detail: Option<&StateDetail>,
    ) {
        tracing::debug!(session_id = %id, %state, "state change");
        let callbacks: Vec<StateCallback> =
            self.subscribers().values().cloned().collect();
        for callback in callbacks {
            invoke_guarded("state observer", id, || {
                callback(id, state, detail)
            });
        }
    }

    /// Pumps events from a live handle until the stream ends. One reader
    /// task exists per attached handle; it dies with the handle.
    async fn run_reader(inner: Arc<Self>, id: SessionId, handle: Arc<T>) {
        loop {
            match handle.next_event().await {
                Some(TransportEvent::Message(text)) => {
                    inner.process_inbound(&id, &handle, &text).await;
                }
                Some(TransportEvent::Error(error)) => {
                    inner.process_error(&id, &handle, error).await;
                }
                Some(TransportEvent::Close(frame)) => {
                    inner
                        .process_failure(
                            &id,
                            &handle,
                            Some(frame.code),
                            &frame.reason,
                        )
                        .await;
                    return;
                }
                None => {
                    // The stream ended without a close frame. Nobody
                    // said goodbye, so treat it as an abnormal closure.
                    inner
                        .process_failure(
                            &id,
                            &handle,
                            Some(close_code::ABNORMAL),
                            "transport stream ended",
                        )
                        .await;
                    return;
                }
            }
        }
    }

    /// A text frame arrived from the transport: pongs feed the heartbeat,
    /// application frames go to the session's `on_message` consumer.
    async fn process_inbound(
        self: &Arc<Self>,
        id: &SessionId,
        handle: &Arc<T>,
        text: &str,
    ) {
        let deliver = {
            let mut sessions = self.sessions.lock().await;
            let Some(entry) = sessions.get_mut(id) else { return };
            if !entry.same_handle(handle) {
                return;
            }

            match parse_frame(text) {
                Err(error) => {
                    tracing::warn!(
                        session_id = %id,
                        %error,
                        "ignoring unclassifiable inbound frame"
                    );
                    None
                }
                Ok(Frame::Pong { id: ping_id }) => {
                    if entry.tracker.match_pong(ping_id) {
                        if let Some(deadline) = entry.tasks.deadline.take()
                        {
                            deadline.abort();
                        }
                    }
                    None
                }
                // Probes are ours to send, not to receive.
                Ok(Frame::Ping { .. }) => None,
                Ok(Frame::Application { .. }) => entry.on_message.clone(),
            }
        };

        if let Some(callback) = deliver {
            invoke_guarded("message callback", id, || callback(text));
        }
    }

    /// A transport-level error: reported through `on_error` and the
    /// observer channel, with no state change. The close that usually
    /// follows drives the real transition.
    async fn process_error(
        self: &Arc<Self>,
        id: &SessionId,
        handle: &Arc<T>,
        error: TransportError,
    ) {
        let snapshot = {
            let sessions = self.sessions.lock().await;
            let Some(entry) = sessions.get(id) else { return };
            if !entry.same_handle(handle) {
                return;
            }
            (entry.tracker.state(), entry.on_error.clone())
        };

        let (state, on_error) = snapshot;
        tracing::warn!(session_id = %id, %error, "transport error");
        if let Some(callback) = on_error {
            invoke_guarded("error callback", id, || callback(&error));
        }
        self.notify(id, state, Some(&StateDetail::reason(error.to_string())));
    }

    /// Shared failure path for close events (`code` present) and
    /// health-check timeouts (`code` absent).
    async fn process_failure(
        self: &Arc<Self>,
        id: &SessionId,
        handle: &Arc<T>,
        code: Option<u16>,
        reason: &str,
    ) {
        let plan = {
            let mut sessions = self.sessions.lock().await;
            let Some(entry) = sessions.get_mut(id) else { return };
            if !entry.same_handle(handle) {
                return;
            }

            // The handle is no longer usable either way.
            entry.handle = None;

            match entry.tracker.handle_close(code, reason) {
                CloseDisposition::Finished => {
                    sessions.remove(id).map(FailurePlan::Finished)
                }
                CloseDisposition::Retry { delay } => {
                    let stale = [
                        entry.tasks.reader.take(),
                        entry.tasks.ping.take(),
                        entry.tasks.deadline.take(),
                    ];
                    entry.tasks.retry =
                        Some(tokio::spawn(Self::run_retry(
                            Arc::clone(self),
                            id.clone(),
                            delay,
                        )));
                    Some(FailurePlan::Retrying(stale))
                }
            }
        };

        let detail = StateDetail {
            code,
            reason: Some(reason.to_string()),
        };
        match plan {
            Some(FailurePlan::Finished(mut entry)) => {
                tracing::info!(
                    session_id = %id,
                    code,
                    reason,
                    "session disconnected"
                );
                if let (Some(callback), Some(code)) =
                    (entry.on_close.clone(), code)
                {
                    invoke_guarded("close callback", id, || {
                        callback(code, reason)
                    });
                }
                self.notify(
                    id,
                    ConnectionState::Disconnected,
                    Some(&detail),
                );
                // Last: this may cancel the very task running here, which
                // takes effect at its next yield point.
                entry.tasks.abort_all();
            }
            Some(FailurePlan::Retrying(stale)) => {
                tracing::info!(
                    session_id = %id,
                    code,
                    reason,
                    "session reconnecting"
                );
                self.notify(
                    id,
                    ConnectionState::Reconnecting,
                    Some(&detail),
                );
                for task in stale.into_iter().flatten() {
                    task.abort();
                }
            }
            None => {}
        }
    }

    /// Retry timer body: waits out the backoff delay, then either
    /// reschedules itself or declares the session exhausted. The timer is
    /// aborted by reattachment, supersession, and destruction; a session
    /// found in any state but `Reconnecting` means the timer is stale.
    fn run_retry(
        self: Arc<Self>,
        id: SessionId,
        delay: Duration,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move {
        tokio::time::sleep(delay).await;

        let finished = {
            let mut sessions = self.sessions.lock().await;
            let Some(entry) = sessions.get_mut(&id) else { return };
            if entry.tracker.state() != ConnectionState::Reconnecting {
                return;
            }

            match entry.tracker.retry_tick() {
                RetryDisposition::Again { delay } => {
                    tracing::debug!(
                        session_id = %id,
                        attempts = entry.tracker.attempts(),
                        next_delay_ms = delay.as_millis() as u64,
                        "still waiting for reattachment"
                    );
                    entry.tasks.retry =
                        Some(tokio::spawn(Self::run_retry(
                            Arc::clone(&self),
                            id.clone(),
                            delay,
                        )));
                    None
                }
                RetryDisposition::Exhausted => sessions.remove(&id),
            }
        };

        if let Some(mut entry) = finished {
            tracing::info!(
                session_id = %id,
                "session disconnected: max attempts exceeded"
            );
            self.notify(
                &id,
                ConnectionState::Disconnected,
                Some(&StateDetail::reason("max attempts exceeded")),
            );
            entry.tasks.abort_all();
        }
        })
    }

    /// Repeating heartbeat body: every `interval`, send a ping and arm a
    /// deadline for its pong, unless an earlier ping is still in flight,
    /// in which case its deadline stays armed and decides the outcome.
    async fn run_heartbeat(
        inner: Arc<Self>,
        id: SessionId,
        handle: Arc<T>,
        interval: Duration,
        timeout: Duration,
    ) {
        loop {
            tokio::time::sleep(interval).await;

            let ping_id = {
                let mut sessions = inner.sessions.lock().await;
                let Some(entry) = sessions.get_mut(&id) else { return };
                if !entry.same_handle(&handle) {
                    return;
                }
                entry.tracker.start_ping()
            };
            let Some(ping_id) = ping_id else { continue };

            let frame = match (ControlFrame::Ping { id: ping_id }).encode()
            {
                Ok(frame) => frame,
                Err(error) => {
                    tracing::warn!(
                        session_id = %id,
                        %error,
                        "failed to encode ping"
                    );
                    continue;
                }
            };
            if let Err(error) = handle.send(&frame).await {
                // Keep the deadline armed: an unanswered ping on a dying
                // socket times out like any other.
                tracing::warn!(
                    session_id = %id,
                    %error,
                    "ping send failed"
                );
            }
            tracing::trace!(session_id = %id, ping_id, "ping sent");

            let mut sessions = inner.sessions.lock().await;
            let Some(entry) = sessions.get_mut(&id) else { return };
            if !entry.same_handle(&handle) {
                return;
            }
            if let Some(previous) = entry.tasks.deadline.take() {
                previous.abort();
            }
            entry.tasks.deadline = Some(tokio::spawn(Self::run_deadline(
                Arc::clone(&inner),
                id.clone(),
                Arc::clone(&handle),
                ping_id,
                timeout,
            )));
        }
    }

    /// One-shot deadline body: if the ping it was armed for is still
    /// unanswered when the timeout elapses, the connection is stale and
    /// goes through the same transition logic as an abnormal close.
    async fn run_deadline(
        inner: Arc<Self>,
        id: SessionId,
        handle: Arc<T>,
        ping_id: u64,
        timeout: Duration,
    ) {
        tokio::time::sleep(timeout).await;

        let stale = {
            let sessions = inner.sessions.lock().await;
            sessions.get(&id).is_some_and(|entry| {
                entry.same_handle(&handle)
                    && entry.tracker.deadline_elapsed(ping_id)
            })
        };

        if stale {
            tracing::warn!(
                session_id = %id,
                ping_id,
                "health check timeout"
            );
            inner
                .process_failure(&id, &handle, None, "health check timeout")
                .await;
        }
    }
}

/// Runs a user-supplied callback behind a panic guard. A panicking
/// observer is logged and dropped for that invocation; the proxy's
/// bookkeeping is never affected.
fn invoke_guarded(what: &str, id: &SessionId, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(
            session_id = %id,
            callback = what,
            "callback panicked; continuing"
        );
    }
}
