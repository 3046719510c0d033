//! [`RoomChannel`]: one joined room's live event feed.
//!
//! State machine:
//!
//! ```text
//! Idle/Closed --join--> Connecting --socket open--> Open
//! Open --socket drops--> Connecting --reconnected--> Open
//! Connecting --attempts exhausted--> Closed
//! Open/Connecting --leave--> Closing --> Idle
//! ```
//!
//! The socket lives inside a spawned watch task. `leave()` raises the
//! leaving flag and cancels the task; every await in `join()` and in the
//! reconnect loop re-checks the flag, so a leave always wins over a
//! concurrent connect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatx_core::{
    ChatEvent, ChatExchangeError, DEFAULT_MAX_MESSAGE_LENGTH, EventKind, MessageId,
    ReconnectPolicy, Result, RoomId, UserId, parse_frame,
};
use chatx_session::Session;

use crate::filter::{BlockExpiry, EventFilter};
use crate::post;
use crate::socket::{EventSocket, SocketConnector};

/// Default capacity of a room's event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Per-room tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomConfig {
    /// Retry cadence after the socket drops.
    pub reconnect: ReconnectPolicy,
    /// Events buffered per subscriber before the slowest one lags.
    pub channel_capacity: usize,
    /// Longest message `send` accepts, in characters.
    pub max_message_length: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            channel_capacity: DEFAULT_EVENT_CAPACITY,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }
}

/// Lifecycle state of a [`RoomChannel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// Not joined.
    Idle,
    /// Joining, or reconnecting after the socket dropped.
    Connecting,
    /// Socket open, events flowing.
    Open,
    /// `leave()` in progress.
    Closing,
    /// Gave up reconnecting.
    Closed,
}

/// Why a channel stopped delivering events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The room was left.
    Left,
    /// Every reconnect attempt allowed by the policy failed.
    ReconnectExhausted,
}

/// What subscribers of a room receive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoomEvent {
    /// The socket (re)opened.
    Opened,
    /// A room event that passed the filter.
    Event(ChatEvent),
    /// A reconnect attempt failed; more may follow.
    ReconnectFailed {
        /// 1-based attempt number.
        attempt: u32,
        /// Failure description.
        error: String,
    },
    /// No more events will arrive until the room is joined again.
    Closed {
        /// Why the channel closed.
        reason: CloseReason,
    },
}

#[derive(Deserialize)]
struct EventsResponse {
    time: u64,
}

#[derive(Deserialize)]
struct WsAuthResponse {
    url: String,
}

/// A joined (or joinable) room.
pub struct RoomChannel {
    inner: Arc<Inner>,
}

struct Inner {
    room_id: RoomId,
    session: Arc<Session>,
    connector: Arc<dyn SocketConnector>,
    config: RoomConfig,
    state: RwLock<ChannelState>,
    cursor: Mutex<Option<u64>>,
    filter: Mutex<EventFilter>,
    events: broadcast::Sender<RoomEvent>,
    leaving: AtomicBool,
    cancel: Mutex<CancellationToken>,
    watch: Mutex<Option<JoinHandle<()>>>,
}

impl RoomChannel {
    /// Channel for `room_id`, not yet joined.
    pub fn new(
        room_id: RoomId,
        session: Arc<Session>,
        connector: Arc<dyn SocketConnector>,
        config: RoomConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                room_id,
                session,
                connector,
                config,
                state: RwLock::new(ChannelState::Idle),
                cursor: Mutex::new(None),
                filter: Mutex::new(EventFilter::new()),
                events,
                leaving: AtomicBool::new(false),
                cancel: Mutex::new(CancellationToken::new()),
                watch: Mutex::new(None),
            }),
        }
    }

    /// Room this channel watches.
    pub fn room_id(&self) -> RoomId {
        self.inner.room_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        *self.inner.state.read()
    }

    /// Latest event cursor seen, used to resume after a reconnect.
    pub fn cursor(&self) -> Option<u64> {
        *self.inner.cursor.lock()
    }

    /// Receive this room's events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.inner.events.subscribe()
    }

    /// Join the room and start watching it.
    ///
    /// Joining a room that is already connecting or open does nothing.
    #[tracing::instrument(skip_all, fields(room_id = %self.inner.room_id))]
    pub async fn join(&self) -> Result<()> {
        let inner = &self.inner;
        {
            let mut state = inner.state.write();
            match *state {
                ChannelState::Connecting | ChannelState::Open => return Ok(()),
                ChannelState::Closing => {
                    return Err(ChatExchangeError::Exchange(format!(
                        "room {} is being left",
                        inner.room_id
                    )));
                }
                ChannelState::Idle | ChannelState::Closed => {
                    *state = ChannelState::Connecting;
                    inner.leaving.store(false, Ordering::SeqCst);
                }
            }
        }
        let token = CancellationToken::new();
        *inner.cancel.lock() = token.clone();
        info!("joining");

        let socket = match inner.connect_first().await {
            Ok(Some(socket)) => socket,
            Ok(None) => {
                debug!("left while joining");
                return Ok(());
            }
            Err(e) => {
                inner.transition_from(ChannelState::Connecting, ChannelState::Idle);
                warn!(error = %e, "join failed");
                return Err(e);
            }
        };

        // `leave()` raises the flag under the state lock, so while it is held
        // here either the leave already happened or it will find the handle.
        let unused = {
            let mut state = inner.state.write();
            if inner.is_leaving() {
                Some(socket)
            } else {
                *state = ChannelState::Open;
                inner.emit(RoomEvent::Opened);
                let handle = tokio::spawn(watch(Arc::clone(inner), socket, token));
                *inner.watch.lock() = Some(handle);
                None
            }
        };
        if let Some(mut socket) = unused {
            socket.close().await;
            return Ok(());
        }

        info!("watching");
        Ok(())
    }

    /// Stop watching and leave the room.
    ///
    /// The socket is closed before the leave request goes out, and no
    /// reconnect follows. Subscribers get [`CloseReason::Left`].
    #[tracing::instrument(skip_all, fields(room_id = %self.inner.room_id))]
    pub async fn leave(&self) -> Result<()> {
        let inner = &self.inner;
        {
            let mut state = inner.state.write();
            if matches!(*state, ChannelState::Idle | ChannelState::Closing) {
                return Ok(());
            }
            *state = ChannelState::Closing;
            inner.leaving.store(true, Ordering::SeqCst);
        }
        inner.cancel.lock().cancel();

        let handle = inner.watch.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "watch task ended abnormally");
            }
        }

        let url = inner
            .session
            .host()
            .chat(&format!("/chats/leave/{}", inner.room_id));
        let result = inner
            .session
            .post_with_key(&url, &[("quiet", "true".to_string())])
            .await;

        *inner.state.write() = ChannelState::Idle;
        inner.emit(RoomEvent::Closed {
            reason: CloseReason::Left,
        });
        info!("left");
        result.map(|_| ())
    }

    /// Post `text` to the room.
    pub async fn send(&self, text: &str) -> Result<MessageId> {
        post::post_message(
            &self.inner.session,
            self.inner.room_id,
            text,
            self.inner.config.max_message_length,
        )
        .await
    }

    /// Stop emitting events of `kinds`.
    pub fn ignore(&self, kinds: &[EventKind]) {
        self.inner.filter.lock().ignore(kinds);
    }

    /// Emit events of `kinds` again.
    pub fn unignore(&self, kinds: &[EventKind]) {
        self.inner.filter.lock().unignore(kinds);
    }

    /// Emit only events of `kinds`.
    pub fn only(&self, kinds: &[EventKind]) {
        self.inner.filter.lock().only(kinds);
    }

    /// Whether events of `kind` are suppressed.
    pub fn is_ignored(&self, kind: EventKind) -> bool {
        self.inner.filter.lock().is_ignored(kind)
    }

    /// Suppress events from `user` for `duration`, or until unblocked when
    /// `duration` is `None`.
    pub fn block(&self, user: UserId, duration: Option<Duration>) {
        let expiry = duration.map_or(BlockExpiry::Never, |d| BlockExpiry::At(Instant::now() + d));
        self.inner.filter.lock().block(user, expiry);
        debug!(room_id = %self.inner.room_id, user_id = %user, ?duration, "blocked user");

        let BlockExpiry::At(deadline) = expiry else {
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let _ = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                if inner.filter.lock().expire_block(user, deadline) {
                    debug!(room_id = %inner.room_id, user_id = %user, "block expired");
                }
            }
        });
    }

    /// Lift blocks on `users`.
    pub fn unblock(&self, users: &[UserId]) {
        let mut filter = self.inner.filter.lock();
        for user in users {
            filter.unblock(*user);
        }
    }

    /// Whether events from `user` are currently suppressed.
    pub fn is_blocked(&self, user: UserId) -> bool {
        self.inner.filter.lock().is_blocked(user, Instant::now())
    }

    /// Block entries on record, including lapsed ones not yet pruned.
    pub fn block_count(&self) -> usize {
        self.inner.filter.lock().blocked_count()
    }
}

impl std::fmt::Debug for RoomChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomChannel")
            .field("room_id", &self.inner.room_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for RoomChannel {
    fn drop(&mut self) {
        self.inner.leaving.store(true, Ordering::SeqCst);
        self.inner.cancel.lock().cancel();
    }
}

impl Inner {
    fn is_leaving(&self) -> bool {
        self.leaving.load(Ordering::SeqCst)
    }

    fn emit(&self, event: RoomEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Move to `next` unless a leave has taken over the state.
    fn set_state(&self, next: ChannelState) {
        let mut state = self.state.write();
        if !self.is_leaving() {
            *state = next;
        }
    }

    fn transition_from(&self, from: ChannelState, to: ChannelState) {
        let mut state = self.state.write();
        if *state == from {
            *state = to;
        }
    }

    /// Fetch the starting cursor and open the first socket. `None` if the
    /// room was left in the meantime.
    async fn connect_first(&self) -> Result<Option<Box<dyn EventSocket>>> {
        let cursor = self.fetch_cursor().await?;
        if self.is_leaving() {
            return Ok(None);
        }
        *self.cursor.lock() = Some(cursor);

        let mut socket = self.open_socket().await?;
        if self.is_leaving() {
            socket.close().await;
            return Ok(None);
        }
        Ok(Some(socket))
    }

    async fn fetch_cursor(&self) -> Result<u64> {
        let url = self
            .session
            .host()
            .chat(&format!("/chats/{}/events", self.room_id));
        let resp = self
            .session
            .post_with_key(
                &url,
                &[
                    ("since", "0".to_string()),
                    ("mode", "Messages".to_string()),
                    ("msgCount", "100".to_string()),
                ],
            )
            .await?;
        let events: EventsResponse = resp.json()?;
        debug!(cursor = events.time, "fetched cursor");
        Ok(events.time)
    }

    /// Watch handshake plus socket connect, resuming from the stored cursor.
    async fn open_socket(&self) -> Result<Box<dyn EventSocket>> {
        let host = self.session.host();
        let resp = self
            .session
            .post_with_key(&host.chat("/ws-auth"), &[("roomid", self.room_id.to_string())])
            .await?;
        let auth: WsAuthResponse = resp.json()?;

        let cursor = self.cursor.lock().unwrap_or(0);
        let url = format!("{}?l={cursor}", auth.url);
        debug!(%url, "connecting socket");
        self.connector.connect(&url, host.chat_url()).await
    }

    fn dispatch(&self, frame: &str) {
        let batch = match parse_frame(self.room_id, frame) {
            Ok(batch) => batch,
            Err(e) => {
                debug!(room_id = %self.room_id, error = %e, "dropping malformed frame");
                return;
            }
        };
        if let Some(cursor) = batch.cursor {
            *self.cursor.lock() = Some(cursor);
        }

        let now = Instant::now();
        let allowed: Vec<ChatEvent> = {
            let mut filter = self.filter.lock();
            batch
                .events
                .into_iter()
                .filter(|event| filter.allows(event, now))
                .collect()
        };
        for event in allowed {
            self.emit(RoomEvent::Event(event));
        }
    }

    /// Reopen the socket per the reconnect policy. `None` when the room was
    /// left or the policy gave up.
    async fn reconnect(&self, token: &CancellationToken) -> Option<Box<dyn EventSocket>> {
        self.set_state(ChannelState::Connecting);
        let policy = &self.config.reconnect;
        let mut attempt: u32 = 1;

        loop {
            if !policy.allows(attempt) {
                warn!(room_id = %self.room_id, attempts = attempt - 1, "giving up reconnecting");
                self.set_state(ChannelState::Closed);
                if !self.is_leaving() {
                    self.emit(RoomEvent::Closed {
                        reason: CloseReason::ReconnectExhausted,
                    });
                }
                return None;
            }

            let delay = policy.delay_for(attempt);
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    () = token.cancelled() => return None,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            if self.is_leaving() {
                return None;
            }

            let result = tokio::select! {
                () = token.cancelled() => return None,
                result = self.open_socket() => result,
            };
            match result {
                Ok(mut socket) => {
                    if self.is_leaving() {
                        socket.close().await;
                        return None;
                    }
                    self.set_state(ChannelState::Open);
                    self.emit(RoomEvent::Opened);
                    info!(room_id = %self.room_id, attempt, "reconnected");
                    return Some(socket);
                }
                Err(e) => {
                    warn!(room_id = %self.room_id, attempt, error = %e, "reconnect failed");
                    if e.status().is_some_and(|s| (400..500).contains(&s) && s != 429) {
                        // Handshake rejected: the key has most likely expired.
                        debug!(room_id = %self.room_id, "refreshing session key");
                        self.session.invalidate_chat_key();
                    }
                    self.emit(RoomEvent::ReconnectFailed {
                        attempt,
                        error: e.to_string(),
                    });
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}

enum Next {
    Cancelled,
    Frame(Option<Result<String>>),
}

async fn watch(inner: Arc<Inner>, mut socket: Box<dyn EventSocket>, token: CancellationToken) {
    loop {
        let next = tokio::select! {
            () = token.cancelled() => Next::Cancelled,
            frame = socket.next_frame() => Next::Frame(frame),
        };
        match next {
            Next::Cancelled => {
                socket.close().await;
                debug!(room_id = %inner.room_id, "watch cancelled");
                return;
            }
            Next::Frame(Some(Ok(frame))) => {
                inner.dispatch(&frame);
                continue;
            }
            Next::Frame(Some(Err(e))) => {
                warn!(room_id = %inner.room_id, error = %e, "socket read failed");
            }
            Next::Frame(None) => {
                info!(room_id = %inner.room_id, "socket closed by server");
            }
        }

        socket.close().await;
        if inner.is_leaving() {
            return;
        }
        match inner.reconnect(&token).await {
            Some(reopened) => socket = reopened,
            None => return,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
