//! [`Client`]: one account's connection to a chat server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use chatx_core::{ChatExchangeError, MessageId, Result, RoomId, UserId};
use chatx_room::post;
use chatx_room::{RoomChannel, RoomConfig, SocketConnector, WsConnector};
use chatx_session::Session;
use chatx_settings::ChatSettings;
use chatx_transport::{ChatHost, Extractor, HtmlExtractor, HttpTransport, Transport};

use crate::broadcast::{BroadcastCoordinator, BroadcastRun, MessageSender};
use crate::message::Message;
use crate::registry::EntityRegistry;
use crate::room::Room;
use crate::user::{User, UserFields};

/// Entry point of the library.
///
/// Owns the session, the entity registry and the joined rooms. Everything
/// is per instance; two clients share nothing.
pub struct Client {
    settings: ChatSettings,
    session: Arc<Session>,
    connector: Arc<dyn SocketConnector>,
    registry: EntityRegistry,
    rooms: Mutex<Vec<Arc<RoomChannel>>>,
    broadcaster: BroadcastCoordinator,
}

impl Client {
    /// Client for one of the known hosts, talking over HTTP and WebSockets.
    pub fn new(host: &str, settings: ChatSettings) -> Result<Self> {
        Self::with_host(ChatHost::new(host)?, settings)
    }

    /// Client for the host named in `settings`.
    pub fn from_settings(settings: ChatSettings) -> Result<Self> {
        let host = ChatHost::new(&settings.host)?;
        Self::with_host(host, settings)
    }

    /// Client for an explicit host, e.g. one built with [`ChatHost::custom`].
    pub fn with_host(host: ChatHost, settings: ChatSettings) -> Result<Self> {
        let transport = HttpTransport::new(&settings.http)?;
        Ok(Self::with_parts(
            host,
            settings,
            Arc::new(transport),
            Arc::new(HtmlExtractor),
            Arc::new(WsConnector),
        ))
    }

    /// Client over caller-supplied transport, page extraction and sockets.
    pub fn with_parts(
        host: ChatHost,
        settings: ChatSettings,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn Extractor>,
        connector: Arc<dyn SocketConnector>,
    ) -> Self {
        let session = Arc::new(Session::new(host, transport, extractor));
        let broadcaster =
            BroadcastCoordinator::new(Duration::from_millis(settings.broadcast.throttle_delay_ms));
        Self {
            registry: EntityRegistry::new(Arc::clone(&session)),
            settings,
            session,
            connector,
            rooms: Mutex::new(Vec::new()),
            broadcaster,
        }
    }

    /// Settings the client was built with.
    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Host the client talks to.
    pub fn host(&self) -> &ChatHost {
        self.session.host()
    }

    /// The underlying session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Cached users, rooms and messages.
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    // ── Authentication ──────────────────────────────────────────────────

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        self.session.login(email, password).await
    }

    /// Log in by restoring a string from [`Client::save_session`].
    pub async fn login_with_saved_session(&self, serialized: &str) -> Result<()> {
        self.session.login_with_saved_session(serialized).await
    }

    /// Serialise the session cookies for a later
    /// [`Client::login_with_saved_session`].
    pub fn save_session(&self) -> Result<String> {
        self.session.save_session()
    }

    /// Leave every joined room, then drop the session.
    pub async fn logout(&self) {
        if let Err(e) = self.leave_all().await {
            warn!(error = %e, "leaving rooms during logout failed");
        }
        self.session.logout();
        info!("logged out");
    }

    /// Whether a login or session restore has succeeded.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// The logged-in user.
    pub async fn get_me(&self) -> Result<Arc<User>> {
        if !self.session.is_authenticated() {
            return Err(ChatExchangeError::Exchange("not logged in".to_string()));
        }
        let id = self.session.account_id().await?;
        let name = self.session.account_name().await?;
        Ok(self.registry.user(
            id,
            Some(UserFields {
                name: Some(name),
                ..UserFields::default()
            }),
        ))
    }

    // ── Entities ────────────────────────────────────────────────────────

    /// User `id`. Fields load on first read.
    pub fn get_user(&self, id: UserId) -> Arc<User> {
        self.registry.user(id, None)
    }

    /// Room `id`. Fields load on first read.
    pub fn get_room(&self, id: RoomId) -> Arc<Room> {
        self.registry.room(id, None)
    }

    /// Message `id`. Fields load on first read.
    pub fn get_message(&self, id: MessageId) -> Arc<Message> {
        self.registry.message(id, None)
    }

    // ── Rooms ───────────────────────────────────────────────────────────

    /// Join room `id` and start watching it.
    ///
    /// Joining a room that is already joined returns the existing channel.
    /// A failed join leaves no trace in [`Client::joined_rooms`].
    pub async fn join_room(&self, id: RoomId) -> Result<Arc<RoomChannel>> {
        let channel = {
            let mut rooms = self.rooms.lock();
            if let Some(existing) = rooms.iter().find(|c| c.room_id() == id) {
                Arc::clone(existing)
            } else {
                let channel = Arc::new(RoomChannel::new(
                    id,
                    Arc::clone(&self.session),
                    Arc::clone(&self.connector),
                    self.room_config(),
                ));
                rooms.push(Arc::clone(&channel));
                channel
            }
        };

        if let Err(e) = channel.join().await {
            self.rooms.lock().retain(|c| !Arc::ptr_eq(c, &channel));
            return Err(e);
        }
        Ok(channel)
    }

    /// Leave room `id`. Leaving a room that is not joined does nothing.
    pub async fn leave_room(&self, id: RoomId) -> Result<()> {
        let channel = {
            let mut rooms = self.rooms.lock();
            let Some(pos) = rooms.iter().position(|c| c.room_id() == id) else {
                return Ok(());
            };
            rooms.remove(pos)
        };
        channel.leave().await
    }

    /// Leave every joined room. All rooms are left even if some fail; the
    /// first failure is returned.
    pub async fn leave_all(&self) -> Result<()> {
        let channels = std::mem::take(&mut *self.rooms.lock());
        let mut first_error = None;
        for channel in channels {
            if let Err(e) = channel.leave().await {
                warn!(room_id = %channel.room_id(), error = %e, "leave failed");
                let _ = first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Joined rooms, in join order.
    pub fn joined_rooms(&self) -> Vec<RoomId> {
        self.rooms.lock().iter().map(|c| c.room_id()).collect()
    }

    /// Channel of a joined room.
    pub fn room_channel(&self, id: RoomId) -> Option<Arc<RoomChannel>> {
        self.rooms
            .lock()
            .iter()
            .find(|c| c.room_id() == id)
            .map(Arc::clone)
    }

    // ── Messaging ───────────────────────────────────────────────────────

    /// Post `text` to `room`, joined or not.
    pub async fn send(&self, room: RoomId, text: &str) -> Result<MessageId> {
        post::post_message(&self.session, room, text, self.max_length()).await
    }

    /// Reply to `parent` in the room it was posted in.
    pub async fn reply(&self, parent: MessageId, text: &str) -> Result<MessageId> {
        post::validate_text(text, self.max_length())?;
        let room = self.get_message(parent).room_id().await?;
        self.send(room, &post::reply_text(parent, text)).await
    }

    /// Replace the text of message `id`.
    pub async fn edit_message(&self, id: MessageId, text: &str) -> Result<()> {
        post::edit_message(&self.session, id, text, self.max_length()).await
    }

    /// Delete message `id`.
    pub async fn delete_message(&self, id: MessageId) -> Result<()> {
        post::delete_message(&self.session, id).await
    }

    /// Post `text` to every joined room in join order, throttled.
    pub async fn broadcast(&self, text: &str) -> Result<BroadcastRun> {
        post::validate_text(text, self.max_length())?;
        let rooms = self.joined_rooms();
        Ok(self.broadcaster.run(self, &rooms, text).await)
    }

    fn max_length(&self) -> usize {
        self.settings.messages.max_length
    }

    fn room_config(&self) -> RoomConfig {
        RoomConfig {
            reconnect: self.settings.reconnect.clone(),
            channel_capacity: self.settings.events.channel_capacity,
            max_message_length: self.settings.messages.max_length,
        }
    }
}

#[async_trait]
impl MessageSender for Client {
    async fn send_to(&self, room: RoomId, text: &str) -> Result<MessageId> {
        self.send(room, text).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", self.session.host())
            .field("authenticated", &self.session.is_authenticated())
            .field("rooms", &self.joined_rooms())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
