//! Chat messages.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use chatx_core::{ChatEvent, LazyField, MessageId, Result, RoomId, UserId};
use chatx_session::Session;

/// Known fields of a message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageFields {
    /// Body as rendered HTML.
    pub content: Option<String>,
    /// Room the message was posted in.
    pub room_id: Option<RoomId>,
    /// Name of that room.
    pub room_name: Option<String>,
    /// Whether the message has been edited.
    pub edited: Option<bool>,
    /// Author id.
    pub user_id: Option<UserId>,
    /// Author display name.
    pub user_name: Option<String>,
    /// Message replied to: outer `None` until known, inner `None` when the
    /// message is not a reply.
    pub parent_id: Option<Option<MessageId>>,
}

impl MessageFields {
    /// Seed from a room event about the message.
    pub fn from_event(event: &ChatEvent) -> Self {
        Self {
            content: event.content.clone(),
            room_id: Some(event.room_id),
            room_name: event.room_name.clone(),
            edited: None,
            user_id: event.user_id,
            user_name: event.user_name.clone(),
            parent_id: event.parent_id.map(Some),
        }
    }
}

/// A chat message. Unknown fields come from its transcript page.
pub struct Message {
    id: MessageId,
    session: Arc<Session>,
    fields: RwLock<MessageFields>,
    transcript: LazyField,
}

impl Message {
    pub(crate) fn new(id: MessageId, session: Arc<Session>, seed: MessageFields) -> Self {
        Self {
            id,
            session,
            fields: RwLock::new(seed),
            transcript: LazyField::new(),
        }
    }

    /// Message id.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Snapshot of what is known so far, without fetching.
    pub fn known_fields(&self) -> MessageFields {
        self.fields.read().clone()
    }

    /// Body as rendered HTML.
    pub async fn content(&self) -> Result<String> {
        self.field("content", |f| f.content.clone()).await
    }

    /// Room the message was posted in.
    pub async fn room_id(&self) -> Result<RoomId> {
        self.field("room_id", |f| f.room_id).await
    }

    /// Name of the room the message was posted in.
    pub async fn room_name(&self) -> Result<String> {
        self.field("room_name", |f| f.room_name.clone()).await
    }

    /// Whether the message has been edited.
    pub async fn edited(&self) -> Result<bool> {
        self.field("edited", |f| f.edited).await
    }

    /// Author id.
    pub async fn user_id(&self) -> Result<UserId> {
        self.field("user_id", |f| f.user_id).await
    }

    /// Author display name.
    pub async fn user_name(&self) -> Result<String> {
        self.field("user_name", |f| f.user_name.clone()).await
    }

    /// Message this one replies to, `None` if it is not a reply.
    pub async fn parent_id(&self) -> Result<Option<MessageId>> {
        self.field("parent_id", |f| f.parent_id).await
    }

    async fn field<T>(
        &self,
        name: &'static str,
        get: impl Fn(&MessageFields) -> Option<T>,
    ) -> Result<T> {
        self.transcript
            .resolve(name, || get(&self.fields.read()), || self.fetch_transcript())
            .await
    }

    async fn fetch_transcript(&self) -> Result<()> {
        let url = self
            .session
            .host()
            .chat(&format!("/transcript/message/{}", self.id));
        let page = self.session.get_page(&url).await?;
        let t = self.session.extractor().transcript(&page, self.id);
        debug!(message_id = %self.id, found = t.found, "fetched transcript");

        let mut fields = self.fields.write();
        if t.content.is_some() {
            fields.content = t.content;
        }
        if t.room_id.is_some() {
            fields.room_id = t.room_id;
        }
        if t.room_name.is_some() {
            fields.room_name = t.room_name;
        }
        if t.user_id.is_some() {
            fields.user_id = t.user_id;
        }
        if t.user_name.is_some() {
            fields.user_name = t.user_name;
        }
        if t.found {
            fields.edited = Some(t.edited);
            fields.parent_id = Some(t.parent_id);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("fields", &*self.fields.read())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{TRANSCRIPT_PAGE, scripted_session};
    use assert_matches::assert_matches;
    use chatx_core::{ChatExchangeError, EventKind};
    use chatx_transport::Method;

    #[tokio::test]
    async fn transcript_fills_fields() {
        let (transport, session) = scripted_session();
        transport.respond_html(Method::Get, "/transcript/message/51", 200, TRANSCRIPT_PAGE);
        let message = Message::new(MessageId::new(51), session, MessageFields::default());

        assert_eq!(message.content().await.unwrap(), "reply");
        assert_eq!(message.room_id().await.unwrap(), RoomId::new(3));
        assert_eq!(message.room_name().await.unwrap(), "Sandbox");
        assert_eq!(message.user_id().await.unwrap(), UserId::new(7));
        assert_eq!(message.user_name().await.unwrap(), "Jane Doe");
        assert_eq!(message.parent_id().await.unwrap(), Some(MessageId::new(50)));
        assert!(!message.edited().await.unwrap());
        assert_eq!(transport.call_count("/transcript/"), 1);
    }

    #[tokio::test]
    async fn non_reply_resolves_to_no_parent() {
        let (transport, session) = scripted_session();
        transport.respond_html(Method::Get, "/transcript/message/50", 200, TRANSCRIPT_PAGE);
        let message = Message::new(MessageId::new(50), session, MessageFields::default());

        assert_eq!(message.parent_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_message_is_missing_field() {
        let (transport, session) = scripted_session();
        transport.respond_html(Method::Get, "/transcript/message/99", 200, TRANSCRIPT_PAGE);
        let message = Message::new(MessageId::new(99), session, MessageFields::default());

        assert_matches!(
            message.content().await,
            Err(ChatExchangeError::MissingField { field: "content" })
        );
    }

    #[tokio::test]
    async fn event_seed_avoids_fetch() {
        let (transport, session) = scripted_session();
        let event = ChatEvent {
            id: Some(1),
            kind: EventKind::MessagePosted,
            time_stamp: Default::default(),
            room_id: RoomId::new(3),
            room_name: Some("Sandbox".to_string()),
            user_id: Some(UserId::new(7)),
            user_name: Some("Jane Doe".to_string()),
            content: Some("hi".to_string()),
            target_user_id: None,
            parent_id: None,
            message_id: Some(MessageId::new(52)),
        };
        let message = Message::new(
            MessageId::new(52),
            session,
            MessageFields::from_event(&event),
        );

        assert_eq!(message.content().await.unwrap(), "hi");
        assert_eq!(message.room_id().await.unwrap(), RoomId::new(3));
        assert_eq!(message.user_name().await.unwrap(), "Jane Doe");
        assert_eq!(transport.total_calls(), 0);
    }
}
