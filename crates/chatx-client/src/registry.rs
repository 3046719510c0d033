//! Entity registry: at most one live instance per (kind, id).

use std::sync::Arc;

use dashmap::DashMap;

use chatx_core::{ChatEvent, MessageId, RoomId, UserId};
use chatx_session::Session;

use crate::message::{Message, MessageFields};
use crate::room::{Room, RoomFields};
use crate::user::{User, UserFields};

/// Caches users, rooms and messages for one client.
///
/// A seed only applies when the entity is first created; later lookups
/// return the cached instance and drop their seed. Entries are never evicted.
pub struct EntityRegistry {
    session: Arc<Session>,
    users: DashMap<UserId, Arc<User>>,
    rooms: DashMap<RoomId, Arc<Room>>,
    messages: DashMap<MessageId, Arc<Message>>,
}

impl EntityRegistry {
    /// Empty registry whose entities fetch through `session`.
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            users: DashMap::new(),
            rooms: DashMap::new(),
            messages: DashMap::new(),
        }
    }

    /// The user with `id`, created from `seed` if not cached yet.
    pub fn user(&self, id: UserId, seed: Option<UserFields>) -> Arc<User> {
        let entry = self.users.entry(id).or_insert_with(|| {
            Arc::new(User::new(id, Arc::clone(&self.session), seed.unwrap_or_default()))
        });
        Arc::clone(entry.value())
    }

    /// The room with `id`, created from `seed` if not cached yet.
    pub fn room(&self, id: RoomId, seed: Option<RoomFields>) -> Arc<Room> {
        let entry = self.rooms.entry(id).or_insert_with(|| {
            Arc::new(Room::new(id, Arc::clone(&self.session), seed.unwrap_or_default()))
        });
        Arc::clone(entry.value())
    }

    /// The message with `id`, created from `seed` if not cached yet.
    pub fn message(&self, id: MessageId, seed: Option<MessageFields>) -> Arc<Message> {
        let entry = self.messages.entry(id).or_insert_with(|| {
            Arc::new(Message::new(
                id,
                Arc::clone(&self.session),
                seed.unwrap_or_default(),
            ))
        });
        Arc::clone(entry.value())
    }

    /// The message an event refers to, seeded from the event. `None` for
    /// events that carry no message id.
    pub fn message_from_event(&self, event: &ChatEvent) -> Option<Arc<Message>> {
        let id = event.message_id?;
        Some(self.message(id, Some(MessageFields::from_event(event))))
    }

    /// Number of cached users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Number of cached rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of cached messages.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.rooms.is_empty() && self.messages.is_empty()
    }
}

impl std::fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("users", &self.users.len())
            .field("rooms", &self.rooms.len())
            .field("messages", &self.messages.len())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::scripted_session;
    use chatx_core::EventKind;

    fn registry() -> EntityRegistry {
        let (_, session) = scripted_session();
        EntityRegistry::new(session)
    }

    #[test]
    fn repeated_lookups_share_one_instance() {
        let registry = registry();
        let a = registry.user(UserId::new(7), None);
        let b = registry.user(UserId::new(7), None);
        assert!(Arc::ptr_eq(&a, &b));

        let r1 = registry.room(RoomId::new(1), None);
        let r2 = registry.room(RoomId::new(1), None);
        assert!(Arc::ptr_eq(&r1, &r2));

        let m1 = registry.message(MessageId::new(5), None);
        let m2 = registry.message(MessageId::new(5), None);
        assert!(Arc::ptr_eq(&m1, &m2));
    }

    #[test]
    fn first_seed_wins() {
        let registry = registry();
        let first = registry.user(
            UserId::new(7),
            Some(UserFields {
                name: Some("First".to_string()),
                ..UserFields::default()
            }),
        );
        let second = registry.user(
            UserId::new(7),
            Some(UserFields {
                name: Some("Second".to_string()),
                ..UserFields::default()
            }),
        );
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.known_fields().name.as_deref(), Some("First"));
    }

    #[test]
    fn partitions_are_independent() {
        let registry = registry();
        assert!(registry.is_empty());
        let _ = registry.user(UserId::new(1), None);
        let _ = registry.room(RoomId::new(1), None);
        let _ = registry.room(RoomId::new(2), None);
        assert_eq!(registry.user_count(), 1);
        assert_eq!(registry.room_count(), 2);
        assert_eq!(registry.message_count(), 0);
        assert!(!registry.is_empty());
    }

    #[test]
    fn message_from_event_seeds_fields() {
        let registry = registry();
        let event = ChatEvent {
            id: Some(1),
            kind: EventKind::MessagePosted,
            time_stamp: Default::default(),
            room_id: RoomId::new(3),
            room_name: None,
            user_id: Some(UserId::new(7)),
            user_name: None,
            content: Some("hi".to_string()),
            target_user_id: None,
            parent_id: None,
            message_id: Some(MessageId::new(9)),
        };
        let message = registry.message_from_event(&event).unwrap();
        assert_eq!(message.known_fields().content.as_deref(), Some("hi"));
        assert_eq!(message.known_fields().room_id, Some(RoomId::new(3)));

        let no_message = ChatEvent {
            message_id: None,
            ..event
        };
        assert!(registry.message_from_event(&no_message).is_none());
    }
}
