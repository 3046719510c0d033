//! Room event kinds and the socket wire format.
//!
//! A socket frame is a JSON object keyed by `"r<roomId>"`. Each value holds
//! an `e` array of events and an optional `t` cursor:
//!
//! ```json
//! {"r1": {"e": [{"event_type": 1, "time_stamp": 1700000000, ...}], "t": 9001}}
//! ```
//!
//! A missing `e` array means the frame carries no events for that room.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::{ChatExchangeError, Result};
use crate::ids::{MessageId, RoomId, UserId};

macro_rules! event_kinds {
    ($($(#[$meta:meta])* $variant:ident = $code:literal),+ $(,)?) => {
        /// Category of a room event, numbered as the platform numbers them.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum EventKind {
            $($(#[$meta])* $variant),+
        }

        impl EventKind {
            /// Every kind the client knows about, in code order.
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant),+];

            /// Platform code for this kind.
            #[must_use]
            pub const fn code(self) -> u16 {
                match self {
                    $(EventKind::$variant => $code),+
                }
            }

            /// Kind for a platform code, `None` for codes the client does not know.
            #[must_use]
            pub const fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(EventKind::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

event_kinds! {
    /// A new message was posted.
    MessagePosted = 1,
    /// A message was edited.
    MessageEdited = 2,
    /// A user entered the room.
    UserJoined = 3,
    /// A user left the room.
    UserLeft = 4,
    /// Room name or description changed.
    RoomNameChanged = 5,
    /// A message was starred or unstarred.
    MessageStarred = 6,
    /// Platform debug output.
    DebugMessage = 7,
    /// The current user was pinged.
    UserMentioned = 8,
    /// A message was flagged.
    MessageFlagged = 9,
    /// A message was deleted.
    MessageDeleted = 10,
    /// A file was uploaded.
    FileAdded = 11,
    /// A moderator flag was raised.
    ModeratorFlag = 12,
    /// User settings changed.
    UserSettingsChanged = 13,
    /// Network-wide notification.
    GlobalNotification = 14,
    /// Room access level changed.
    AccessLevelChanged = 15,
    /// Notification targeted at one user.
    UserNotification = 16,
    /// The current user was invited to a room.
    Invitation = 17,
    /// Someone replied to a message of the current user.
    MessageReply = 18,
    /// A message was moved out of the room.
    MessageMovedOut = 19,
    /// A message was moved into the room.
    MessageMovedIn = 20,
    /// Transcript time break marker.
    TimeBreak = 21,
    /// Feed ticker entry.
    FeedTicker = 22,
    /// A user was suspended.
    UserSuspended = 29,
    /// Two user accounts were merged.
    UserMerged = 30,
    /// A user changed name or avatar.
    UserNameOrAvatarChanged = 34,
}

/// One event exactly as it appears inside a frame's `e` array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Event id (absent on some synthetic events).
    #[serde(default)]
    pub id: Option<u64>,
    /// Platform event code.
    pub event_type: u16,
    /// Seconds since the Unix epoch.
    pub time_stamp: i64,
    /// Room the event belongs to.
    #[serde(default)]
    pub room_id: Option<u64>,
    /// Room name at the time of the event.
    #[serde(default)]
    pub room_name: Option<String>,
    /// Originating user.
    #[serde(default)]
    pub user_id: Option<u64>,
    /// Originating user's display name.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Message HTML, when the event concerns a message.
    #[serde(default)]
    pub content: Option<String>,
    /// User targeted by the event (mentions, replies, invitations).
    #[serde(default)]
    pub target_user_id: Option<u64>,
    /// Message being replied to.
    #[serde(default)]
    pub parent_id: Option<u64>,
    /// Message the event concerns.
    #[serde(default)]
    pub message_id: Option<u64>,
}

/// A decoded room event, ready for filtering and dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEvent {
    /// Event id, if the platform sent one.
    pub id: Option<u64>,
    /// Event category.
    pub kind: EventKind,
    /// When the event happened.
    pub time_stamp: DateTime<Utc>,
    /// Room the event belongs to.
    pub room_id: RoomId,
    /// Room name at the time of the event.
    pub room_name: Option<String>,
    /// Originating user.
    pub user_id: Option<UserId>,
    /// Originating user's display name.
    pub user_name: Option<String>,
    /// Message HTML.
    pub content: Option<String>,
    /// User targeted by the event.
    pub target_user_id: Option<UserId>,
    /// Message being replied to.
    pub parent_id: Option<MessageId>,
    /// Message the event concerns.
    pub message_id: Option<MessageId>,
}

impl ChatEvent {
    /// Convert a wire event, falling back to `room` when the event omits its
    /// room id. Returns `None` for event codes the client does not know.
    pub fn from_wire(wire: WireEvent, room: RoomId) -> Option<Self> {
        let kind = EventKind::from_code(wire.event_type)?;
        let time_stamp = Utc
            .timestamp_opt(wire.time_stamp, 0)
            .single()
            .unwrap_or_default();
        Some(Self {
            id: wire.id,
            kind,
            time_stamp,
            room_id: wire.room_id.map_or(room, RoomId::new),
            room_name: wire.room_name,
            user_id: wire.user_id.map(UserId::new),
            user_name: wire.user_name,
            content: wire.content,
            target_user_id: wire.target_user_id.map(UserId::new),
            parent_id: wire.parent_id.map(MessageId::new),
            message_id: wire.message_id.map(MessageId::new),
        })
    }
}

/// Events for one room extracted from a single frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameBatch {
    /// Known events, in the order the frame delivered them.
    pub events: Vec<ChatEvent>,
    /// Latest event cursor, used to resume after a reconnect.
    pub cursor: Option<u64>,
}

#[derive(Deserialize)]
struct RawBatch {
    #[serde(default)]
    e: Option<Vec<Value>>,
    #[serde(default)]
    t: Option<u64>,
}

/// Decode the part of a socket frame addressed to `room`.
///
/// Keys for other rooms are ignored, as are events that fail to decode and
/// events with unknown codes. Fails only when the frame is not a JSON object.
pub fn parse_frame(room: RoomId, frame: &str) -> Result<FrameBatch> {
    let value: Value = serde_json::from_str(frame)?;
    let Value::Object(mut rooms) = value else {
        return Err(ChatExchangeError::Socket(
            "frame is not a JSON object".to_string(),
        ));
    };

    let Some(raw) = rooms.remove(&format!("r{room}")) else {
        return Ok(FrameBatch::default());
    };
    let batch: RawBatch = serde_json::from_value(raw)?;

    let mut events = Vec::new();
    for value in batch.e.unwrap_or_default() {
        let wire: WireEvent = match serde_json::from_value(value) {
            Ok(wire) => wire,
            Err(e) => {
                debug!(room_id = %room, error = %e, "skipping undecodable event");
                continue;
            }
        };
        let code = wire.event_type;
        match ChatEvent::from_wire(wire, room) {
            Some(event) => events.push(event),
            None => debug!(room_id = %room, code, "skipping unknown event type"),
        }
    }

    Ok(FrameBatch {
        events,
        cursor: batch.t,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn room() -> RoomId {
        RoomId::new(1)
    }

    #[test]
    fn codes_round_trip_for_every_kind() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_code(kind.code()), Some(*kind));
        }
        assert_eq!(EventKind::ALL.len(), 25);
        assert_eq!(EventKind::from_code(23), None);
    }

    #[test]
    fn parses_events_in_order() {
        let frame = r#"{"r1":{"e":[
            {"event_type":1,"time_stamp":1700000000,"content":"first","id":10,
             "user_id":5,"user_name":"alice","room_id":1,"room_name":"Sandbox","message_id":100},
            {"event_type":18,"time_stamp":1700000001,"content":"second","id":11,
             "user_id":6,"user_name":"bob","room_id":1,"room_name":"Sandbox",
             "message_id":101,"parent_id":100,"target_user_id":5}
        ],"t":11,"d":1}}"#;

        let batch = parse_frame(room(), frame).unwrap();
        assert_eq!(batch.cursor, Some(11));
        assert_eq!(batch.events.len(), 2);

        let first = &batch.events[0];
        assert_eq!(first.kind, EventKind::MessagePosted);
        assert_eq!(first.content.as_deref(), Some("first"));
        assert_eq!(first.user_id, Some(UserId::new(5)));
        assert_eq!(first.message_id, Some(MessageId::new(100)));
        assert_eq!(first.time_stamp.timestamp(), 1_700_000_000);

        let second = &batch.events[1];
        assert_eq!(second.kind, EventKind::MessageReply);
        assert_eq!(second.parent_id, Some(MessageId::new(100)));
        assert_eq!(second.target_user_id, Some(UserId::new(5)));
    }

    #[test]
    fn missing_event_array_yields_nothing() {
        let batch = parse_frame(room(), r#"{"r1":{"t":42}}"#).unwrap();
        assert!(batch.events.is_empty());
        assert_eq!(batch.cursor, Some(42));
    }

    #[test]
    fn other_rooms_are_ignored() {
        let frame = r#"{"r2":{"e":[{"event_type":1,"time_stamp":1,"room_id":2}]}}"#;
        let batch = parse_frame(room(), frame).unwrap();
        assert_eq!(batch, FrameBatch::default());
    }

    #[test]
    fn unknown_codes_and_bad_events_are_skipped() {
        let frame = r#"{"r1":{"e":[
            {"event_type":99,"time_stamp":1},
            {"event_type":"nope"},
            {"event_type":4,"time_stamp":2,"user_id":7}
        ]}}"#;
        let batch = parse_frame(room(), frame).unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].kind, EventKind::UserLeft);
        assert_eq!(batch.events[0].room_id, room());
    }

    #[test]
    fn non_object_frame_is_an_error() {
        assert_matches!(
            parse_frame(room(), "[1,2]"),
            Err(ChatExchangeError::Socket(_))
        );
        assert_matches!(parse_frame(room(), "not json"), Err(ChatExchangeError::Json(_)));
    }
}
