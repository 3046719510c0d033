//! # chatx-client
//!
//! Client for a chat platform that only speaks HTML pages and per-room
//! WebSockets.
//!
//! - [`Client`]: login and saved sessions, joined rooms, messaging,
//!   throttled multi-room [`Client::broadcast`]
//! - [`User`], [`Room`], [`Message`]: entities whose fields are fetched from
//!   their pages on first read, one request per page
//! - [`EntityRegistry`]: one shared instance per entity id
//! - [`BroadcastCoordinator`]: the send pacing behind `broadcast`
//!
//! ```no_run
//! # async fn demo() -> chatx_client::Result<()> {
//! let client = chatx_client::Client::new("stackexchange.com", Default::default())?;
//! client.login("me@example.com", "hunter2").await?;
//! let room = client.join_room(chatx_client::RoomId::new(1)).await?;
//! let mut events = room.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod broadcast;
pub mod client;
pub mod message;
pub mod registry;
pub mod room;
pub mod user;

#[cfg(test)]
mod testutil;

pub use broadcast::{BroadcastCoordinator, BroadcastRun, MessageSender};
pub use client::Client;
pub use message::{Message, MessageFields};
pub use registry::EntityRegistry;
pub use room::{Room, RoomFields};
pub use user::{User, UserFields};

pub use chatx_core::{ChatEvent, ChatExchangeError, EventKind, MessageId, Result, RoomId, UserId};
pub use chatx_logging::{LoggingConfig, LoggingGuard, init_logging};
pub use chatx_room::{ChannelState, CloseReason, RoomChannel, RoomEvent};
pub use chatx_settings::{ChatSettings, load_settings};
pub use chatx_transport::ChatHost;
