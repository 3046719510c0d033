//! # chatx-room
//!
//! Live rooms:
//!
//! - [`RoomChannel`]: join/leave state machine, socket watch task with
//!   policy-driven reconnects, event fan-out over `tokio::sync::broadcast`
//! - [`EventFilter`]: ignored event kinds and (optionally timed) user blocks
//! - [`post`]: posting, editing and deleting messages
//! - [`SocketConnector`]: the WebSocket seam, with [`WsConnector`] on
//!   `tokio-tungstenite`

#![deny(unsafe_code)]

pub mod channel;
pub mod filter;
pub mod post;
pub mod socket;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use channel::{ChannelState, CloseReason, RoomChannel, RoomConfig, RoomEvent};
pub use filter::{BlockExpiry, EventFilter};
pub use socket::{EventSocket, SocketConnector, WsConnector};
