//! # chatx-core
//!
//! Foundation types shared by every chatx crate:
//!
//! - **Errors**: [`ChatExchangeError`], the single error taxonomy of the client
//! - **Ids**: `RoomId`, `UserId`, `MessageId` as integer newtypes
//! - **Events**: [`EventKind`] and the room socket wire format ([`parse_frame`])
//! - **Lazy resolution**: [`LazyField`], the coalescing fetch-on-read gate
//! - **Time**: relative time strings (`"2h ago"`) to seconds
//! - **Retry**: [`ReconnectPolicy`] backoff math for room reconnects

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod lazy;
pub mod retry;
pub mod time;

pub use errors::{ChatExchangeError, Result};
pub use events::{ChatEvent, EventKind, FrameBatch, WireEvent, parse_frame};
pub use ids::{MessageId, RoomId, UserId};
pub use lazy::LazyField;
pub use retry::ReconnectPolicy;
pub use time::parse_relative_time;

/// Longest message body the platform accepts.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 500;
