//! # chatx-session
//!
//! Authentication state for one chat account:
//!
//! - **Login**: form login against the site, or restoring a saved cookie jar
//! - **Session key**: the `fkey` every state-changing request must carry,
//!   resolved lazily from an authenticated chat page along with the
//!   account's chat identity
//! - **Keyed requests**: [`Session::post_with_key`] for every write the
//!   client performs
//!
//! A [`Session`] is owned by the client and shared by `Arc` with the room
//! channels; nothing outside this crate touches the cookie jar or key.

#![deny(unsafe_code)]

pub mod session;

pub use session::Session;
