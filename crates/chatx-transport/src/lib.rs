//! # chatx-transport
//!
//! Everything the client needs to talk to the platform's HTML front end:
//!
//! - [`ChatHost`]: which site (and its chat server) a client talks to
//! - [`Transport`]: cookie-bearing request/response capability, with
//!   [`HttpTransport`] as the `reqwest` implementation
//! - [`CookieJar`]: the session's cookie store, serialisable so a login can
//!   be saved and restored
//! - [`Extractor`]: pulls tokens, profiles and transcripts out of pages, with
//!   [`HtmlExtractor`] as the `scraper` implementation
//!
//! Test doubles live in [`testutil`] behind the `testutil` feature.

#![deny(unsafe_code)]

pub mod cookies;
pub mod extract;
pub mod host;
pub mod http;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use cookies::{CookieJar, StoredCookie};
pub use extract::{
    CurrentAccount, Extractor, HtmlExtractor, ProfileFields, RoomInfoFields, TranscriptFields,
};
pub use host::ChatHost;
pub use http::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};
