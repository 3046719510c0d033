//! # chatx-settings
//!
//! Layered configuration for the chat client.
//!
//! Settings are layered, later layers winning:
//! 1. compiled defaults ([`ChatSettings::default()`])
//! 2. `~/.chatx/settings.json`, where missing keys keep their defaults
//! 3. `CHATX_*` environment variables
//!
//! The merged value is checked with [`ChatSettings::validate`] before it is
//! returned.
//!
//! There is no process-wide settings instance: each `Client` owns the value
//! it was built with.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_overrides, load_settings, load_settings_from_path, load_with, settings_path};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
