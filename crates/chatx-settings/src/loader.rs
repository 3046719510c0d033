//! Reading `~/.chatx/settings.json` and applying `CHATX_*` overrides.
//!
//! Every settings struct is `#[serde(default)]`, so the file is parsed
//! straight into [`ChatSettings`]: keys it leaves out keep their compiled
//! defaults, section by section. Environment overrides go on top, and the
//! result is validated once at the end.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{
    ChatSettings, EVENT_CAPACITY, HTTP_TIMEOUT_MS, Limit, MAX_MESSAGE_LENGTH,
    RECONNECT_BASE_DELAY_MS, RECONNECT_MAX_DELAY_MS, THROTTLE_DELAY_MS,
};

/// `~/.chatx/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".chatx").join("settings.json")
}

/// Settings from [`settings_path`] and the process environment.
pub fn load_settings() -> Result<ChatSettings> {
    load_settings_from_path(&settings_path())
}

/// Settings from `path` and the process environment. A missing file means
/// defaults.
pub fn load_settings_from_path(path: &Path) -> Result<ChatSettings> {
    load_with(path, |key| std::env::var(key).ok())
}

/// [`load_settings_from_path`] with environment lookups going through `env`.
pub fn load_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<ChatSettings> {
    let mut settings = read_file(path)?;
    apply_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

fn read_file(path: &Path) -> Result<ChatSettings> {
    if !path.exists() {
        debug!(?path, "no settings file, using defaults");
        return Ok(ChatSettings::default());
    }
    debug!(?path, "reading settings file");
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `CHATX_*` overrides read through `env`.
///
/// A value that does not parse, or falls outside its setting's range, is
/// logged and skipped. `CHATX_RECONNECT_MAX_ATTEMPTS=0` means unlimited.
pub fn apply_overrides(settings: &mut ChatSettings, env: impl Fn(&str) -> Option<String>) {
    let env = Overrides { lookup: env };

    if let Some(host) = env.text("CHATX_HOST") {
        settings.host = host;
    }
    if let Some(agent) = env.text("CHATX_USER_AGENT") {
        settings.http.user_agent = agent;
    }
    if let Some(ms) = env.number("CHATX_HTTP_TIMEOUT_MS", HTTP_TIMEOUT_MS) {
        settings.http.timeout_ms = ms;
    }
    if let Some(ms) = env.number("CHATX_THROTTLE_DELAY_MS", THROTTLE_DELAY_MS) {
        settings.broadcast.throttle_delay_ms = ms;
    }

    let attempts = Limit {
        key: "reconnect.maxAttempts",
        min: 0,
        max: u64::from(u32::MAX),
    };
    if let Some(n) = env.number("CHATX_RECONNECT_MAX_ATTEMPTS", attempts) {
        settings.reconnect.max_attempts = u32::try_from(n).ok().filter(|n| *n > 0);
    }
    if let Some(ms) = env.number("CHATX_RECONNECT_BASE_DELAY_MS", RECONNECT_BASE_DELAY_MS) {
        settings.reconnect.base_delay_ms = ms;
    }
    if let Some(ms) = env.number("CHATX_RECONNECT_MAX_DELAY_MS", RECONNECT_MAX_DELAY_MS) {
        settings.reconnect.max_delay_ms = ms;
    }

    if let Some(n) = env.count("CHATX_EVENT_CAPACITY", EVENT_CAPACITY) {
        settings.events.channel_capacity = n;
    }
    if let Some(n) = env.count("CHATX_MAX_MESSAGE_LENGTH", MAX_MESSAGE_LENGTH) {
        settings.messages.max_length = n;
    }
    if let Some(level) = env.text("CHATX_LOG_LEVEL") {
        settings.logging.level = level;
    }
}

struct Overrides<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Overrides<F> {
    fn text(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn number(&self, name: &str, limit: Limit) -> Option<u64> {
        let raw = self.text(name)?;
        let value = raw.parse::<u64>().ok().filter(|n| limit.contains(*n));
        if value.is_none() {
            warn!(
                var = name,
                value = %raw,
                min = limit.min,
                max = limit.max,
                "ignoring invalid {}",
                limit.key
            );
        }
        value
    }

    fn count(&self, name: &str, limit: Limit) -> Option<usize> {
        self.number(name, limit).and_then(|n| usize::try_from(n).ok())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
