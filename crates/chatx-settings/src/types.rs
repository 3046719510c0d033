//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file only needs the keys it changes.

use chatx_core::{DEFAULT_MAX_MESSAGE_LENGTH, ReconnectPolicy};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for a chat client.
///
/// ```json
/// {
///   "host": "meta.stackexchange.com",
///   "broadcast": { "throttleDelayMs": 6000 },
///   "reconnect": { "maxAttempts": 10, "baseDelayMs": 500 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// Site whose chat server the client talks to.
    pub host: String,
    /// HTTP transport settings.
    pub http: HttpSettings,
    /// Multi-room broadcast pacing.
    pub broadcast: BroadcastSettings,
    /// Room socket reconnect policy.
    pub reconnect: ReconnectPolicy,
    /// Room event dispatch.
    pub events: EventSettings,
    /// Outbound message limits.
    pub messages: MessageSettings,
    /// Log output.
    pub logging: LogSettings,
}

impl ChatSettings {
    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(SettingsError::EmptyHost);
        }
        HTTP_TIMEOUT_MS.check(self.http.timeout_ms)?;
        THROTTLE_DELAY_MS.check(self.broadcast.throttle_delay_ms)?;
        if let Some(attempts) = self.reconnect.max_attempts {
            RECONNECT_MAX_ATTEMPTS.check(u64::from(attempts))?;
        }
        RECONNECT_BASE_DELAY_MS.check(self.reconnect.base_delay_ms)?;
        Limit {
            min: self.reconnect.base_delay_ms,
            ..RECONNECT_MAX_DELAY_MS
        }
        .check(self.reconnect.max_delay_ms)?;
        EVENT_CAPACITY.check_len(self.events.channel_capacity)?;
        MAX_MESSAGE_LENGTH.check_len(self.messages.max_length)?;

        let level = self.logging.level.to_ascii_lowercase();
        if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            return Err(SettingsError::UnknownLevel(self.logging.level.clone()));
        }
        Ok(())
    }
}

/// Accepted range of one numeric setting.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Limit {
    pub(crate) key: &'static str,
    pub(crate) min: u64,
    pub(crate) max: u64,
}

impl Limit {
    pub(crate) fn contains(&self, value: u64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    fn check(&self, value: u64) -> Result<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(SettingsError::OutOfRange {
                key: self.key,
                value,
                min: self.min,
                max: self.max,
            })
        }
    }

    fn check_len(&self, value: usize) -> Result<()> {
        self.check(u64::try_from(value).unwrap_or(u64::MAX))
    }
}

pub(crate) const HTTP_TIMEOUT_MS: Limit = Limit {
    key: "http.timeoutMs",
    min: 100,
    max: 600_000,
};
pub(crate) const THROTTLE_DELAY_MS: Limit = Limit {
    key: "broadcast.throttleDelayMs",
    min: 0,
    max: 600_000,
};
pub(crate) const RECONNECT_MAX_ATTEMPTS: Limit = Limit {
    key: "reconnect.maxAttempts",
    min: 1,
    max: 4_294_967_295,
};
pub(crate) const RECONNECT_BASE_DELAY_MS: Limit = Limit {
    key: "reconnect.baseDelayMs",
    min: 0,
    max: 600_000,
};
pub(crate) const RECONNECT_MAX_DELAY_MS: Limit = Limit {
    key: "reconnect.maxDelayMs",
    min: 0,
    max: 3_600_000,
};
pub(crate) const EVENT_CAPACITY: Limit = Limit {
    key: "events.channelCapacity",
    min: 1,
    max: 1_000_000,
};
pub(crate) const MAX_MESSAGE_LENGTH: Limit = Limit {
    key: "messages.maxLength",
    min: 1,
    max: 100_000,
};

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            host: "stackexchange.com".to_string(),
            http: HttpSettings::default(),
            broadcast: BroadcastSettings::default(),
            reconnect: ReconnectPolicy::default(),
            events: EventSettings::default(),
            messages: MessageSettings::default(),
            logging: LogSettings::default(),
        }
    }
}

/// HTTP transport settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpSettings {
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: format!("chatx/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Pacing for sending one message to many rooms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BroadcastSettings {
    /// Wait inserted before every second send of a broadcast run.
    pub throttle_delay_ms: u64,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            throttle_delay_ms: 5000,
        }
    }
}

/// Room event dispatch settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSettings {
    /// Buffered events per room before slow subscribers start lagging.
    pub channel_capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Outbound message limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageSettings {
    /// Longest accepted message, in characters.
    pub max_length: usize,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }
}

/// Log output settings, consumed by `chatx-logging`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogSettings {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
