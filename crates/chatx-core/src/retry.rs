//! Reconnect policy and backoff calculation.
//!
//! The room socket reconnects whenever it closes without the user leaving.
//! How often and how patiently is a deployment decision, so the policy is
//! plain configuration:
//!
//! - [`ReconnectPolicy`]: attempt cap (unbounded by default) and backoff
//! - [`calculate_backoff_delay`]: exponential backoff capped at a maximum

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default base delay in milliseconds (0: first retry is immediate).
pub const DEFAULT_BASE_DELAY_MS: u64 = 0;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// How a room channel retries after its socket drops.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts before giving up; `None` retries forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Base delay for exponential backoff in ms (default: 0).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay between attempts in ms (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl ReconnectPolicy {
    /// Whether attempt number `attempt` (1-based) may still run.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt <= max)
    }

    /// Delay to wait before attempt number `attempt` (1-based).
    ///
    /// The first attempt waits `base_delay_ms`; each further attempt doubles
    /// it, up to `max_delay_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            attempt.saturating_sub(1),
            self.base_delay_ms,
            self.max_delay_ms,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Exponential backoff: `min(max_delay, base_delay * 2^attempt)`.
///
/// `attempt` is zero-based.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1u64 << attempt.min(31))
        .min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_unbounded_and_immediate() {
        let policy = ReconnectPolicy::default();
        assert!(policy.allows(1));
        assert!(policy.allows(u32::MAX));
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(10), Duration::ZERO);
    }

    #[test]
    fn capped_policy_stops_after_max() {
        let policy = ReconnectPolicy {
            max_attempts: Some(3),
            ..ReconnectPolicy::default()
        };
        assert!(policy.allows(3));
        assert!(!policy.allows(4));
    }

    #[test]
    fn backoff_doubles_until_cap() {
        let policy = ReconnectPolicy {
            max_attempts: None,
            base_delay_ms: 500,
            max_delay_ms: 3000,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(3000));
    }

    #[test]
    fn backoff_saturates_on_huge_attempts() {
        assert_eq!(calculate_backoff_delay(200, 1000, 60_000), 60_000);
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let policy: ReconnectPolicy = serde_json::from_str(r#"{"maxAttempts":5}"#).unwrap();
        assert_eq!(policy.max_attempts, Some(5));
        assert_eq!(policy.max_delay_ms, DEFAULT_MAX_DELAY_MS);
    }
}
