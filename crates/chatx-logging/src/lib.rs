//! # chatx-logging
//!
//! Structured logging setup for applications embedding the chat client.
//!
//! The library crates only emit `tracing` events; this crate installs the
//! subscriber. `RUST_LOG` wins when set, otherwise the configured default
//! level plus per-module overrides apply. Module levels can be changed at
//! runtime through the returned [`LoggingGuard`].

#![deny(unsafe_code)]

use std::sync::Arc;

use chatx_settings::LogSettings;
use parking_lot::RwLock;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, reload};

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// A global subscriber was already installed.
    #[error("logging already initialised: {0}")]
    AlreadyInitialised(String),
    /// The filter could not be swapped at runtime.
    #[error("failed to reload log filter: {0}")]
    Reload(String),
}

/// Configuration for the logging subsystem.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Default log level. Overridden by `RUST_LOG`.
    pub level: Level,
    /// Per-module level overrides (e.g. `chatx_room` => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Build from the `logging` section of the client settings.
    ///
    /// An unparseable level falls back to `INFO`.
    pub fn from_settings(settings: &LogSettings) -> Self {
        Self {
            level: settings.level.parse().unwrap_or(Level::INFO),
            module_levels: Vec::new(),
            json: settings.json,
        }
    }
}

/// Handle for adjusting the installed subscriber.
pub struct LoggingGuard {
    base: Level,
    module_levels: Arc<RwLock<Vec<(String, Level)>>>,
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LoggingGuard {
    /// Change the log level for a specific module at runtime.
    pub fn set_module_level(&self, module: &str, level: Level) -> Result<(), LoggingError> {
        let directive = {
            let mut levels = self.module_levels.write();
            if let Some(entry) = levels.iter_mut().find(|(m, _)| m == module) {
                entry.1 = level;
            } else {
                levels.push((module.to_string(), level));
            }
            build_filter_directive(self.base, &levels)
        };
        self.handle
            .reload(EnvFilter::new(directive))
            .map_err(|e| LoggingError::Reload(e.to_string()))
    }

    /// Current per-module overrides.
    pub fn module_levels(&self) -> Vec<(String, Level)> {
        self.module_levels.read().clone()
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let directive = build_filter_directive(config.level, &config.module_levels);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));
    let (filter_layer, handle) = reload::Layer::new(env_filter);

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialised(e.to_string()))?;

    Ok(LoggingGuard {
        base: config.level,
        module_levels: Arc::new(RwLock::new(config.module_levels)),
        handle,
    })
}

/// Filter directive string: `"<level>,<module>=<level>,..."`.
pub fn build_filter_directive(level: Level, module_levels: &[(String, Level)]) -> String {
    let mut directive = level.to_string().to_lowercase();
    for (module, level) in module_levels {
        directive.push(',');
        directive.push_str(module);
        directive.push('=');
        directive.push_str(&level.to_string().to_lowercase());
    }
    directive
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_without_overrides() {
        assert_eq!(build_filter_directive(Level::WARN, &[]), "warn");
    }

    #[test]
    fn directive_with_module_overrides() {
        let modules = vec![
            ("chatx_room".to_string(), Level::DEBUG),
            ("chatx_session".to_string(), Level::TRACE),
        ];
        assert_eq!(
            build_filter_directive(Level::INFO, &modules),
            "info,chatx_room=debug,chatx_session=trace"
        );
    }

    #[test]
    fn config_from_settings() {
        let settings = LogSettings {
            level: "debug".to_string(),
            json: true,
        };
        let config = LoggingConfig::from_settings(&settings);
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.json);
    }

    #[test]
    fn config_from_settings_bad_level_falls_back() {
        let settings = LogSettings {
            level: "loud".to_string(),
            json: false,
        };
        assert_eq!(LoggingConfig::from_settings(&settings).level, Level::INFO);
    }
}
