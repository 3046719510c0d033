//! Error taxonomy for the chat client.
//!
//! [`ChatExchangeError`] is both the catch-all base error and the carrier of
//! every specialisation. Callers that only care about one family use the
//! classification helpers ([`ChatExchangeError::is_login`],
//! [`ChatExchangeError::is_transport`], ...) instead of matching variants.

use thiserror::Error;

/// Result type used across the chatx crates.
pub type Result<T> = std::result::Result<T, ChatExchangeError>;

/// Every failure the chat client can surface.
#[derive(Debug, Error)]
pub enum ChatExchangeError {
    /// Bad caller input (missing host, empty email, oversized message, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Credentials were rejected, or a restored session failed verification.
    #[error("login failed: {0}")]
    Login(String),

    /// A page the client depends on did not have the expected structure.
    #[error("internal error: {0}")]
    Internal(String),

    /// A lazily resolved field was still empty after its fetch completed.
    #[error("field `{field}` missing after fetch")]
    MissingField {
        /// Name of the field that could not be resolved.
        field: &'static str,
    },

    /// The platform answered with a non-success status code.
    #[error("HTTP {status} from {url}")]
    Http {
        /// Response status code (always >= 400).
        status: u16,
        /// Requested url.
        url: String,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// Opening or reading the room WebSocket failed.
    #[error("socket error: {0}")]
    Socket(String),

    /// A JSON response could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic platform failure with no more specific category.
    #[error("{0}")]
    Exchange(String),
}

impl ChatExchangeError {
    /// Shorthand for [`ChatExchangeError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Shorthand for [`ChatExchangeError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Shorthand for [`ChatExchangeError::Login`].
    pub fn login(message: impl Into<String>) -> Self {
        Self::Login(message.into())
    }

    /// Whether this is a credential or session-verification failure.
    pub fn is_login(&self) -> bool {
        matches!(self, Self::Login(_))
    }

    /// Whether this was rejected caller input.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Whether the platform broke the page contract the client relies on.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::MissingField { .. })
    }

    /// Whether the failure happened on the wire (HTTP or socket).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Request(_) | Self::Socket(_)
        )
    }

    /// Whether repeating the same operation may succeed.
    ///
    /// Only wire failures qualify; 4xx responses other than 429 do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Request(_) | Self::Socket(_) => true,
            _ => false,
        }
    }

    /// Status code for [`ChatExchangeError::Http`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
