//! Site and chat server addressing.

use std::fmt;
use std::str::FromStr;

use chatx_core::{ChatExchangeError, Result};
use reqwest::Url;

/// Sites that run their own chat server.
pub const KNOWN_HOSTS: [&str; 3] = [
    "stackexchange.com",
    "meta.stackexchange.com",
    "stackoverflow.com",
];

/// A site (where accounts log in) and its chat server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatHost {
    name: String,
    site_url: String,
    chat_url: String,
}

impl ChatHost {
    /// Host for one of the [`KNOWN_HOSTS`].
    pub fn new(host: &str) -> Result<Self> {
        let host = host.trim().to_lowercase();
        if host.is_empty() {
            return Err(ChatExchangeError::invalid_argument("host is required"));
        }
        if !KNOWN_HOSTS.contains(&host.as_str()) {
            return Err(ChatExchangeError::invalid_argument(format!(
                "unsupported host `{host}` (expected one of {})",
                KNOWN_HOSTS.join(", ")
            )));
        }
        Ok(Self {
            site_url: format!("https://{host}"),
            chat_url: format!("https://chat.{host}"),
            name: host,
        })
    }

    /// Host with explicit base urls (proxies, mirrors, test servers).
    pub fn custom(site_url: &str, chat_url: &str) -> Result<Self> {
        let site = parse_base(site_url)?;
        let chat = parse_base(chat_url)?;
        Ok(Self {
            name: site.host_str().unwrap_or_default().to_string(),
            site_url: site_url.trim().trim_end_matches('/').to_string(),
            chat_url: chat_url.trim().trim_end_matches('/').to_string(),
        })
    }

    /// Site domain, e.g. `stackexchange.com`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base url of the site, without trailing slash.
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Base url of the chat server, without trailing slash.
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// `path` appended to the site url.
    pub fn site(&self, path: &str) -> String {
        format!("{}{path}", self.site_url)
    }

    /// `path` appended to the chat url.
    pub fn chat(&self, path: &str) -> String {
        format!("{}{path}", self.chat_url)
    }
}

impl FromStr for ChatHost {
    type Err = ChatExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for ChatHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn parse_base(url: &str) -> Result<Url> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ChatExchangeError::invalid_argument("host url is required"));
    }
    Url::parse(trimmed)
        .map_err(|e| ChatExchangeError::invalid_argument(format!("invalid url `{trimmed}`: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
