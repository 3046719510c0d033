//! Session cookie store.
//!
//! [`CookieJar`] plugs into `reqwest` as its cookie provider, so every
//! response updates it and every request carries it. It serialises to a JSON
//! array of [`StoredCookie`]s, which is the saved-session format handed to
//! callers.
//!
//! Only the parts of cookie handling the platform relies on are implemented:
//! domain and host-only scoping, path prefixes, and `Max-Age`/`Expires`
//! expiry (`Max-Age` wins when both are present). A `Domain` attribute
//! naming a single label such as `com` is refused. Full public-suffix
//! checks are not done.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use reqwest::Url;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use tracing::trace;

use chatx_core::{ChatExchangeError, Result};

/// One cookie as kept by the jar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain without leading dot.
    pub domain: String,
    /// Only sent to `domain` itself, not its subdomains.
    pub host_only: bool,
    /// Path prefix the cookie applies to.
    pub path: String,
    /// When the cookie stops being sent. `None` lasts as long as the jar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(&host, &self.domain)
        };
        domain_ok && path_matches(url.path(), &self.path)
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    fn same_slot(&self, other: &Self) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }
}

/// Thread-safe cookie store shared by the transport and the session.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<StoredCookie>>,
}

impl CookieJar {
    /// Empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one `Set-Cookie` header received from `url`.
    pub fn set_cookie(&self, header: &str, url: &Url) {
        let Some((cookie, expired)) = parse_set_cookie(header, url) else {
            trace!(header, "ignoring unparseable or foreign cookie");
            return;
        };
        let now = Utc::now();
        let mut cookies = self.cookies.write();
        cookies.retain(|c| !c.same_slot(&cookie) && c.is_live(now));
        if !expired {
            cookies.push(cookie);
        }
    }

    /// Value of cookie `name` that would be sent to `url`.
    pub fn get(&self, url: &Url, name: &str) -> Option<String> {
        let now = Utc::now();
        self.cookies
            .read()
            .iter()
            .find(|c| c.name == name && c.is_live(now) && c.matches(url))
            .map(|c| c.value.clone())
    }

    /// [`CookieJar::get`] for a url given as a string. Unparseable urls
    /// match nothing.
    pub fn get_for(&self, url: &str, name: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        self.get(&url, name)
    }

    /// `Cookie` header value for a request to `url`.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let now = Utc::now();
        let cookies = self.cookies.read();
        let pairs: Vec<String> = cookies
            .iter()
            .filter(|c| c.is_live(now) && c.matches(url))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Serialise every cookie that has not expired yet.
    pub fn serialize(&self) -> Result<String> {
        let now = Utc::now();
        let cookies = self.cookies.read();
        let live: Vec<&StoredCookie> = cookies.iter().filter(|c| c.is_live(now)).collect();
        Ok(serde_json::to_string(&live)?)
    }

    /// Replace the jar's contents with a serialised jar.
    pub fn restore(&self, serialized: &str) -> Result<()> {
        let cookies: Vec<StoredCookie> = serde_json::from_str(serialized).map_err(|e| {
            ChatExchangeError::invalid_argument(format!("malformed saved session: {e}"))
        })?;
        *self.cookies.write() = cookies;
        Ok(())
    }

    /// Drop every cookie.
    pub fn clear(&self) {
        self.cookies.write().clear();
    }

    /// Number of stored cookies.
    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    /// Whether the jar is empty.
    pub fn is_empty(&self) -> bool {
        self.cookies.read().is_empty()
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            if let Ok(text) = header.to_str() {
                self.set_cookie(text, url);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_for(url)
            .and_then(|header| HeaderValue::from_str(&header).ok())
    }
}

/// Parse a `Set-Cookie` header. Returns the cookie and whether it is already
/// expired (a deletion), or `None` if the header is malformed or sets a
/// domain `url` may not set.
fn parse_set_cookie(header: &str, url: &Url) -> Option<(StoredCookie, bool)> {
    let host = url.host_str()?.to_lowercase();
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = StoredCookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        domain: host.clone(),
        host_only: true,
        path: default_path(url.path()),
        expires_at: None,
    };
    let now = Utc::now();
    let mut max_age: Option<i64> = None;
    let mut expires: Option<DateTime<Utc>> = None;

    for attribute in parts {
        let (key, val) = attribute
            .split_once('=')
            .map_or((attribute.trim(), ""), |(k, v)| (k.trim(), v.trim()));
        match key.to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => {
                let domain = val.trim_start_matches('.').to_lowercase();
                if !domain_matches(&host, &domain) || !domain.contains('.') {
                    return None;
                }
                cookie.domain = domain;
                cookie.host_only = false;
            }
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "max-age" => max_age = val.parse().ok().or(max_age),
            "expires" => expires = parse_expires(val).or(expires),
            _ => {}
        }
    }

    let expired = match max_age {
        Some(secs) if secs <= 0 => true,
        Some(secs) => {
            cookie.expires_at = TimeDelta::try_seconds(secs).and_then(|d| now.checked_add_signed(d));
            false
        }
        None => {
            cookie.expires_at = expires;
            expires.is_some_and(|at| at <= now)
        }
    };
    Some((cookie, expired))
}

/// `Expires` dates come both as RFC 2822 and with dashes (`01-Jan-1970`).
fn parse_expires(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc2822(&value.replace('-', " ")))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if cookie_path == "/" || request_path == cookie_path {
        return true;
    }
    request_path.strip_prefix(cookie_path).is_some_and(|rest| {
        cookie_path.ends_with('/') || rest.starts_with('/')
    })
}

fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn domain_cookie_reaches_subdomains() {
        let jar = CookieJar::new();
        jar.set_cookie(
            "acct=t=abc&s=def; expires=Fri, 01-Jan-2100 00:00:00 GMT; domain=.stackexchange.com; path=/; secure; HttpOnly",
            &url("https://stackexchange.com/users/login"),
        );

        assert_eq!(
            jar.get(&url("https://chat.stackexchange.com/rooms/1"), "acct").as_deref(),
            Some("t=abc&s=def")
        );
        assert!(jar.get(&url("https://stackoverflow.com/"), "acct").is_none());
    }

    #[test]
    fn get_for_string_url() {
        let jar = CookieJar::new();
        jar.set_cookie("acct=1; path=/", &url("https://stackexchange.com/users/login"));
        assert_eq!(jar.get_for("https://stackexchange.com", "acct").as_deref(), Some("1"));
        assert!(jar.get_for("not a url", "acct").is_none());
    }

    #[test]
    fn host_only_cookie_stays_on_host() {
        let jar = CookieJar::new();
        jar.set_cookie("sid=1", &url("https://stackexchange.com/"));

        assert!(jar.get(&url("https://stackexchange.com/x"), "sid").is_some());
        assert!(jar.get(&url("https://chat.stackexchange.com/"), "sid").is_none());
    }

    #[test]
    fn foreign_domain_is_rejected() {
        let jar = CookieJar::new();
        jar.set_cookie("evil=1; domain=example.com", &url("https://stackexchange.com/"));
        assert!(jar.is_empty());
    }

    #[test]
    fn path_scoping() {
        let jar = CookieJar::new();
        jar.set_cookie("p=1; path=/chats", &url("https://chat.stackexchange.com/"));

        assert!(jar.get(&url("https://chat.stackexchange.com/chats/1/events"), "p").is_some());
        assert!(jar.get(&url("https://chat.stackexchange.com/chatsX"), "p").is_none());
        assert!(jar.get(&url("https://chat.stackexchange.com/rooms"), "p").is_none());
    }

    #[test]
    fn expired_cookie_deletes_existing() {
        let jar = CookieJar::new();
        let site = url("https://stackexchange.com/");
        jar.set_cookie("acct=abc; domain=stackexchange.com; path=/", &site);
        assert_eq!(jar.len(), 1);

        jar.set_cookie("acct=; domain=stackexchange.com; path=/; max-age=0", &site);
        assert!(jar.is_empty());

        jar.set_cookie("acct=abc; domain=stackexchange.com; path=/", &site);
        jar.set_cookie(
            "acct=; domain=stackexchange.com; path=/; expires=Thu, 01-Jan-1970 00:00:00 GMT",
            &site,
        );
        assert!(jar.is_empty());
    }

    #[test]
    fn max_age_sets_future_expiry_and_wins_over_expires() {
        let jar = CookieJar::new();
        let site = url("https://stackexchange.com/");
        jar.set_cookie(
            "acct=abc; path=/; expires=Thu, 01-Jan-1970 00:00:00 GMT; max-age=3600",
            &site,
        );
        assert_eq!(jar.get(&site, "acct").as_deref(), Some("abc"));

        let saved: Vec<StoredCookie> = serde_json::from_str(&jar.serialize().unwrap()).unwrap();
        let expires_at = saved[0].expires_at.unwrap();
        assert!(expires_at > Utc::now() + TimeDelta::minutes(59));
        assert!(expires_at <= Utc::now() + TimeDelta::minutes(60));
    }

    #[test]
    fn lapsed_cookie_is_neither_sent_nor_saved() {
        let jar = CookieJar::new();
        let saved = serde_json::json!([
            {"name": "old", "value": "1", "domain": "stackexchange.com", "host_only": false,
             "path": "/", "expires_at": "2001-01-01T00:00:00Z"},
            {"name": "new", "value": "2", "domain": "stackexchange.com", "host_only": false,
             "path": "/"}
        ]);
        jar.restore(&saved.to_string()).unwrap();
        let site = url("https://chat.stackexchange.com/");

        assert!(jar.get(&site, "old").is_none());
        assert_eq!(jar.header_for(&site).as_deref(), Some("new=2"));
        let kept: Vec<StoredCookie> = serde_json::from_str(&jar.serialize().unwrap()).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "new");
    }

    #[test]
    fn single_label_domain_is_rejected() {
        let jar = CookieJar::new();
        jar.set_cookie("evil=1; domain=.com; path=/", &url("https://stackexchange.com/"));
        assert!(jar.is_empty());
    }

    #[test]
    fn same_slot_is_overwritten() {
        let jar = CookieJar::new();
        let site = url("https://stackexchange.com/");
        jar.set_cookie("a=1; path=/", &site);
        jar.set_cookie("a=2; path=/", &site);
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.get(&site, "a").as_deref(), Some("2"));
    }

    #[test]
    fn header_joins_matching_cookies() {
        let jar = CookieJar::new();
        let site = url("https://stackexchange.com/");
        jar.set_cookie("a=1; path=/", &site);
        jar.set_cookie("b=2; path=/", &site);
        assert_eq!(jar.header_for(&site).as_deref(), Some("a=1; b=2"));
        assert!(jar.header_for(&url("https://stackoverflow.com/")).is_none());
    }

    #[test]
    fn serialize_restore_round_trip() {
        let jar = CookieJar::new();
        jar.set_cookie(
            "acct=xyz; domain=.stackexchange.com; path=/",
            &url("https://stackexchange.com/"),
        );
        let saved = jar.serialize().unwrap();

        let restored = CookieJar::new();
        restored.restore(&saved).unwrap();
        assert_eq!(
            restored.get(&url("https://chat.stackexchange.com/"), "acct").as_deref(),
            Some("xyz")
        );
    }

    #[test]
    fn restore_rejects_garbage() {
        let jar = CookieJar::new();
        assert!(jar.restore("{not json").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn default_path_from_request() {
        assert_eq!(default_path("/users/login"), "/users");
        assert_eq!(default_path("/login"), "/");
        assert_eq!(default_path(""), "/");
    }
}
