//! Page extraction.
//!
//! The platform has no machine API, so identity, tokens and entity fields
//! are read out of its HTML pages. [`Extractor`] names each page contract the
//! client relies on; [`HtmlExtractor`] implements them with `scraper`.
//!
//! Extraction never fails: anything not found comes back as `None` and the
//! caller decides whether that is an error.

use scraper::{ElementRef, Html, Selector};

use chatx_core::time::parse_relative_time;
use chatx_core::{MessageId, RoomId, UserId};

/// The logged-in account as shown in the chat top bar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentAccount {
    /// Chat user id.
    pub id: UserId,
    /// Display name.
    pub name: String,
}

/// Fields read from a chat user profile page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileFields {
    /// Display name.
    pub name: Option<String>,
    /// Free-text "about" blurb.
    pub about: Option<String>,
    /// Whether the status line carries the moderator diamond.
    pub is_moderator: bool,
    /// Rooms the user is in.
    pub room_count: Option<u64>,
    /// Messages the user has posted.
    pub message_count: Option<u64>,
    /// Parent-site reputation.
    pub reputation: Option<u64>,
    /// Seconds since the user was last seen.
    pub last_seen: Option<u64>,
    /// Seconds since the user last posted.
    pub last_message: Option<u64>,
}

/// Fields read from the transcript page of one message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranscriptFields {
    /// Message body as rendered HTML.
    pub content: Option<String>,
    /// Room the transcript belongs to.
    pub room_id: Option<RoomId>,
    /// Name of that room.
    pub room_name: Option<String>,
    /// Whether the message carries an edit marker.
    pub edited: bool,
    /// Author id.
    pub user_id: Option<UserId>,
    /// Author display name.
    pub user_name: Option<String>,
    /// Message this one replies to.
    pub parent_id: Option<MessageId>,
    /// Whether the message element was on the page at all.
    pub found: bool,
}

/// Fields read from a room info page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoomInfoFields {
    /// Room name.
    pub name: Option<String>,
    /// Room description.
    pub description: Option<String>,
}

/// Page contracts the client depends on.
pub trait Extractor: Send + Sync {
    /// Form token on the site login page.
    fn login_token(&self, html: &str) -> Option<String>;

    /// Session key (`fkey`) on an authenticated chat page.
    fn chat_key(&self, html: &str) -> Option<String>;

    /// Logged-in account on an authenticated chat page.
    fn current_account(&self, html: &str) -> Option<CurrentAccount>;

    /// Whether a site page was rendered for a logged-in user.
    fn has_my_profile(&self, html: &str) -> bool;

    /// Chat user profile page.
    fn profile(&self, html: &str) -> ProfileFields;

    /// Transcript page, looking for message `id`.
    fn transcript(&self, html: &str, id: MessageId) -> TranscriptFields;

    /// Room info page.
    fn room_info(&self, html: &str) -> RoomInfoFields;
}

/// [`Extractor`] for the platform's current markup.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    /// New extractor.
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for HtmlExtractor {
    fn login_token(&self, html: &str) -> Option<String> {
        fkey_input(&Html::parse_document(html))
    }

    fn chat_key(&self, html: &str) -> Option<String> {
        fkey_input(&Html::parse_document(html))
    }

    fn current_account(&self, html: &str) -> Option<CurrentAccount> {
        let doc = Html::parse_document(html);
        let link = select_first(&doc, r#".topbar-menu-links a[href*="/users/"]"#)?;
        let id = link.value().attr("href").and_then(id_after("/users/"))?;
        let name = text_of(link)?;
        Some(CurrentAccount {
            id: UserId::new(id),
            name,
        })
    }

    fn has_my_profile(&self, html: &str) -> bool {
        select_first(&Html::parse_document(html), ".my-profile").is_some()
    }

    fn profile(&self, html: &str) -> ProfileFields {
        let doc = Html::parse_document(html);
        let mut fields = ProfileFields {
            name: select_first(&doc, "h1").and_then(text_of),
            is_moderator: select_first(&doc, ".user-status")
                .and_then(text_of)
                .is_some_and(|s| s.contains('♦')),
            room_count: select_first(&doc, ".user-room-count-xxl")
                .and_then(text_of)
                .and_then(|s| parse_count(&s)),
            message_count: select_first(&doc, ".user-message-count-xxl")
                .and_then(text_of)
                .and_then(|s| parse_count(&s)),
            reputation: select_first(&doc, ".reputation-score").and_then(|el| {
                el.value()
                    .attr("title")
                    .and_then(parse_count)
                    .or_else(|| text_of(el).and_then(|s| parse_count(&s)))
            }),
            ..ProfileFields::default()
        };

        let Ok(rows) = Selector::parse("tr") else {
            return fields;
        };
        let (Ok(key_sel), Ok(value_sel)) = (
            Selector::parse(".user-keycell"),
            Selector::parse(".user-valuecell"),
        ) else {
            return fields;
        };
        for row in doc.select(&rows) {
            let key = row.select(&key_sel).next().and_then(text_of);
            let value = row.select(&value_sel).next().and_then(text_of);
            let (Some(key), Some(value)) = (key, value) else {
                continue;
            };
            match key.to_lowercase().as_str() {
                "about" => fields.about = Some(value),
                "last seen" => fields.last_seen = parse_relative_time(&value),
                "last message" => fields.last_message = parse_relative_time(&value),
                _ => {}
            }
        }
        fields
    }

    fn transcript(&self, html: &str, id: MessageId) -> TranscriptFields {
        let doc = Html::parse_document(html);
        let mut fields = TranscriptFields::default();

        if let Some(room_link) = select_first(&doc, ".room-name a") {
            fields.room_name = text_of(room_link);
            fields.room_id = room_link
                .value()
                .attr("href")
                .and_then(id_after("/rooms/"))
                .map(RoomId::new);
        }

        let Some(message) = select_first(&doc, &format!("#message-{id}")) else {
            return fields;
        };
        fields.found = true;
        fields.content =
            select_within(message, ".content").map(|el| el.inner_html().trim().to_string());
        fields.edited = select_within(message, ".edits").is_some();
        fields.parent_id = select_within(message, ".reply-info")
            .and_then(|el| el.value().attr("href"))
            .and_then(id_after("/message/"))
            .map(MessageId::new);

        let monologue = message
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().classes().any(|c| c == "monologue"));
        if let Some(monologue) = monologue {
            fields.user_id = monologue
                .value()
                .classes()
                .find_map(|c| c.strip_prefix("user-")?.parse().ok())
                .map(UserId::new);
            fields.user_name = select_within(monologue, ".signature .username").and_then(text_of);
        }
        fields
    }

    fn room_info(&self, html: &str) -> RoomInfoFields {
        let doc = Html::parse_document(html);
        RoomInfoFields {
            name: select_first(&doc, "h1").and_then(text_of),
            description: select_first(&doc, ".roomcard-xxl p").and_then(text_of),
        }
    }
}

fn fkey_input(doc: &Html) -> Option<String> {
    select_first(doc, r#"input[name="fkey"]"#)?
        .value()
        .attr("value")
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn select_first<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector).next()
}

fn select_within<'a>(el: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    el.select(&selector).next()
}

/// Trimmed text content, `None` when blank.
fn text_of(el: ElementRef<'_>) -> Option<String> {
    let text = el.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Parser for the integer following `marker` in a url path
/// (`/users/42/name` with marker `/users/` gives 42).
fn id_after(marker: &'static str) -> impl Fn(&str) -> Option<u64> {
    move |href: &str| {
        let (_, rest) = href.split_once(marker)?;
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    }
}

/// Counts render as `1,234` or abbreviated as `12.3k`.
fn parse_count(text: &str) -> Option<u64> {
    let text = text.trim().replace(',', "").to_lowercase();
    if let Some(thousands) = text.strip_suffix('k') {
        let value: f64 = thousands.trim().parse().ok()?;
        return (value >= 0.0).then(|| (value * 1000.0).round() as u64);
    }
    text.parse().ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"<html><body>
        <form id="login-form" method="post" action="/users/login">
            <input type="hidden" name="fkey" value="0123abcd">
            <input type="email" name="email">
        </form></body></html>"#;

    const CHAT_PAGE: &str = r#"<html><body>
        <div class="topbar-menu-links">
            <a href="/users/31337/jane-doe" title="Jane Doe">Jane Doe</a>
            <a href="/faq">help</a>
        </div>
        <input id="fkey" name="fkey" type="hidden" value="feedbeef">
        </body></html>"#;

    const PROFILE_PAGE: &str = r#"<html><body>
        <h1>Jane Doe</h1>
        <div class="user-status">♦</div>
        <div class="user-room-count-xxl">12</div>
        <div class="user-message-count-xxl">1,234</div>
        <span class="reputation-score" title="23,456">23.5k</span>
        <table>
            <tr><td class="user-keycell">about</td><td class="user-valuecell">Just here to chat.</td></tr>
            <tr><td class="user-keycell">last seen</td><td class="user-valuecell">5m ago</td></tr>
            <tr><td class="user-keycell">last message</td><td class="user-valuecell">2h ago</td></tr>
        </table>
        </body></html>"#;

    const TRANSCRIPT_PAGE: &str = r##"<html><body>
        <div id="info"><div class="room-name"><a href="/rooms/11540/charcoal-hq">Charcoal HQ</a></div></div>
        <div class="monologue user-31337">
            <div class="signature"><div class="username">Jane Doe</div></div>
            <div class="messages">
                <div class="message" id="message-100">
                    <div class="content">first</div>
                </div>
                <div class="message" id="message-101">
                    <a class="reply-info" href="/transcript/message/100#100"></a>
                    <div class="content"><b>second</b></div>
                    <span class="edits">1</span>
                </div>
            </div>
        </div>
        </body></html>"##;

    #[test]
    fn login_token() {
        assert_eq!(HtmlExtractor.login_token(LOGIN_PAGE).as_deref(), Some("0123abcd"));
        assert!(HtmlExtractor.login_token("<html></html>").is_none());
        assert!(HtmlExtractor.login_token(r#"<input name="fkey" value="">"#).is_none());
    }

    #[test]
    fn chat_key_and_account() {
        assert_eq!(HtmlExtractor.chat_key(CHAT_PAGE).as_deref(), Some("feedbeef"));
        assert_eq!(
            HtmlExtractor.current_account(CHAT_PAGE),
            Some(CurrentAccount {
                id: UserId::new(31337),
                name: "Jane Doe".to_string()
            })
        );
        assert!(HtmlExtractor.current_account("<html></html>").is_none());
    }

    #[test]
    fn my_profile_fragment() {
        assert!(HtmlExtractor.has_my_profile(r#"<a class="my-profile" href="/users/1">me</a>"#));
        assert!(!HtmlExtractor.has_my_profile(r#"<a href="/users/login">log in</a>"#));
    }

    #[test]
    fn profile_fields() {
        let p = HtmlExtractor.profile(PROFILE_PAGE);
        assert_eq!(p.name.as_deref(), Some("Jane Doe"));
        assert!(p.is_moderator);
        assert_eq!(p.room_count, Some(12));
        assert_eq!(p.message_count, Some(1234));
        assert_eq!(p.reputation, Some(23456));
        assert_eq!(p.about.as_deref(), Some("Just here to chat."));
        assert_eq!(p.last_seen, Some(300));
        assert_eq!(p.last_message, Some(7200));
    }

    #[test]
    fn profile_missing_elements_are_none() {
        let p = HtmlExtractor.profile("<html><body><h1>Someone</h1></body></html>");
        assert_eq!(p.name.as_deref(), Some("Someone"));
        assert!(!p.is_moderator);
        assert!(p.room_count.is_none());
        assert!(p.last_seen.is_none());
    }

    #[test]
    fn transcript_reply_message() {
        let t = HtmlExtractor.transcript(TRANSCRIPT_PAGE, MessageId::new(101));
        assert!(t.found);
        assert_eq!(t.content.as_deref(), Some("<b>second</b>"));
        assert_eq!(t.room_id, Some(RoomId::new(11540)));
        assert_eq!(t.room_name.as_deref(), Some("Charcoal HQ"));
        assert!(t.edited);
        assert_eq!(t.user_id, Some(UserId::new(31337)));
        assert_eq!(t.user_name.as_deref(), Some("Jane Doe"));
        assert_eq!(t.parent_id, Some(MessageId::new(100)));
    }

    #[test]
    fn transcript_plain_message() {
        let t = HtmlExtractor.transcript(TRANSCRIPT_PAGE, MessageId::new(100));
        assert_eq!(t.content.as_deref(), Some("first"));
        assert!(!t.edited);
        assert!(t.parent_id.is_none());
    }

    #[test]
    fn transcript_missing_message() {
        let t = HtmlExtractor.transcript(TRANSCRIPT_PAGE, MessageId::new(999));
        assert!(!t.found);
        assert!(t.content.is_none());
        assert!(t.user_id.is_none());
    }

    #[test]
    fn room_info_fields() {
        let r = HtmlExtractor.room_info(
            r#"<html><body><h1>Sandbox</h1><div class="roomcard-xxl"><p>Test things here</p></div></body></html>"#,
        );
        assert_eq!(r.name.as_deref(), Some("Sandbox"));
        assert_eq!(r.description.as_deref(), Some("Test things here"));
    }

    #[test]
    fn counts() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count("12.3k"), Some(12300));
        assert_eq!(parse_count("lots"), None);
    }

    #[test]
    fn ids_from_hrefs() {
        assert_eq!(id_after("/users/")("/users/42/name"), Some(42));
        assert_eq!(id_after("/message/")("/transcript/message/7#7"), Some(7));
        assert_eq!(id_after("/rooms/")("/users/1"), None);
    }
}
