//! Fixtures shared by the client's test modules.

use std::sync::Arc;

use chatx_room::testutil::ScriptedConnector;
use chatx_room::SocketConnector;
use chatx_session::Session;
use chatx_settings::ChatSettings;
use chatx_transport::testutil::ScriptedTransport;
use chatx_transport::{ChatHost, HtmlExtractor, Method, Transport};

use crate::client::Client;

pub const CHAT_PAGE: &str = r#"<div class="topbar-menu-links"><a href="/users/7/jane">Jane Doe</a></div>
    <input name="fkey" value="k">"#;

pub const PROFILE_PAGE: &str = r#"<html><body>
    <h1>Jane Doe</h1>
    <div class="user-status">♦ moderator</div>
    <div class="user-room-count-xxl">3</div>
    <div class="user-message-count-xxl">1,500</div>
    <span class="reputation-score" title="101">101</span>
    <table>
        <tr><td class="user-keycell">about</td><td class="user-valuecell">hello</td></tr>
        <tr><td class="user-keycell">last seen</td><td class="user-valuecell">just now</td></tr>
        <tr><td class="user-keycell">last message</td><td class="user-valuecell">2m ago</td></tr>
    </table>
    </body></html>"#;

pub const TRANSCRIPT_PAGE: &str = r##"<html><body>
    <div class="room-name"><a href="/rooms/3/sandbox">Sandbox</a></div>
    <div class="monologue user-7">
        <div class="signature"><div class="username">Jane Doe</div></div>
        <div class="message" id="message-50"><div class="content">root</div></div>
        <div class="message" id="message-51">
            <a class="reply-info" href="/transcript/message/50#50"></a>
            <div class="content">reply</div>
        </div>
    </div>
    </body></html>"##;

/// Transport that can resolve a session key, plus a session over it.
pub fn scripted_session() -> (Arc<ScriptedTransport>, Arc<Session>) {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_html(Method::Get, "/chats/join/favorite", 200, CHAT_PAGE);
    let session = Arc::new(Session::new(
        ChatHost::new("stackexchange.com").unwrap(),
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::new(HtmlExtractor),
    ));
    (transport, session)
}

/// Register the join handshake for `room`.
pub fn allow_join(transport: &ScriptedTransport, room: u64) {
    transport.respond_json(
        Method::Post,
        &format!("/chats/{room}/events"),
        serde_json::json!({"time": 10, "events": []}),
    );
    transport.respond_html(Method::Post, &format!("/chats/leave/{room}"), 200, "");
}

/// Client over scripted transport and sockets, able to join rooms 1 to 3.
pub fn scripted_client(
    settings: ChatSettings,
) -> (Arc<ScriptedTransport>, Arc<ScriptedConnector>, Client) {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_html(Method::Get, "/chats/join/favorite", 200, CHAT_PAGE);
    transport.respond_json(
        Method::Post,
        "/ws-auth",
        serde_json::json!({"url": "wss://chat.sockets.stackexchange.com/events/x"}),
    );
    for room in 1..=3 {
        allow_join(&transport, room);
    }
    let connector = Arc::new(ScriptedConnector::new());
    let client = Client::with_parts(
        ChatHost::new("stackexchange.com").unwrap(),
        settings,
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::new(HtmlExtractor),
        Arc::clone(&connector) as Arc<dyn SocketConnector>,
    );
    (transport, connector, client)
}
