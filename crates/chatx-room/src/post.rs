//! Posting, editing and deleting messages.

use serde::Deserialize;
use tracing::{debug, info};

use chatx_core::{ChatExchangeError, MessageId, Result, RoomId};
use chatx_session::Session;

#[derive(Deserialize)]
struct Posted {
    id: u64,
}

/// Reject empty text and text longer than `max_length` characters.
pub fn validate_text(text: &str, max_length: usize) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ChatExchangeError::invalid_argument("message text is empty"));
    }
    let length = text.chars().count();
    if length > max_length {
        return Err(ChatExchangeError::invalid_argument(format!(
            "message is {length} characters, limit is {max_length}"
        )));
    }
    Ok(())
}

/// Post `text` to `room`, returning the new message id.
#[tracing::instrument(skip_all, fields(room_id = %room))]
pub async fn post_message(
    session: &Session,
    room: RoomId,
    text: &str,
    max_length: usize,
) -> Result<MessageId> {
    validate_text(text, max_length)?;
    let url = session.host().chat(&format!("/chats/{room}/messages/new"));
    let resp = session
        .post_with_key(&url, &[("text", text.to_string())])
        .await?;
    let posted: Posted = resp.json()?;
    debug!(message_id = posted.id, "posted");
    Ok(MessageId::new(posted.id))
}

/// Replace the text of message `id`.
#[tracing::instrument(skip_all, fields(message_id = %id))]
pub async fn edit_message(
    session: &Session,
    id: MessageId,
    text: &str,
    max_length: usize,
) -> Result<()> {
    validate_text(text, max_length)?;
    let url = session.host().chat(&format!("/messages/{id}"));
    let _ = session
        .post_with_key(&url, &[("text", text.to_string())])
        .await?;
    info!("edited");
    Ok(())
}

/// Delete message `id`.
#[tracing::instrument(skip_all, fields(message_id = %id))]
pub async fn delete_message(session: &Session, id: MessageId) -> Result<()> {
    let url = session.host().chat(&format!("/messages/{id}/delete"));
    let _ = session.post_with_key(&url, &[]).await?;
    info!("deleted");
    Ok(())
}

/// Text of a reply to `parent`.
pub fn reply_text(parent: MessageId, text: &str) -> String {
    format!(":{parent} {text}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
