//! Chat users.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use chatx_core::{LazyField, Result, UserId};
use chatx_session::Session;

/// Known fields of a user. `None` means not fetched yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserFields {
    /// Display name.
    pub name: Option<String>,
    /// Profile "about" text.
    pub about: Option<String>,
    /// Whether the user is a moderator.
    pub is_moderator: Option<bool>,
    /// Rooms the user is in.
    pub room_count: Option<u64>,
    /// Messages the user has posted.
    pub message_count: Option<u64>,
    /// Parent-site reputation.
    pub reputation: Option<u64>,
    /// Seconds since last seen.
    pub last_seen: Option<u64>,
    /// Seconds since last message.
    pub last_message: Option<u64>,
}

/// A chat user. Fields missing from the seed are fetched from the profile
/// page on first read, all in one request.
pub struct User {
    id: UserId,
    session: Arc<Session>,
    fields: RwLock<UserFields>,
    profile: LazyField,
}

impl User {
    pub(crate) fn new(id: UserId, session: Arc<Session>, seed: UserFields) -> Self {
        Self {
            id,
            session,
            fields: RwLock::new(seed),
            profile: LazyField::new(),
        }
    }

    /// User id.
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Snapshot of what is known so far, without fetching.
    pub fn known_fields(&self) -> UserFields {
        self.fields.read().clone()
    }

    /// Display name.
    pub async fn name(&self) -> Result<String> {
        self.field("name", |f| f.name.clone()).await
    }

    /// Profile "about" text.
    pub async fn about(&self) -> Result<String> {
        self.field("about", |f| f.about.clone()).await
    }

    /// Whether the user is a moderator.
    pub async fn is_moderator(&self) -> Result<bool> {
        self.field("is_moderator", |f| f.is_moderator).await
    }

    /// Number of rooms the user is in.
    pub async fn room_count(&self) -> Result<u64> {
        self.field("room_count", |f| f.room_count).await
    }

    /// Number of messages the user has posted.
    pub async fn message_count(&self) -> Result<u64> {
        self.field("message_count", |f| f.message_count).await
    }

    /// Parent-site reputation.
    pub async fn reputation(&self) -> Result<u64> {
        self.field("reputation", |f| f.reputation).await
    }

    /// Seconds since the user was last seen.
    pub async fn last_seen(&self) -> Result<u64> {
        self.field("last_seen", |f| f.last_seen).await
    }

    /// Seconds since the user last posted.
    pub async fn last_message(&self) -> Result<u64> {
        self.field("last_message", |f| f.last_message).await
    }

    async fn field<T>(&self, name: &'static str, get: impl Fn(&UserFields) -> Option<T>) -> Result<T> {
        self.profile
            .resolve(name, || get(&self.fields.read()), || self.fetch_profile())
            .await
    }

    async fn fetch_profile(&self) -> Result<()> {
        let url = self.session.host().chat(&format!("/users/{}", self.id));
        let page = self.session.get_page(&url).await?;
        let profile = self.session.extractor().profile(&page);
        debug!(user_id = %self.id, "fetched profile");

        let mut fields = self.fields.write();
        fields.name = profile.name.or(fields.name.take());
        fields.about = profile.about.or(fields.about.take());
        fields.is_moderator = Some(profile.is_moderator);
        fields.room_count = profile.room_count.or(fields.room_count);
        fields.message_count = profile.message_count.or(fields.message_count);
        fields.reputation = profile.reputation.or(fields.reputation);
        fields.last_seen = profile.last_seen.or(fields.last_seen);
        fields.last_message = profile.last_message.or(fields.last_message);
        Ok(())
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("fields", &*self.fields.read())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{PROFILE_PAGE, scripted_session};
    use assert_matches::assert_matches;
    use chatx_core::ChatExchangeError;
    use chatx_transport::Method;
    use std::time::Duration;

    #[tokio::test]
    async fn seeded_field_needs_no_fetch() {
        let (transport, session) = scripted_session();
        let user = User::new(
            UserId::new(7),
            session,
            UserFields {
                name: Some("Seeded".to_string()),
                ..UserFields::default()
            },
        );
        assert_eq!(user.name().await.unwrap(), "Seeded");
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn one_profile_fetch_fills_every_field() {
        let (transport, session) = scripted_session();
        transport.respond_html(Method::Get, "/users/7", 200, PROFILE_PAGE);
        let user = User::new(UserId::new(7), session, UserFields::default());

        assert_eq!(user.name().await.unwrap(), "Jane Doe");
        assert!(user.is_moderator().await.unwrap());
        assert_eq!(user.room_count().await.unwrap(), 3);
        assert_eq!(user.message_count().await.unwrap(), 1500);
        assert_eq!(user.reputation().await.unwrap(), 101);
        assert_eq!(user.about().await.unwrap(), "hello");
        assert_eq!(user.last_seen().await.unwrap(), 0);
        assert_eq!(user.last_message().await.unwrap(), 120);
        assert_eq!(transport.call_count("/users/7"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_reads_share_one_fetch() {
        let (transport, session) = scripted_session();
        transport.respond_html(Method::Get, "/users/7", 200, PROFILE_PAGE);
        transport.set_latency(Duration::from_millis(100));
        let user = Arc::new(User::new(UserId::new(7), session, UserFields::default()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let user = Arc::clone(&user);
            handles.push(tokio::spawn(async move { user.name().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "Jane Doe");
        }
        assert_eq!(transport.call_count("/users/7"), 1);
    }

    #[tokio::test]
    async fn field_absent_from_page_is_missing() {
        let (transport, session) = scripted_session();
        transport.respond_html(Method::Get, "/users/7", 200, "<h1>Bare</h1>");
        let user = User::new(UserId::new(7), session, UserFields::default());

        assert_matches!(
            user.reputation().await,
            Err(ChatExchangeError::MissingField { field: "reputation" })
        );
        assert_eq!(user.name().await.unwrap(), "Bare");
    }

    #[tokio::test]
    async fn fetch_error_propagates_and_next_read_retries() {
        let (transport, session) = scripted_session();
        transport.respond_html(Method::Get, "/users/7", 500, "");
        let user = User::new(UserId::new(7), session, UserFields::default());

        assert!(user.name().await.unwrap_err().is_retryable());
        transport.respond_html(Method::Get, "/users/7", 200, PROFILE_PAGE);
        assert_eq!(user.name().await.unwrap(), "Jane Doe");
        assert_eq!(transport.call_count("/users/7"), 2);
    }
}
