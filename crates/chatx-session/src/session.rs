//! [`Session`]: cookies, login and the session key.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use chatx_core::{ChatExchangeError, LazyField, Result, UserId};
use chatx_transport::{ChatHost, Extractor, HttpRequest, HttpResponse, Transport};

/// Cookie the site sets once credentials are accepted.
const ACCOUNT_COOKIE: &str = "acct";

/// Authenticated chat page carrying the session key and account link.
const KEY_PAGE: &str = "/chats/join/favorite";

#[derive(Debug, Default)]
struct SessionState {
    chat_key: Option<String>,
    account_id: Option<UserId>,
    account_name: Option<String>,
    authenticated: bool,
}

/// One account's authenticated connection to a chat host.
pub struct Session {
    host: ChatHost,
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn Extractor>,
    state: RwLock<SessionState>,
    identity: LazyField,
}

impl Session {
    /// Unauthenticated session for `host`.
    pub fn new(host: ChatHost, transport: Arc<dyn Transport>, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            host,
            transport,
            extractor,
            state: RwLock::new(SessionState::default()),
            identity: LazyField::new(),
        }
    }

    /// Host this session talks to.
    pub fn host(&self) -> &ChatHost {
        &self.host
    }

    /// Page extractor shared with the entities.
    pub fn extractor(&self) -> &Arc<dyn Extractor> {
        &self.extractor
    }

    /// Whether a login or saved-session restore has succeeded.
    pub fn is_authenticated(&self) -> bool {
        self.state.read().authenticated
    }

    /// Log in with site credentials.
    #[tracing::instrument(skip_all, fields(host = %self.host))]
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        if email.trim().is_empty() {
            return Err(ChatExchangeError::invalid_argument("email is required"));
        }
        if password.is_empty() {
            return Err(ChatExchangeError::invalid_argument("password is required"));
        }

        let login_url = self.host.site("/users/login");
        let page = self.get_page(&login_url).await?;
        let token = self
            .extractor
            .login_token(&page)
            .ok_or_else(|| ChatExchangeError::internal("login token not found on login page"))?;

        let request = HttpRequest::post(login_url.clone())
            .form_field("email", email)
            .form_field("password", password)
            .form_field("fkey", token);
        let _ = self.transport.request(request).await?.error_for_status(&login_url)?;

        if self
            .transport
            .cookie_jar()
            .get_for(self.host.site_url(), ACCOUNT_COOKIE)
            .is_none()
        {
            warn!("no account cookie after login");
            return Err(ChatExchangeError::login("invalid credentials"));
        }

        self.mark_authenticated();
        info!("logged in");
        Ok(())
    }

    /// Log in by restoring a jar produced by [`Session::save_session`].
    ///
    /// The restored cookies are checked against the site front page; a
    /// session the site no longer recognises fails with a login error.
    #[tracing::instrument(skip_all, fields(host = %self.host))]
    pub async fn login_with_saved_session(&self, serialized: &str) -> Result<()> {
        let jar = self.transport.cookie_jar();
        jar.restore(serialized)?;

        let page = self.get_page(&self.host.site("/")).await?;
        if !self.extractor.has_my_profile(&page) {
            jar.clear();
            return Err(ChatExchangeError::login("saved session is no longer valid"));
        }

        self.mark_authenticated();
        info!(cookies = jar.len(), "restored saved session");
        Ok(())
    }

    /// Serialise the cookie jar for a later [`Session::login_with_saved_session`].
    pub fn save_session(&self) -> Result<String> {
        self.transport.cookie_jar().serialize()
    }

    /// Forget cookies and cached identity.
    pub fn logout(&self) {
        self.transport.cookie_jar().clear();
        *self.state.write() = SessionState::default();
        info!(host = %self.host, "logged out");
    }

    /// The `fkey` for state-changing requests, fetched on first use.
    pub async fn chat_key(&self) -> Result<String> {
        self.identity
            .resolve(
                "chat_key",
                || self.state.read().chat_key.clone(),
                || self.refresh_identity(),
            )
            .await
    }

    /// Chat user id of the logged-in account.
    pub async fn account_id(&self) -> Result<UserId> {
        self.identity
            .resolve(
                "account_id",
                || self.state.read().account_id,
                || self.refresh_identity(),
            )
            .await
    }

    /// Display name of the logged-in account.
    pub async fn account_name(&self) -> Result<String> {
        self.identity
            .resolve(
                "account_name",
                || self.state.read().account_name.clone(),
                || self.refresh_identity(),
            )
            .await
    }

    /// Drop the cached key so the next read fetches a fresh one.
    pub fn invalidate_chat_key(&self) {
        self.state.write().chat_key = None;
    }

    /// `GET url`, returning the body of a successful response.
    pub async fn get_page(&self, url: &str) -> Result<String> {
        let resp = self
            .transport
            .request(HttpRequest::get(url))
            .await?
            .error_for_status(url)?;
        Ok(resp.body)
    }

    /// `POST url` with `fields` plus the session key.
    pub async fn post_with_key(&self, url: &str, fields: &[(&str, String)]) -> Result<HttpResponse> {
        let key = self.chat_key().await?;
        let mut request = HttpRequest::post(url);
        for (name, value) in fields {
            request = request.form_field(*name, value.clone());
        }
        request = request.form_field("fkey", key);
        self.transport.request(request).await?.error_for_status(url)
    }

    fn mark_authenticated(&self) {
        let mut state = self.state.write();
        *state = SessionState::default();
        state.authenticated = true;
    }

    async fn refresh_identity(&self) -> Result<()> {
        let url = self.host.chat(KEY_PAGE);
        let page = self.get_page(&url).await?;

        let key = self
            .extractor
            .chat_key(&page)
            .ok_or_else(|| ChatExchangeError::internal(format!("session key not found on {url}")))?;
        let account = self.extractor.current_account(&page);
        debug!(account = ?account.as_ref().map(|a| a.id), "resolved session key");

        let mut state = self.state.write();
        state.chat_key = Some(key);
        if let Some(account) = account {
            state.account_id = Some(account.id);
            state.account_name = Some(account.name);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
