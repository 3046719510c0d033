//! Request/response transport.
//!
//! The [`Transport`] trait is the seam between the client and the network:
//! the session, rooms and entities only ever see [`HttpRequest`] and
//! [`HttpResponse`]. [`HttpTransport`] is the production implementation on
//! top of `reqwest`, with the session's [`CookieJar`] as its cookie provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use chatx_core::{ChatExchangeError, Result};
use chatx_settings::HttpSettings;

use crate::cookies::CookieJar;

/// HTTP method. The platform's HTML front end only needs these two.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST` with a url-encoded form body.
    Post,
}

/// A request to send through a [`Transport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute url.
    pub url: String,
    /// Url-encoded form fields (POST only).
    pub form: Vec<(String, String)>,
    /// Query string parameters.
    pub query: Vec<(String, String)>,
}

impl HttpRequest {
    /// `GET url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            form: Vec::new(),
            query: Vec::new(),
        }
    }

    /// `POST url` with an empty form.
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    /// Append a form field.
    #[must_use]
    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Value of form field `key`, if present.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a completed request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// Response with `status` and `body`.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is below 400.
    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    /// Turn a status of 400 or above into [`ChatExchangeError::Http`].
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ChatExchangeError::Http {
                status: self.status,
                url: url.to_string(),
            })
        }
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Cookie-bearing request capability.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return whatever status the server answered with.
    ///
    /// Only failures that produce no response are errors here; callers use
    /// [`HttpResponse::error_for_status`] for status checks.
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// The jar every request reads from and every response writes to.
    fn cookie_jar(&self) -> &Arc<CookieJar>;
}

/// [`Transport`] over a `reqwest` client.
pub struct HttpTransport {
    client: reqwest::Client,
    jar: Arc<CookieJar>,
}

impl HttpTransport {
    /// Build a transport with a fresh cookie jar.
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        Self::with_jar(settings, Arc::new(CookieJar::new()))
    }

    /// Build a transport around an existing jar.
    pub fn with_jar(settings: &HttpSettings, jar: Arc<CookieJar>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| ChatExchangeError::Request(format!("building HTTP client: {e}")))?;
        Ok(Self { client, jar })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(skip_all, fields(method = ?request.method, url = %request.url))]
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url).form(&request.form),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ChatExchangeError::Request(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ChatExchangeError::Request(e.to_string()))?;
        debug!(status, bytes = body.len(), "response");

        Ok(HttpResponse { status, body })
    }

    fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use reqwest::Url;

    #[test]
    fn request_builders() {
        let req = HttpRequest::post("https://chat.stackexchange.com/ws-auth")
            .form_field("roomid", "1")
            .form_field("fkey", "abc");
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.form_value("fkey"), Some("abc"));
        assert_eq!(req.form_value("nope"), None);
    }

    #[test]
    fn error_for_status_threshold() {
        assert!(HttpResponse::new(302, "").error_for_status("u").is_ok());
        assert_matches!(
            HttpResponse::new(404, "").error_for_status("u"),
            Err(ChatExchangeError::Http { status: 404, .. })
        );
    }

    #[tokio::test]
    async fn posts_form_and_stores_cookies() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/login"))
            .and(wiremock::matchers::body_string_contains("email=a%40b.c"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .insert_header("set-cookie", "acct=token; path=/")
                    .set_body_string("ok"),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&HttpSettings::default()).unwrap();
        let resp = transport
            .request(HttpRequest::post(format!("{}/login", server.uri())).form_field("email", "a@b.c"))
            .await
            .unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "ok");
        let base = Url::parse(&server.uri()).unwrap();
        assert_eq!(
            transport.cookie_jar().get(&base, "acct").as_deref(),
            Some("token")
        );
    }

    #[tokio::test]
    async fn sends_stored_cookies_and_query() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/users/1"))
            .and(wiremock::matchers::query_param("tab", "profile"))
            .and(wiremock::matchers::header("cookie", "acct=token"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<html/>"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&HttpSettings::default()).unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        transport.cookie_jar().set_cookie("acct=token; path=/", &base);

        let resp = transport
            .request(
                HttpRequest::get(format!("{}/users/1", server.uri())).query_param("tab", "profile"),
            )
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn error_status_is_returned_not_raised() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&HttpSettings::default()).unwrap();
        let url = format!("{}/", server.uri());
        let resp = transport.request(HttpRequest::get(url.clone())).await.unwrap();
        assert_eq!(resp.status, 503);
        assert!(resp.error_for_status(&url).unwrap_err().is_retryable());
    }
}
