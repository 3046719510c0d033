//! Shared test doubles for crates built on [`Transport`].
//!
//! [`ScriptedTransport`] answers requests from a table of routes matched by
//! method and url substring, records every request it sees, and shares a real
//! [`CookieJar`] so login flows can be exercised without a server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;

use chatx_core::{ChatExchangeError, Result};

use crate::cookies::CookieJar;
use crate::http::{HttpRequest, HttpResponse, Method, Transport};

type Responder = Arc<dyn Fn(&HttpRequest, &CookieJar) -> Result<HttpResponse> + Send + Sync>;

struct Route {
    method: Method,
    pattern: String,
    responder: Responder,
}

/// In-memory [`Transport`] driven by registered routes.
///
/// When several routes match, the one registered last wins, so a test can
/// override a default route. Unmatched requests get a 404.
pub struct ScriptedTransport {
    jar: Arc<CookieJar>,
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<HttpRequest>>,
    latency: Mutex<Option<Duration>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Transport with no routes and an empty jar.
    pub fn new() -> Self {
        Self {
            jar: Arc::new(CookieJar::new()),
            routes: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            latency: Mutex::new(None),
        }
    }

    /// Delay every response by `latency` (tokio time, so paused clocks apply).
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Register a route answered by `responder`.
    pub fn route<F>(&self, method: Method, pattern: &str, responder: F)
    where
        F: Fn(&HttpRequest, &CookieJar) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        self.routes.lock().push(Route {
            method,
            pattern: pattern.to_string(),
            responder: Arc::new(responder),
        });
    }

    /// Answer matching requests with a fixed status and HTML body.
    pub fn respond_html(&self, method: Method, pattern: &str, status: u16, body: &str) {
        let body = body.to_string();
        self.route(method, pattern, move |_, _| Ok(HttpResponse::new(status, body.clone())));
    }

    /// Answer matching requests with `200` and a JSON body.
    pub fn respond_json(&self, method: Method, pattern: &str, body: serde_json::Value) {
        let body = body.to_string();
        self.route(method, pattern, move |_, _| Ok(HttpResponse::new(200, body.clone())));
    }

    /// Answer matching requests with `200`, setting `cookie` as if the
    /// response carried it as a `Set-Cookie` header.
    pub fn respond_with_cookie(&self, method: Method, pattern: &str, cookie: &str, body: &str) {
        let cookie = cookie.to_string();
        let body = body.to_string();
        self.route(method, pattern, move |req, jar| {
            if let Ok(url) = Url::parse(&req.url) {
                jar.set_cookie(&cookie, &url);
            }
            Ok(HttpResponse::new(200, body.clone()))
        });
    }

    /// Fail matching requests without a response.
    pub fn fail(&self, method: Method, pattern: &str, message: &str) {
        let message = message.to_string();
        self.route(method, pattern, move |_, _| {
            Err(ChatExchangeError::Request(message.clone()))
        });
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests whose url contains `pattern`.
    pub fn call_count(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.url.contains(pattern))
            .count()
    }

    /// Total number of requests seen.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    fn responder_for(&self, request: &HttpRequest) -> Option<Responder> {
        self.routes
            .lock()
            .iter()
            .rev()
            .find(|r| r.method == request.method && request.url.contains(&r.pattern))
            .map(|r| Arc::clone(&r.responder))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.calls.lock().push(request.clone());

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match self.responder_for(&request) {
            Some(responder) => responder(&request, &self.jar),
            None => Ok(HttpResponse::new(404, "no route")),
        }
    }

    fn cookie_jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
