//! HTTP client abstraction for talking to the portal.
//!
//! The `HttpClient` trait separates the login and fetch logic from the transport,
//! so the whole flow can run against `MockHttpClient` in tests. Implementations own
//! the session's cookie jar; callers only ever read cookies back out of it.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    Url,
    cookie::{CookieStore, Jar},
    header::{ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER},
};
use serde_json::Value;

use crate::{config::PortalConfig, error::HttpError, types::Credential};

const ACCEPT_JSON: &str = "application/json, text/plain, */*";
const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// A single request against one of the portal endpoints.
#[derive(Debug, Clone)]
pub struct PortalRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub json: Option<Value>,
    pub bearer: Option<String>,
    pub referer: Option<String>,
    pub origin: Option<String>,
    pub accept: &'static str,
}

impl PortalRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            json: None,
            bearer: None,
            referer: None,
            origin: None,
            accept: ACCEPT_JSON,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            json: Some(body),
            ..Self::get(url)
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn bearer(mut self, credential: &Credential) -> Self {
        self.bearer = Some(credential.bearer().to_string());
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Ask for a document rather than JSON, as a browser navigation would
    pub fn navigation(mut self) -> Self {
        self.accept = ACCEPT_HTML;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalResponse {
    pub status: u16,
    pub body: String,
}

impl PortalResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a request, recording any cookies the response sets.
    ///
    /// Only transport failures are errors; non-2xx statuses come back as responses.
    async fn execute(&self, request: &PortalRequest) -> Result<PortalResponse, HttpError>;

    /// Value of cookie `name` as the jar would send it to `url`.
    fn cookie(&self, url: &str, name: &str) -> Option<String>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl ReqwestHttpClient {
    pub fn new(config: &PortalConfig) -> Result<Self, HttpError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, jar })
    }
}

fn parse_url(url: &str) -> Result<Url, HttpError> {
    Url::parse(url).map_err(|e| HttpError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: &PortalRequest) -> Result<PortalResponse, HttpError> {
        let url = parse_url(&request.url)?;

        let mut req = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        }
        .header(ACCEPT, request.accept)
        .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(referer) = &request.referer {
            req = req.header(REFERER, referer);
        }
        if let Some(origin) = &request.origin {
            req = req.header(ORIGIN, origin);
        }
        if let Some(bearer) = &request.bearer {
            req = req.bearer_auth(bearer);
            tracing::trace!("Added Authorization header");
        }
        if let Some(json) = &request.json {
            req = req.json(json);
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!(error = %e, "HTTP request failed");
            e
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(status, response_len = body.len(), "HTTP request completed");

        Ok(PortalResponse { status, body })
    }

    fn cookie(&self, url: &str, name: &str) -> Option<String> {
        let url = Url::parse(url).ok()?;
        let header = self.jar.cookies(&url)?;
        find_cookie(header.to_str().ok()?, name)
    }
}

/// Pick one cookie out of a `Cookie:` header value.
fn find_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;

/// Mock HTTP client for tests.
///
/// Responses are queued per `"{METHOD} {path}"` key and served in FIFO order.
/// A response may carry cookies, which land in the mock jar when it is served.
///
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response("GET /EventManagement/api/edrReport", Ok(PortalResponse::ok("{}")));
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    cookies: Arc<Mutex<HashMap<String, String>>>,
}

struct MockResponse {
    response: Result<PortalResponse, HttpError>,
    set_cookies: Vec<(String, String)>,
}

/// Record of a call made to the mock client.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub method: Method,
    pub url: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub json: Option<Value>,
    pub bearer: Option<String>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_response(&self, key: &str, response: Result<PortalResponse, HttpError>) {
        self.add_response_with_cookies(key, response, &[]);
    }

    /// Queue a response that also sets cookies when served.
    pub fn add_response_with_cookies(
        &self,
        key: &str,
        response: Result<PortalResponse, HttpError>,
        cookies: &[(&str, &str)],
    ) {
        self.responses
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(MockResponse {
                response,
                set_cookies: cookies
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            });
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Paths requested so far, in order
    pub fn called_paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|c| format!("{} {}", c.method, c.path))
            .collect()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: &PortalRequest) -> Result<PortalResponse, HttpError> {
        let path = parse_url(&request.url)?.path().to_string();

        self.calls.lock().push(MockCall {
            method: request.method,
            url: request.url.clone(),
            path: path.clone(),
            query: request.query.clone(),
            json: request.json.clone(),
            bearer: request.bearer.clone(),
        });

        let key = format!("{} {}", request.method, path);
        let next = {
            let mut responses = self.responses.lock();
            match responses.get_mut(&key) {
                Some(queue) if !queue.is_empty() => Some(queue.remove(0)),
                _ => None,
            }
        };

        match next {
            Some(MockResponse {
                response,
                set_cookies,
            }) => {
                self.cookies.lock().extend(set_cookies);
                response
            }
            None => Err(HttpError::Other(format!(
                "No mock response configured for {key}"
            ))),
        }
    }

    fn cookie(&self, _url: &str, name: &str) -> Option<String> {
        self.cookies.lock().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_cookie_picks_named_pair() {
        let header = "vtc=abc; auth-token=%7B%22token%22%3A%22t%22%7D; other=1";
        assert_eq!(
            find_cookie(header, "auth-token").as_deref(),
            Some("%7B%22token%22%3A%22t%22%7D")
        );
        assert_eq!(find_cookie(header, "missing"), None);
    }

    #[test]
    fn response_success_range() {
        assert!(PortalResponse::ok("").is_success());
        assert!(PortalResponse::with_status(204).is_success());
        assert!(!PortalResponse::with_status(302).is_success());
        assert!(!PortalResponse::with_status(401).is_success());
    }

    #[test]
    fn pathless_cookie_is_visible_at_the_url_that_set_it() {
        let portal = PortalConfig {
            event_management_url: "https://portal.test/EventManagement".to_string(),
            ..PortalConfig::default()
        };
        let client = ReqwestHttpClient::new(&portal).unwrap();
        let set_by = Url::parse(&portal.authenticate_endpoint()).unwrap();
        client
            .jar
            .add_cookie_str("auth-token=%7B%22token%22%3A%22t%22%7D", &set_by);

        assert_eq!(
            client
                .cookie(&portal.authenticate_endpoint(), "auth-token")
                .as_deref(),
            Some("%7B%22token%22%3A%22t%22%7D")
        );
        // Default cookie path is /EventManagement/api, which the landing page is outside of
        assert_eq!(
            client.cookie(&portal.event_management_landing(), "auth-token"),
            None
        );
    }

    #[tokio::test]
    async fn mock_serves_in_order_and_records_calls() {
        let mock = MockHttpClient::new();
        mock.add_response("GET /a", Ok(PortalResponse::ok("first")));
        mock.add_response("GET /a", Ok(PortalResponse::ok("second")));

        let request = PortalRequest::get("https://example.test/a").query("id", "1");
        assert_eq!(mock.execute(&request).await.unwrap().body, "first");
        assert_eq!(mock.execute(&request).await.unwrap().body, "second");
        assert!(mock.execute(&request).await.is_err());

        let calls = mock.get_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].query, vec![("id".to_string(), "1".to_string())]);
    }

    #[tokio::test]
    async fn mock_sets_cookies_when_response_is_served() {
        let mock = MockHttpClient::new();
        mock.add_response_with_cookies(
            "POST /login",
            Ok(PortalResponse::ok("")),
            &[("session", "s1")],
        );
        assert_eq!(mock.cookie("https://example.test/", "session"), None);

        let request = PortalRequest::post_json("https://example.test/login", Value::Null);
        mock.execute(&request).await.unwrap();
        assert_eq!(
            mock.cookie("https://example.test/", "session").as_deref(),
            Some("s1")
        );
    }
}
