use crate::session::{LoginRedirect, SessionContext};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Unauthorized: session expired")]
    Unauthorized,
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid JSON in response: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Insecure base URL: HTTPS required (except localhost)")]
    InsecureBaseUrl,
}

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub login_path: String,
    pub timeout: Duration,
}

impl ApiSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_path: "/login".to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// JSON API client with bearer-token injection and 401 handling.
///
/// Every request attaches `Authorization: Bearer <token>` when the session
/// holds a token. A 401 response clears the session, signals the login
/// redirect, and surfaces as [`TransportError::Unauthorized`]. Nothing is
/// retried.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    login_url: String,
    timeout: Duration,
    session: Arc<SessionContext>,
    redirect: Arc<dyn LoginRedirect>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("login_url", &self.login_url)
            .field("timeout", &self.timeout)
            .field("session", &self.session)
            .finish()
    }
}

impl ApiClient {
    pub fn new(
        settings: ApiSettings,
        session: Arc<SessionContext>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Result<Self, TransportError> {
        let base = validate_base_url(&settings.base_url)?;
        let login_url = join_url(base.as_str(), &settings.login_path);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base,
            login_url,
            timeout: settings.timeout,
            session,
            redirect,
        })
    }

    /// Percent-encode `raw` as a single path segment, so `/`, `%`, spaces and
    /// the like stay inside the segment (`"a b"` → `a%20b`).
    pub fn path_segment(&self, raw: &str) -> String {
        let mut scratch = self.base.clone();
        scratch.set_query(None);
        scratch.set_fragment(None);
        match scratch.path_segments_mut() {
            Ok(mut segments) => {
                segments.clear().push(raw);
            }
            // http(s) bases always have path segments
            Err(()) => return raw.to_string(),
        }
        scratch.path().trim_start_matches('/').to_string()
    }

    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, TransportError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value, TransportError> {
        let body = serde_json::to_vec(body)?;
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value, TransportError> {
        let body = serde_json::to_vec(body)?;
        self.send(Method::PUT, path, Some(body)).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<serde_json::Value, TransportError> {
        let url = join_url(self.base.as_str(), path);
        let mut request = self.http.request(method.clone(), &url);

        if let Some(token) = self.session.token() {
            tracing::trace!("Attaching bearer credential");
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        tracing::debug!(method = %method, url = %url, "Sending API request");

        // The limit covers the body as well as the headers.
        let bytes = tokio::time::timeout(self.timeout, self.exchange(request, &url))
            .await
            .map_err(|_| {
                tracing::warn!(url = %url, timeout = ?self.timeout, "API request timed out");
                TransportError::Timeout(self.timeout)
            })??;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send the request and read its body, handling 401 and non-2xx statuses.
    async fn exchange(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let response = request.send().await.map_err(TransportError::Network)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::error!(url = %url, "Unauthorized response, clearing session and redirecting to login");
            self.session.clear();
            self.redirect.redirect_to_login(&self.login_url);
            return Err(TransportError::Unauthorized);
        }
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "API request failed");
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        read_limited(response, MAX_RESPONSE_SIZE).await
    }
}

/// Parse the base URL and reject plain HTTP outside of localhost.
fn validate_base_url(raw: &str) -> Result<Url, TransportError> {
    let url = Url::parse(raw).map_err(|e| TransportError::InvalidBaseUrl(e.to_string()))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" => {
            let is_localhost = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
            if !is_localhost {
                tracing::error!(base_url = %raw, "Rejecting non-HTTPS base URL (HTTPS required except for localhost)");
                return Err(TransportError::InsecureBaseUrl);
            }
            tracing::warn!(base_url = %raw, "Using non-HTTPS API base URL (localhost only)");
            Ok(url)
        }
        other => Err(TransportError::InvalidBaseUrl(format!(
            "unsupported scheme: {}",
            other
        ))),
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

async fn read_limited(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, TransportError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(TransportError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
