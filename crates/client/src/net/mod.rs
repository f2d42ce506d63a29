//! Retrying HTTP client.
//!
//! ### Retry policy
//! - Up to `attempts` tries per request (default 3)
//! - Backoff of `base_delay * 2^attempt` between tries (default base 250ms)
//! - Retry on statuses 408, 425, 429, 500, 502, 503, 504 and on transport
//!   failures; once attempts run out a retryable response is returned as
//!   is, while a transport failure is raised
//!
//! ### Redirects and timeouts
//! - 3xx with a `Location` header is followed iteratively, resolved against
//!   the current URL, for at most `max_redirects` hops (default 3)
//! - Each attempt has its own wall-clock timeout (default 30s)
//!
//! The wire is reached through [`HttpTransport`], so the policy can be
//! driven by [`testing::ScriptedTransport`] without a network.

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap};
use serde::de::DeserializeOwned;
use url::Url;

use fdocs_core::AppConfig;

use crate::cancel::CancelToken;
use crate::error::{RequestError, RequestErrorKind};

/// Statuses retried by default.
pub const DEFAULT_RETRY_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// Retry, redirect and timeout settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    /// Total tries per request (default: 3)
    pub attempts: u32,
    /// Backoff base (default: 250ms)
    pub base_delay: Duration,
    pub retry_on_statuses: BTreeSet<u16>,
    /// Per-attempt timeout (default: 30s)
    pub timeout: Duration,
    /// Redirect hop bound (default: 3)
    pub max_redirects: usize,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
            retry_on_statuses: DEFAULT_RETRY_STATUSES.into_iter().collect(),
            timeout: Duration::from_millis(30_000),
            max_redirects: 3,
        }
    }
}

impl From<&AppConfig> for RetryOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            attempts: config.http_attempts,
            base_delay: config.http_base_delay(),
            timeout: config.http_timeout(),
            max_redirects: config.max_redirects,
            ..Self::default()
        }
    }
}

impl RetryOptions {
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retry_on_statuses.contains(&status)
    }

    /// Delay before the try following `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
        }
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// URL that produced this response, after redirects.
    pub url: Url,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One raw request, no retries and no redirect following.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, method: HttpMethod, url: &Url) -> Result<HttpResponse, RequestError>;
}

/// [`HttpTransport`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport that leaves redirects to [`RetryClient`].
    pub fn new(user_agent: &str) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self { http })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, method: HttpMethod, url: &Url) -> Result<HttpResponse, RequestError> {
        let request = match method {
            HttpMethod::Get => self.http.get(url.clone()),
            HttpMethod::Head => self.http.head(url.clone()),
        };

        let response = request
            .header(header::ACCEPT, "application/json, text/plain, */*")
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let final_url = response.url().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse { status, headers, body, url: final_url })
    }
}

/// HTTP client applying the retry, redirect and timeout policy.
#[derive(Clone)]
pub struct RetryClient {
    transport: Arc<dyn HttpTransport>,
    options: RetryOptions,
}

impl std::fmt::Debug for RetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryClient").field("options", &self.options).finish_non_exhaustive()
    }
}

impl RetryClient {
    pub fn new(transport: Arc<dyn HttpTransport>, options: RetryOptions) -> Self {
        Self { transport, options }
    }

    /// Reqwest-backed client configured from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, RequestError> {
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Ok(Self::new(Arc::new(transport), RetryOptions::from(config)))
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Issue a request with retries.
    ///
    /// Returns the last response even when it still carries a retryable
    /// status. A transport failure on the final attempt is raised.
    pub async fn request(&self, url: &str, method: HttpMethod, cancel: &CancelToken) -> Result<HttpResponse, RequestError> {
        let url = Url::parse(url).map_err(|e| RequestError::Classified {
            kind: RequestErrorKind::Unknown,
            message: format!("invalid URL {url}: {e}"),
            status: None,
        })?;

        let attempts = self.options.attempts.max(1);
        let mut attempt = 0;
        loop {
            cancel.check()?;
            let outcome = match tokio::time::timeout(self.options.timeout, self.send_following(method, &url)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RequestError::Timeout(self.options.timeout)),
            };
            cancel.check()?;

            let is_last = attempt + 1 >= attempts;
            match outcome {
                Ok(response) if is_last || !self.options.is_retryable(response.status) => return Ok(response),
                Ok(response) => {
                    tracing::debug!(
                        "{} {} returned {} (attempt {}/{})",
                        method.as_str(),
                        url,
                        response.status,
                        attempt + 1,
                        attempts
                    );
                }
                Err(err) if is_last => {
                    tracing::warn!("{} {} failed after {} attempts: {}", method.as_str(), url, attempts, err);
                    return Err(err);
                }
                Err(err) => {
                    tracing::debug!("{} {} failed (attempt {}/{}): {}", method.as_str(), url, attempt + 1, attempts, err);
                }
            }

            let delay = self.options.backoff(attempt);
            tracing::debug!("retrying {} in {:?}", url, delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// GET and decode a JSON body. Any non-2xx final response is an error.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, cancel: &CancelToken) -> Result<T, RequestError> {
        let response = self.request(url, HttpMethod::Get, cancel).await?;

        if !response.is_success() {
            return Err(RequestError::status(response.status, url));
        }

        serde_json::from_slice(&response.body).map_err(|e| RequestError::Classified {
            kind: RequestErrorKind::Parse,
            message: format!("failed to parse JSON from {url}: {e}"),
            status: Some(response.status),
        })
    }

    /// One attempt: send, then follow redirects with a bounded hop count.
    async fn send_following(&self, method: HttpMethod, url: &Url) -> Result<HttpResponse, RequestError> {
        let mut current = url.clone();
        let mut hops_left = self.options.max_redirects;

        loop {
            let response = self.transport.send(method, &current).await?;

            let next = match response.location() {
                Some(location) if response.is_redirect() && hops_left > 0 => current
                    .join(location)
                    .map_err(|e| RequestError::network(format!("invalid redirect from {current} to {location}: {e}")))?,
                _ => return Ok(response),
            };

            tracing::debug!("redirect {} -> {} ({} hops left)", current, next, hops_left - 1);
            current = next;
            hops_left -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Scripted, ScriptedTransport};
    use super::*;

    const URL: &str = "https://registry.example/pkg";

    fn fast_options() -> RetryOptions {
        RetryOptions { base_delay: Duration::ZERO, ..RetryOptions::default() }
    }

    fn client(transport: &Arc<ScriptedTransport>, options: RetryOptions) -> RetryClient {
        RetryClient::new(transport.clone(), options)
    }

    #[test]
    fn test_retry_options_default() {
        let options = RetryOptions::default();
        assert_eq!(options.attempts, 3);
        assert_eq!(options.base_delay, Duration::from_millis(250));
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.max_redirects, 3);
        for status in DEFAULT_RETRY_STATUSES {
            assert!(options.is_retryable(status));
        }
        assert!(!options.is_retryable(404));
    }

    #[test]
    fn test_backoff_doubles() {
        let options = RetryOptions::default();
        assert_eq!(options.backoff(0), Duration::from_millis(250));
        assert_eq!(options.backoff(1), Duration::from_millis(500));
        assert_eq!(options.backoff(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_retry_options_from_config() {
        let config = AppConfig { http_attempts: 5, http_base_delay_ms: 10, max_redirects: 1, ..AppConfig::default() };
        let options = RetryOptions::from(&config);
        assert_eq!(options.attempts, 5);
        assert_eq!(options.base_delay, Duration::from_millis(10));
        assert_eq!(options.max_redirects, 1);
        assert_eq!(options.retry_on_statuses.len(), DEFAULT_RETRY_STATUSES.len());
    }

    #[tokio::test]
    async fn test_non_retryable_status_returned_immediately() {
        let transport = Arc::new(ScriptedTransport::new().route(URL, vec![Scripted::status(404)]));
        let response = client(&transport, fast_options())
            .request(URL, HttpMethod::Get, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(transport.call_count(URL), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retryable_status_is_returned() {
        let transport = Arc::new(ScriptedTransport::new().route(URL, vec![Scripted::status(503)]));
        let response = client(&transport, fast_options())
            .request(URL, HttpMethod::Head, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(transport.call_count(URL), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_then_success() {
        let transport = Arc::new(ScriptedTransport::new().route(
            URL,
            vec![Scripted::Fail(RequestError::network("connection reset")), Scripted::json(r#"{"ok":true}"#)],
        ));
        let value: serde_json::Value = client(&transport, fast_options())
            .get_json(URL, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(transport.call_count(URL), 2);
    }

    #[tokio::test]
    async fn test_final_transport_failure_is_raised() {
        let transport = Arc::new(
            ScriptedTransport::new().route(URL, vec![Scripted::Fail(RequestError::network("connection refused"))]),
        );
        let err = client(&transport, fast_options())
            .request(URL, HttpMethod::Get, &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(RequestErrorKind::Network));
        assert_eq!(transport.call_count(URL), 3);
    }

    #[tokio::test]
    async fn test_redirects_followed_relative() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(URL, vec![Scripted::redirect(301, "/moved")])
                .route("https://registry.example/moved", vec![Scripted::json("{}")]),
        );
        let response = client(&transport, fast_options())
            .request(URL, HttpMethod::Get, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.url.as_str(), "https://registry.example/moved");
    }

    #[tokio::test]
    async fn test_redirect_hops_are_bounded() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("https://loop.example/a", vec![Scripted::redirect(302, "/b")])
                .route("https://loop.example/b", vec![Scripted::redirect(302, "/a")]),
        );
        let options = RetryOptions { attempts: 1, max_redirects: 3, ..fast_options() };
        let response = client(&transport, options)
            .request("https://loop.example/a", HttpMethod::Get, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(transport.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_redirect_without_location_is_final() {
        let transport = Arc::new(ScriptedTransport::new().route(URL, vec![Scripted::status(304)]));
        let response = client(&transport, fast_options())
            .request(URL, HttpMethod::Get, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(response.status, 304);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout() {
        let transport = Arc::new(ScriptedTransport::new().route(URL, vec![Scripted::Hang]));
        let options = RetryOptions { attempts: 2, timeout: Duration::from_millis(50), ..fast_options() };
        let err = client(&transport, options)
            .request(URL, HttpMethod::Get, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Timeout(_)));
        assert_eq!(transport.call_count(URL), 2);
    }

    #[tokio::test]
    async fn test_json_status_and_parse_errors() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("https://registry.example/missing", vec![Scripted::status(404)])
                .route("https://registry.example/garbled", vec![Scripted::json("not json")]),
        );
        let client = client(&transport, fast_options());
        let cancel = CancelToken::new();

        let err = client
            .get_json::<serde_json::Value>("https://registry.example/missing", &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(RequestErrorKind::NotFound));
        assert_eq!(err.http_status(), Some(404));

        let err = client
            .get_json::<serde_json::Value>("https://registry.example/garbled", &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(RequestErrorKind::Parse));
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let transport = Arc::new(ScriptedTransport::new().route(URL, vec![Scripted::status(200)]));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = client(&transport, fast_options())
            .request(URL, HttpMethod::Get, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Cancelled));
        assert_eq!(transport.calls().len(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_mid_flight_is_not_retried() {
        let cancel = CancelToken::new();
        let transport = Arc::new(ScriptedTransport::new().route(URL, vec![Scripted::cancel_during(&cancel, 503)]));

        let err = client(&transport, fast_options())
            .request(URL, HttpMethod::Get, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Cancelled));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_mid_flight_discards_success() {
        let cancel = CancelToken::new();
        let transport = Arc::new(ScriptedTransport::new().route(URL, vec![Scripted::cancel_during(&cancel, 200)]));

        let err = client(&transport, fast_options())
            .request(URL, HttpMethod::Get, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Cancelled));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = client(&transport, fast_options())
            .request("not a url", HttpMethod::Get, &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(RequestErrorKind::Unknown));
    }

    #[test]
    fn test_reqwest_transport_new() {
        assert!(ReqwestTransport::new("ai-fdocs/test").is_ok());
    }
}
