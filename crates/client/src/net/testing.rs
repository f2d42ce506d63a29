//! In-memory [`HttpTransport`] for exercising the client without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use url::Url;

use super::{HttpMethod, HttpResponse, HttpTransport};
use crate::cancel::CancelToken;
use crate::error::RequestError;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond { status: u16, location: Option<String>, body: String },
    Fail(RequestError),
    /// Never answers; only a timeout ends the attempt.
    Hang,
    /// Fires `token` while the request is in flight, then answers `status`.
    CancelDuring { token: CancelToken, status: u16 },
    /// Panics inside the transport.
    Panic,
}

impl Scripted {
    pub fn status(status: u16) -> Self {
        Scripted::Respond { status, location: None, body: String::new() }
    }

    /// 200 with `body`.
    pub fn json(body: impl Into<String>) -> Self {
        Scripted::Respond { status: 200, location: None, body: body.into() }
    }

    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Scripted::Respond { status, location: Some(location.into()), body: String::new() }
    }

    pub fn cancel_during(token: &CancelToken, status: u16) -> Self {
        Scripted::CancelDuring { token: token.clone(), status }
    }
}

/// Transport answering from per-URL scripts.
///
/// Each URL pops its script front to back; the last entry repeats. URLs
/// without a script answer 404. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(HttpMethod, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, script: Vec<Scripted>) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(normalize(url), script.into());
        }
        self
    }

    /// Every request made so far, in order.
    pub fn calls(&self) -> Vec<(HttpMethod, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, url: &str) -> usize {
        let url = normalize(url);
        self.calls().iter().filter(|(_, u)| *u == url).count()
    }

    fn next(&self, url: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock().ok()?;
        let script = routes.get_mut(url)?;
        if script.len() > 1 { script.pop_front() } else { script.front().cloned() }
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url).map(String::from).unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, method: HttpMethod, url: &Url) -> Result<HttpResponse, RequestError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((method, url.to_string()));
        }

        match self.next(url.as_str()).unwrap_or_else(|| Scripted::status(404)) {
            Scripted::Respond { status, location, body } => Ok(respond(method, url, status, location, body)),
            Scripted::Fail(err) => Err(err),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                Err(RequestError::network("scripted hang elapsed"))
            }
            Scripted::CancelDuring { token, status } => {
                token.cancel();
                Ok(respond(method, url, status, None, String::new()))
            }
            Scripted::Panic => panic!("scripted transport panic for {url}"),
        }
    }
}

fn respond(method: HttpMethod, url: &Url, status: u16, location: Option<String>, body: String) -> HttpResponse {
    let mut headers = HeaderMap::new();
    if let Some(value) = location.and_then(|l| HeaderValue::from_str(&l).ok()) {
        headers.insert(header::LOCATION, value);
    }
    let body = if method == HttpMethod::Head { Bytes::new() } else { Bytes::from(body) };
    HttpResponse { status, headers, body, url: url.clone() }
}
