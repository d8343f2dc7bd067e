//! Scripted backend used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode};
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::redirect::LoginRedirect;
use crate::http::{HttpClient, Request, Response};

pub(crate) const REFRESH_PATH: &str = "/auth/refresh";

type RefreshHandler = Arc<dyn Fn(serde_json::Value) -> Response + Send + Sync>;

pub(crate) fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    let mut response = Response::new(status, body.to_string());
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Protected paths answer 200 with `{"path", "token"}` to the accepted
/// bearer token and 401 to anything else. The refresh endpoint is scripted
/// with [`FakeBackend::on_refresh`] and can be held back with
/// [`FakeBackend::hold_refresh`].
pub(crate) struct FakeBackend {
    base: Url,
    accepted_token: Mutex<Option<String>>,
    refresh_handler: Mutex<Option<RefreshHandler>>,
    refresh_gate: Mutex<Option<Arc<Semaphore>>>,
    refresh_calls: AtomicUsize,
    offline: AtomicBool,
    routes: Mutex<HashMap<(Method, String), Response>>,
    requests: Mutex<Vec<Request>>,
}

impl std::fmt::Debug for FakeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeBackend")
            .field("base", &self.base)
            .field("refresh_calls", &self.refresh_calls)
            .finish()
    }
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Url::parse("https://api.school.test").unwrap(),
            accepted_token: Mutex::new(None),
            refresh_handler: Mutex::new(None),
            refresh_gate: Mutex::new(None),
            refresh_calls: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn base(&self) -> Url {
        self.base.clone()
    }

    pub(crate) fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }

    pub(crate) fn accept_token(&self, token: &str) {
        *self.accepted_token.lock().unwrap() = Some(token.to_string());
    }

    pub(crate) fn on_refresh<F>(&self, handler: F)
    where
        F: Fn(serde_json::Value) -> Response + Send + Sync + 'static,
    {
        *self.refresh_handler.lock().unwrap() = Some(Arc::new(handler));
    }

    /// Refresh calls block until [`FakeBackend::release_refresh`].
    pub(crate) fn hold_refresh(&self) {
        *self.refresh_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub(crate) fn release_refresh(&self) {
        if let Some(gate) = self.refresh_gate.lock().unwrap().as_ref() {
            gate.add_permits(1024);
        }
    }

    /// Every request fails at the transport level.
    pub(crate) fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub(crate) fn route(&self, method: Method, path: &str, response: Response) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), response);
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn protected(&self, request: &Request) -> Response {
        let accepted = self.accepted_token.lock().unwrap().clone();
        let presented = request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        match (accepted, presented) {
            (Some(accepted), Some(presented)) if accepted == presented => json_response(
                StatusCode::OK,
                serde_json::json!({"path": request.url.path(), "token": presented}),
            ),
            _ => json_response(
                StatusCode::UNAUTHORIZED,
                serde_json::json!({"error": "token expired"}),
            ),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for FakeBackend {
    async fn execute(&self, request: Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }

        if request.url.path() == REFRESH_PATH {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.refresh_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                let _permit = gate.acquire().await?;
            }
            let handler = self.refresh_handler.lock().unwrap().clone();
            let body = request
                .body
                .as_deref()
                .map(serde_json::from_slice::<serde_json::Value>)
                .transpose()?
                .unwrap_or(serde_json::Value::Null);
            return Ok(match handler {
                Some(handler) => handler(body),
                None => json_response(StatusCode::INTERNAL_SERVER_ERROR, serde_json::json!({})),
            });
        }

        let route = self
            .routes
            .lock()
            .unwrap()
            .get(&(request.method.clone(), request.url.path().to_string()))
            .cloned();
        Ok(route.unwrap_or_else(|| self.protected(&request)))
    }
}

/// Counts redirects instead of performing them.
#[derive(Debug, Default)]
pub(crate) struct RecordingRedirect {
    routes: Mutex<Vec<String>>,
}

impl RecordingRedirect {
    pub(crate) fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap().clone()
    }
}

impl LoginRedirect for RecordingRedirect {
    fn redirect(&self, route: &str) {
        self.routes.lock().unwrap().push(route.to_string());
    }
}
