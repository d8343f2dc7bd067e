use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::{CredentialStore, HttpTokenRefresher, LoginRedirect, RefreshCoordinator};
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::http::{HttpClient, Request, Response};

/// A request together with whether it already went through a refresh.
///
/// A `Retried` request that is rejected again is not refreshed a second time.
#[derive(Debug, Clone)]
pub enum Attempt {
    Fresh(Request),
    Retried(Request),
}

impl Attempt {
    pub fn request(&self) -> &Request {
        match self {
            Attempt::Fresh(request) | Attempt::Retried(request) => request,
        }
    }
}

/// Client for the platform API.
///
/// Attaches the stored access token to every request and transparently
/// refreshes it when the backend answers 401.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http_client: Arc<dyn HttpClient>,
    store: Arc<dyn CredentialStore>,
    coordinator: RefreshCoordinator,
}

impl Client {
    pub fn new(
        base_url: Url,
        http_client: Arc<dyn HttpClient>,
        store: Arc<dyn CredentialStore>,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            base_url,
            http_client,
            store,
            coordinator,
        }
    }

    pub fn from_config(
        config: &Config,
        http_client: Arc<dyn HttpClient>,
        store: Arc<dyn CredentialStore>,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Result<Self> {
        let refresher = HttpTokenRefresher::new(
            http_client.clone(),
            config.endpoint(&config.refresh_path)?,
        );
        let coordinator = RefreshCoordinator::new(
            Arc::new(refresher),
            store.clone(),
            redirect,
            config.login_route.clone(),
        );
        Ok(Self::new(
            config.base_url.clone(),
            http_client,
            store,
            coordinator,
        ))
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// The transport underneath, without token handling.
    pub fn http_client(&self) -> Arc<dyn HttpClient> {
        self.http_client.clone()
    }

    pub fn store(&self) -> Arc<dyn CredentialStore> {
        self.store.clone()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub async fn send(&self, request: Request) -> Result<Response> {
        self.dispatch(Attempt::Fresh(request)).await
    }

    /// Sends the attempt and handles a 401 answer.
    ///
    /// Any other status, error or not, is returned as is.
    pub async fn dispatch(&self, mut attempt: Attempt) -> Result<Response> {
        let mut token = self
            .store
            .access_token()
            .await
            .map_err(ClientError::Store)?;
        loop {
            let mut request = attempt.request().clone();
            if let Some(token) = token.as_deref() {
                request = request.bearer(token);
            }
            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(ClientError::Transport)?;
            if response.status != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            match attempt {
                Attempt::Retried(request) => {
                    tracing::debug!("{} {} rejected after refresh", request.method, request.url);
                    return Err(ClientError::Unauthorized {
                        url: request.url.to_string(),
                    });
                }
                Attempt::Fresh(request) => {
                    tracing::debug!("{} {} answered 401", request.method, request.url);
                    token = Some(self.coordinator.fresh_access_token().await?);
                    attempt = Attempt::Retried(request);
                }
            }
        }
    }

    /// Sends the request and turns any non-2xx answer into an error.
    pub async fn send_ok(&self, request: Request) -> Result<Response> {
        let method = request.method.to_string();
        let url = request.url.to_string();
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(ClientError::Status {
                method,
                url,
                status: response.status,
                body: response.text(),
            });
        }
        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send_ok(Request::get(self.url(path)?)).await?;
        Ok(response.json()?)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = Request::post(self.url(path)?).with_json(body)?;
        let response = self.send_ok(request).await?;
        Ok(response.json()?)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send_ok(Request::new(Method::DELETE, self.url(path)?))
            .await?;
        Ok(())
    }

    /// Generic JSON call. An empty response body comes back as `null`.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let mut request = Request::new(method, url);
        if let Some(body) = body {
            request = request.with_json(body)?;
        }
        let response = self.send_ok(request).await?;
        if response.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(response.json()?)
    }
}
