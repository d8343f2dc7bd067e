use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::RefreshError;
use crate::http::{HttpClient, Request};

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Body of a successful refresh exchange.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshedTokens {
    pub access_token: String,
    /// Present only when the server rotates refresh tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync + std::fmt::Debug + 'static {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError>;
}

/// Exchanges a refresh token at the backend's refresh endpoint.
///
/// Talks to the raw transport, never to the intercepting client, so a 401
/// from the refresh endpoint is just another failed exchange.
#[derive(Debug)]
pub struct HttpTokenRefresher {
    http_client: Arc<dyn HttpClient>,
    endpoint: Url,
}

impl HttpTokenRefresher {
    pub fn new(http_client: Arc<dyn HttpClient>, endpoint: Url) -> Self {
        Self {
            http_client,
            endpoint,
        }
    }
}

#[async_trait::async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let request = Request::post(self.endpoint.clone())
            .with_json(&RefreshRequest { refresh_token })
            .map_err(|e| RefreshError::Decode(e.to_string()))?;
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| RefreshError::Transport(format!("{e:#}")))?;
        if !response.is_success() {
            return Err(RefreshError::Status {
                status: response.status,
                body: response.text(),
            });
        }
        response
            .json::<RefreshedTokens>()
            .map_err(|e| RefreshError::Decode(e.to_string()))
    }
}
