//! Errors surfaced by the API client.

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure of a refresh-token exchange.
///
/// Cloned once per queued request so that every waiter sees the same cause.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("refresh endpoint answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("refresh response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request could not be sent")]
    Transport(#[source] anyhow::Error),

    /// A 401 that is not going to be refreshed, either because the request
    /// was already retried once or because the server rejected the login.
    #[error("unauthorized: {url}")]
    Unauthorized { url: String },

    #[error("no refresh token available, log in again")]
    NoRefreshToken,

    #[error("session expired: {0}")]
    Refresh(#[from] RefreshError),

    #[error("token refresh ended without a result")]
    RefreshAbandoned,

    #[error("credential store failed")]
    Store(#[source] anyhow::Error),

    #[error("{method} {url} answered {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("response body could not be decoded")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Whether this error means the user has to log in again.
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthorized { .. } | ClientError::NoRefreshToken | ClientError::Refresh(_)
        )
    }
}
