use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::auth::Session;
use crate::client::Client;
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::http::Request;

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

/// Session lifecycle endpoints.
#[derive(Debug, Clone)]
pub struct AuthApi<'a> {
    client: &'a Client,
    config: &'a Config,
}

impl<'a> AuthApi<'a> {
    pub fn new(client: &'a Client, config: &'a Config) -> Self {
        Self { client, config }
    }

    /// Exchanges username and password for a session and stores it.
    ///
    /// Goes straight to the transport: a rejected login is an answer, not an
    /// expired token.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let url = self.config.endpoint(&self.config.login_path)?;
        let request = Request::post(url.clone()).with_json(&Credentials { username, password })?;
        let response = self
            .client
            .http_client()
            .execute(request)
            .await
            .map_err(ClientError::Transport)?;
        match response.status {
            StatusCode::UNAUTHORIZED => {
                return Err(ClientError::Unauthorized {
                    url: url.to_string(),
                });
            }
            status if !status.is_success() => {
                return Err(ClientError::Status {
                    method: "POST".to_string(),
                    url: url.to_string(),
                    status,
                    body: response.text(),
                });
            }
            _ => {}
        }
        let login: LoginResponse = response.json()?;
        let session = Session::new(login.access_token, login.refresh_token, login.user);
        self.client
            .store()
            .login(&session)
            .await
            .map_err(ClientError::Store)?;
        tracing::info!("Logged in as {username}");
        Ok(session)
    }

    /// Tells the backend, then forgets the local session whatever it said.
    pub async fn logout(&self) -> Result<()> {
        let url = self.config.endpoint(&self.config.logout_path)?;
        let store = self.client.store();
        let refresh_token = store.refresh_token().await.map_err(ClientError::Store)?;
        if let Some(refresh_token) = refresh_token {
            let request = Request::post(url)
                .with_json(&serde_json::json!({ "refresh_token": refresh_token }))?;
            match self.client.http_client().execute(request).await {
                Ok(response) if !response.is_success() => {
                    tracing::warn!("Logout answered {}", response.status);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Logout request failed: {e:#}"),
            }
        }
        store.logout().await.map_err(ClientError::Store)?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Fetches the current user and keeps the stored copy in sync.
    pub async fn me(&self) -> Result<serde_json::Value> {
        let user: serde_json::Value = self.client.get_json(&self.config.me_path).await?;
        let store = self.client.store();
        if let Some(mut session) = store.load().await.map_err(ClientError::Store)? {
            session.user = Some(user.clone());
            store.login(&session).await.map_err(ClientError::Store)?;
        }
        Ok(user)
    }
}
