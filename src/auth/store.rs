use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_lock::RwLock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the client remembers between requests: the credential pair and the
/// identity of the logged-in user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_in_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        access_token: String,
        refresh_token: String,
        user: Option<serde_json::Value>,
    ) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
            user,
            logged_in_at: Some(Utc::now()),
        }
    }
}

#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync + std::fmt::Debug + 'static {
    async fn load(&self) -> Result<Option<Session>>;

    /// Replaces whatever is stored with a fresh session.
    async fn login(&self, session: &Session) -> Result<()>;

    /// Writes back the outcome of a refresh. The refresh token is only
    /// replaced when the server rotated it.
    async fn set_access_token(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()>;

    /// Forgets the session. Forgetting an absent session succeeds.
    async fn logout(&self) -> Result<()>;

    async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.load().await?.and_then(|s| s.access_token))
    }

    async fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.load().await?.and_then(|s| s.refresh_token))
    }
}

/// Keeps the session in a JSON file, typically `~/.schoolhub/session.json`.
#[derive(Debug)]
pub struct FileSystemCredentialStore {
    profile_path: PathBuf,
}

impl FileSystemCredentialStore {
    pub fn new(profile_path: PathBuf) -> Arc<Self> {
        Arc::new(Self { profile_path })
    }

    async fn write(&self, session: &Session) -> Result<()> {
        let data = serde_json::to_string_pretty(session)?;
        if let Some(parent) = self.profile_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&self.profile_path, data)
            .await
            .with_context(|| format!("writing {}", self.profile_path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CredentialStore for FileSystemCredentialStore {
    async fn load(&self) -> Result<Option<Session>> {
        let data = match tokio::fs::read_to_string(&self.profile_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.profile_path.display()));
            }
        };
        let session = serde_json::from_str(&data)
            .with_context(|| format!("parsing {}", self.profile_path.display()))?;
        Ok(Some(session))
    }

    async fn login(&self, session: &Session) -> Result<()> {
        self.write(session).await
    }

    async fn set_access_token(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<()> {
        let mut session = self.load().await?.unwrap_or_default();
        session.access_token = Some(access_token.to_string());
        if let Some(refresh_token) = refresh_token {
            session.refresh_token = Some(refresh_token.to_string());
        }
        self.write(&session).await
    }

    async fn logout(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.profile_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.profile_path.display())),
        }
    }
}

#[derive(Debug)]
pub struct MemoryCredentialStore {
    session: RwLock<Option<Session>>,
}

impl MemoryCredentialStore {
    pub fn new(session: Option<Session>) -> Arc<Self> {
        Arc::new(Self {
            session: RwLock::new(session),
        })
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    async fn login(&self, session: &Session) -> Result<()> {
        *self.session.write().await = Some(session.clone());
        Ok(())
    }

    async fn set_access_token(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<()> {
        let mut guard = self.session.write().await;
        let session = guard.get_or_insert_with(Session::default);
        session.access_token = Some(access_token.to_string());
        if let Some(refresh_token) = refresh_token {
            session.refresh_token = Some(refresh_token.to_string());
        }
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        *self.session.write().await = None;
        Ok(())
    }
}
