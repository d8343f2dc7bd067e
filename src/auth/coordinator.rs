use std::sync::Arc;

use async_lock::Mutex;
use tokio::sync::oneshot;

use crate::auth::redirect::LoginRedirect;
use crate::auth::refresh::TokenRefresher;
use crate::auth::store::CredentialStore;
use crate::error::{ClientError, RefreshError, Result};

type Outcome = std::result::Result<String, RefreshError>;

#[derive(Debug)]
enum State {
    Idle,
    /// One exchange is outstanding. Requests that hit a 401 meanwhile wait
    /// here, in arrival order.
    Refreshing(Vec<oneshot::Sender<Outcome>>),
}

/// Makes sure a burst of 401s costs exactly one refresh-token exchange.
///
/// The first caller to find the coordinator idle performs the exchange,
/// everyone arriving while it is outstanding waits for its outcome. On
/// success the new access token is persisted and handed to every waiter. On
/// failure the stored session is cleared, the login redirect fires once and
/// every waiter receives the same error.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    refresher: Arc<dyn TokenRefresher>,
    store: Arc<dyn CredentialStore>,
    redirect: Arc<dyn LoginRedirect>,
    login_route: String,
}

impl RefreshCoordinator {
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        store: Arc<dyn CredentialStore>,
        redirect: Arc<dyn LoginRedirect>,
        login_route: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Idle),
                refresher,
                store,
                redirect,
                login_route: login_route.into(),
            }),
        }
    }

    /// Returns an access token minted after the current one was rejected.
    ///
    /// Fails with [`ClientError::NoRefreshToken`] without touching the state
    /// when there is nothing to exchange.
    pub async fn fresh_access_token(&self) -> Result<String> {
        let mut state = self.inner.state.lock().await;
        if let State::Refreshing(waiters) = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            tracing::debug!("Refresh in flight, waiting as #{}", waiters.len());
            drop(state);
            return match rx.await {
                Ok(outcome) => outcome.map_err(ClientError::from),
                Err(_) => Err(ClientError::RefreshAbandoned),
            };
        }

        let refresh_token = match self.inner.store.refresh_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!("No refresh token stored, giving up on the request");
                return Err(ClientError::NoRefreshToken);
            }
            Err(e) => return Err(ClientError::Store(e)),
        };
        *state = State::Refreshing(Vec::new());
        drop(state);

        tracing::debug!("Access token rejected, refreshing");
        // The exchange is detached from this caller so that dropping it cannot
        // strand the waiters.
        let inner = self.inner.clone();
        let exchange = tokio::spawn(async move { inner.exchange(refresh_token).await });
        let outcome = match exchange.await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Only reached when the store or the redirect panicked, before
                // the waiters were released.
                tracing::error!("Token refresh task failed: {e}");
                let outcome = Err(RefreshError::Transport(format!("refresh task failed: {e}")));
                self.inner.settle(outcome.clone()).await;
                outcome
            }
        };
        outcome.map_err(ClientError::from)
    }

    pub async fn is_refreshing(&self) -> bool {
        matches!(*self.inner.state.lock().await, State::Refreshing(_))
    }

    /// Number of requests parked behind the exchange in flight.
    pub async fn waiting(&self) -> usize {
        match &*self.inner.state.lock().await {
            State::Idle => 0,
            State::Refreshing(waiters) => waiters.len(),
        }
    }
}

impl Inner {
    async fn exchange(&self, refresh_token: String) -> Outcome {
        // A panicking refresher surfaces as a JoinError here and takes the
        // failure path like any other failed exchange.
        let refresher = self.refresher.clone();
        let attempt = tokio::spawn(async move { refresher.refresh(&refresh_token).await });
        let result = match attempt.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Token refresher failed: {e}");
                Err(RefreshError::Transport(format!("refresh task failed: {e}")))
            }
        };

        let outcome = match result {
            Ok(tokens) => {
                if let Err(e) = self
                    .store
                    .set_access_token(&tokens.access_token, tokens.refresh_token.as_deref())
                    .await
                {
                    tracing::warn!("Failed to persist the refreshed access token: {e:#}");
                }
                tracing::debug!("Access token refreshed");
                Ok(tokens.access_token)
            }
            Err(e) => {
                tracing::warn!("Token refresh failed, logging out: {e}");
                if let Err(e) = self.store.logout().await {
                    tracing::error!("Failed to clear credentials: {e:#}");
                }
                self.redirect.redirect(&self.login_route);
                Err(e)
            }
        };
        self.settle(outcome.clone()).await;
        outcome
    }

    /// Drains the waiters exactly once and returns to idle.
    async fn settle(&self, outcome: Outcome) {
        let waiters = {
            let mut state = self.state.lock().await;
            match std::mem::replace(&mut *state, State::Idle) {
                State::Idle => Vec::new(),
                State::Refreshing(waiters) => waiters,
            }
        };
        tracing::debug!("Releasing {} waiting request(s)", waiters.len());
        for waiter in waiters {
            // The waiter may have given up on its request.
            let _ = waiter.send(outcome.clone());
        }
    }
}
