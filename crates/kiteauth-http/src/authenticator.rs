//! Kite Connect [`Authenticator`] implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use kiteauth_core::traits::{Authenticator, LoginOutcome, RequestMethod, SessionStore};
use kiteauth_core::{Credentials, Error, Result, Session, SessionManager};

use crate::client::KiteClient;
use crate::endpoints::{KiteEndpoints, SESSION_TOKEN, USER_PROFILE};
use crate::handshake;

/// A [`SessionManager`] driving the Kite authenticator.
pub type KiteSessionManager = SessionManager<KiteAuthenticator>;

/// Logs in to Kite Connect and proxies authenticated API calls.
///
/// Holds at most one [`Session`]. Fresh sessions are written to the
/// configured [`SessionStore`] and restored from it on the next
/// [`initialize`](Authenticator::initialize).
pub struct KiteAuthenticator {
    credentials: Credentials,
    client: KiteClient,
    store: Arc<dyn SessionStore>,
    session: RwLock<Option<Session>>,
}

impl KiteAuthenticator {
    /// Create an authenticator against the given endpoints.
    pub fn new(
        credentials: Credentials,
        endpoints: KiteEndpoints,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        Ok(Self {
            credentials,
            client: KiteClient::new(endpoints)?,
            store,
            session: RwLock::new(None),
        })
    }

    /// Create an authenticator for the production Kite hosts with
    /// credentials read from the environment.
    ///
    /// Fails before any I/O if a credential is missing or malformed.
    pub fn from_env(store: Arc<dyn SessionStore>) -> Result<Self> {
        let credentials = Credentials::from_env()?;
        Self::new(credentials, KiteEndpoints::default(), store)
    }

    /// Adopt a session obtained elsewhere, e.g. read from a store by a
    /// process that only needs to revoke it.
    ///
    /// The session is not validated; the next
    /// [`initialize`](Authenticator::initialize) replaces it.
    pub fn with_session(self, session: Session) -> Self {
        self.set_session(Some(session));
        self
    }

    /// Wrap this authenticator in a [`SessionManager`].
    pub fn into_manager(self) -> KiteSessionManager {
        SessionManager::new(self)
    }

    /// Returns the configured credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the HTTP client.
    pub fn client(&self) -> &KiteClient {
        &self.client
    }

    fn set_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn auth_value(&self, session: &Session) -> String {
        format!(
            "{}:{}",
            self.credentials.api_key(),
            session.access_token().as_str()
        )
    }

    /// Forget `rejected` unless another login already replaced it.
    async fn invalidate(&self, rejected: &Session) {
        {
            let mut current = self.session.write().unwrap_or_else(PoisonError::into_inner);
            match current.as_ref() {
                Some(s) if s.access_token() == rejected.access_token() => *current = None,
                _ => {
                    debug!("Rejected token already replaced");
                    return;
                }
            }
        }

        if let Err(e) = self.store.clear(rejected.user_id()).await {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    /// Try to reuse a persisted session.
    ///
    /// Returns `Ok(None)` when there is nothing usable to restore.
    async fn restore(&self) -> Result<Option<Session>> {
        let user_id = self.credentials.user_id();

        let stored = match self.store.load(user_id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable persisted session");
                self.discard().await;
                return Ok(None);
            }
        };

        let Some(session) = stored else {
            debug!("No persisted session");
            return Ok(None);
        };

        if session.user_id() != user_id {
            warn!("Persisted session belongs to another user");
            return Ok(None);
        }

        if session.is_expired() {
            info!(expires_at = ?session.expires_at(), "Persisted session expired");
            self.discard().await;
            return Ok(None);
        }

        match self
            .client
            .send_authed(RequestMethod::Get, USER_PROFILE, &self.auth_value(&session), None)
            .await
        {
            Ok(_) => Ok(Some(session)),
            Err(Error::Protocol(p)) if p.is_auth_error() => {
                info!(error = %p, "Persisted session rejected by broker");
                self.discard().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn discard(&self) {
        if let Err(e) = self.store.clear(self.credentials.user_id()).await {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }
}

#[async_trait]
impl Authenticator for KiteAuthenticator {
    #[instrument(skip(self), fields(user_id = %self.credentials.user_id()))]
    async fn initialize(&self) -> Result<LoginOutcome> {
        self.set_session(None);

        if let Some(session) = self.restore().await? {
            info!("Restored persisted session");
            self.set_session(Some(session.clone()));
            return Ok(LoginOutcome::Restored(session));
        }

        info!("Running login handshake");
        let session = handshake::run(&self.client, &self.credentials).await?;

        if let Err(e) = self.store.save(&session).await {
            warn!(error = %e, "Failed to persist session");
        }

        self.set_session(Some(session.clone()));
        Ok(LoginOutcome::LoggedIn(session))
    }

    #[instrument(skip(self, data))]
    async fn make_authenticated_request(
        &self,
        endpoint: &str,
        method: RequestMethod,
        data: Option<&Value>,
    ) -> Result<Value> {
        let session = self
            .get_session()
            .ok_or_else(|| Error::session_invalid("no active session"))?;

        match self
            .client
            .send_authed(method, endpoint, &self.auth_value(&session), data)
            .await
        {
            Err(Error::Protocol(p)) if p.is_auth_error() => {
                warn!(error = %p, "Access token rejected");
                self.invalidate(&session).await;
                let reason = p.message.clone().unwrap_or_else(|| p.to_string());
                Err(Error::session_invalid(reason))
            }
            other => other,
        }
    }

    fn get_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[instrument(skip(self), fields(user_id = %self.credentials.user_id()))]
    async fn logout(&self) -> Result<()> {
        let session = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(session) = &session {
            let data = serde_json::json!({
                "api_key": self.credentials.api_key(),
                "access_token": session.access_token().as_str(),
            });
            if let Err(e) = self
                .client
                .send_authed(
                    RequestMethod::Delete,
                    SESSION_TOKEN,
                    &self.auth_value(session),
                    Some(&data),
                )
                .await
            {
                warn!(error = %e, "Broker logout failed; forgetting session locally");
            }
        }

        self.store.clear(self.credentials.user_id()).await?;
        info!("Session cleared");
        Ok(())
    }
}

impl std::fmt::Debug for KiteAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiteAuthenticator")
            .field("credentials", &self.credentials)
            .field("endpoints", self.client.endpoints())
            .field("session", &self.get_session())
            .finish()
    }
}
