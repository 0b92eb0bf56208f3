//! Session manager: the login state machine and authenticated request proxy.
//!
//! ```text
//! idle --initialize()--> logging_in --success--> logged_in
//! logging_in --failure--> error
//! logged_in --session rejected by a proxied request--> error
//! error --initialize()--> logging_in
//! any --logout()--> idle
//! ```
//!
//! Every transition publishes exactly one [`ManagerEvent::StatusChange`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::state::{LoginState, ManagerEvent, StatusSnapshot};
use crate::traits::{Authenticator, LoginOutcome, RequestMethod};
use crate::{Error, Result, Session};

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 64;

type InFlight = Shared<BoxFuture<'static, Result<LoginOutcome>>>;

/// Coordinates one [`Authenticator`] for the whole process.
///
/// Construct one at startup and hand clones to every subsystem that needs
/// authenticated access; clones share the same state. Status changes can
/// be observed through [`SessionManager::subscribe`].
///
/// # Example
///
/// ```no_run
/// use kiteauth_core::{Authenticator, RequestMethod, SessionManager};
///
/// # async fn example<A: Authenticator>(authenticator: A) -> kiteauth_core::Result<()> {
/// let manager = SessionManager::new(authenticator);
/// manager.initialize().await?;
///
/// let profile = manager
///     .make_authenticated_request("/user/profile", RequestMethod::Get, None)
///     .await?;
/// println!("{}", profile);
/// # Ok(())
/// # }
/// ```
pub struct SessionManager<A: Authenticator> {
    inner: Arc<ManagerInner<A>>,
}

struct ManagerInner<A> {
    authenticator: A,
    state: Mutex<ManagerState>,
    events: broadcast::Sender<ManagerEvent>,
    in_flight: Mutex<Option<InFlight>>,
}

#[derive(Debug, Default)]
struct ManagerState {
    status: LoginState,
    last_error: Option<String>,
    /// Set once an `initialize()` has succeeded.
    initialized: bool,
}

impl<A: Authenticator> SessionManager<A> {
    /// Create a manager in the `idle` state.
    pub fn new(authenticator: A) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ManagerInner {
                authenticator,
                state: Mutex::new(ManagerState::default()),
                events,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Returns the wrapped authenticator.
    pub fn authenticator(&self) -> &A {
        &self.inner.authenticator
    }

    /// Subscribe to status changes and session updates.
    ///
    /// Only events sent after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the current status. Pure read.
    pub fn get_status(&self) -> StatusSnapshot {
        let is_authenticated = self.inner.authenticator.get_session().is_some();
        let state = self.inner.state();
        StatusSnapshot {
            status: state.status,
            error: state.last_error.clone(),
            is_authenticated,
        }
    }

    /// Returns the current session, if any.
    pub fn get_session(&self) -> Option<Session> {
        self.inner.authenticator.get_session()
    }

    /// Log in, restoring a persisted session when possible.
    ///
    /// Concurrent callers share a single attempt: the handshake runs once and
    /// every caller receives its result. Failures are returned to the caller
    /// and also recorded in the status.
    ///
    /// The returned [`LoginOutcome`] tells a restored session apart from a
    /// fresh login. A panicking authenticator does not wedge the manager; the
    /// next call starts a new attempt.
    pub async fn initialize(&self) -> Result<LoginOutcome> {
        let attempt = {
            let mut slot = self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(existing) => {
                    debug!("Joining in-flight login");
                    existing.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let attempt = async move {
                        let result = AssertUnwindSafe(inner.run_initialize())
                            .catch_unwind()
                            .await;
                        inner.clear_in_flight();
                        match result {
                            Ok(result) => result,
                            Err(payload) => panic::resume_unwind(payload),
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = Some(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await
    }

    /// Proxy an authenticated request through the authenticator.
    ///
    /// Fails with [`Error::NotInitialized`] until a login has succeeded. A
    /// rejected session moves the state machine to `error`.
    #[instrument(skip(self, data))]
    pub async fn make_authenticated_request(
        &self,
        endpoint: &str,
        method: RequestMethod,
        data: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        if !self.inner.state().initialized {
            return Err(Error::NotInitialized);
        }

        let result = self
            .inner
            .authenticator
            .make_authenticated_request(endpoint, method, data)
            .await;

        if let Err(ref err) = result {
            if err.is_session_invalid() && self.inner.state().status == LoginState::LoggedIn {
                warn!(error = %err, "Session rejected by broker");
                self.inner.transition(LoginState::Error, Some(err.to_string()));
            }
        }

        result
    }

    /// End the session and return to `idle`.
    ///
    /// The local session is forgotten even if the broker call fails, and
    /// requests fail with [`Error::NotInitialized`] until the next login.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let result = self.inner.authenticator.logout().await;
        self.inner.state().initialized = false;
        self.inner.transition(LoginState::Idle, None);
        info!("Logged out");
        result
    }
}

impl<A: Authenticator> Clone for SessionManager<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Authenticator> std::fmt::Debug for SessionManager<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("SessionManager")
            .field("status", &state.status)
            .field("last_error", &state.last_error)
            .finish()
    }
}

impl<A: Authenticator> ManagerInner<A> {
    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_in_flight(&self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    #[instrument(skip(self))]
    async fn run_initialize(&self) -> Result<LoginOutcome> {
        info!("Initializing session");
        self.transition(LoginState::LoggingIn, None);

        match self.authenticator.initialize().await {
            Ok(outcome) => {
                self.state().initialized = true;
                self.transition(LoginState::LoggedIn, None);
                // No receivers is fine.
                let _ = self
                    .events
                    .send(ManagerEvent::SessionUpdate(outcome.session().clone()));
                info!(restored = outcome.is_restored(), "Session ready");
                Ok(outcome)
            }
            Err(err) => {
                warn!(error = %err, "Login failed");
                self.transition(LoginState::Error, Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Apply a transition and publish the resulting snapshot.
    fn transition(&self, status: LoginState, error: Option<String>) {
        let is_authenticated = self.authenticator.get_session().is_some();

        let mut state = self.state();
        debug!(from = %state.status, to = %status, "Login state transition");
        state.status = status;
        state.last_error = error;

        let snapshot = StatusSnapshot {
            status: state.status,
            error: state.last_error.clone(),
            is_authenticated,
        };
        // Sent under the lock so observers see transitions in order.
        let _ = self.events.send(ManagerEvent::StatusChange(snapshot));
    }
}
