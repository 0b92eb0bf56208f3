//! Authenticator trait.

use std::fmt;

use async_trait::async_trait;

use crate::{Result, Session};

/// HTTP method for a proxied request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl RequestMethod {
    /// Returns the method name in upper case.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(RequestMethod::Get),
            "POST" => Ok(RequestMethod::Post),
            "PUT" => Ok(RequestMethod::Put),
            "DELETE" => Ok(RequestMethod::Delete),
            other => Err(format!("unsupported method '{}'", other)),
        }
    }
}

/// How [`Authenticator::initialize`] obtained its session.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// A persisted session passed validation and was reused.
    Restored(Session),
    /// The full login handshake ran and produced a new session.
    LoggedIn(Session),
}

impl LoginOutcome {
    /// Returns the session regardless of how it was obtained.
    pub fn session(&self) -> &Session {
        match self {
            LoginOutcome::Restored(session) | LoginOutcome::LoggedIn(session) => session,
        }
    }

    /// Consumes the outcome, returning the session.
    pub fn into_session(self) -> Session {
        match self {
            LoginOutcome::Restored(session) | LoginOutcome::LoggedIn(session) => session,
        }
    }

    /// Returns true if the session was restored without a fresh login.
    pub fn is_restored(&self) -> bool {
        matches!(self, LoginOutcome::Restored(_))
    }
}

/// Produces and holds exactly one broker session, and proxies requests
/// that need it.
///
/// Implementations never retry: every failure is returned to the caller.
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Restore a persisted session or run the full login handshake.
    ///
    /// On error the held session is `None`.
    async fn initialize(&self) -> Result<LoginOutcome>;

    /// Send an authenticated request and return the response payload.
    ///
    /// An authorization rejection invalidates the held session and fails
    /// with [`Error::SessionInvalid`](crate::Error::SessionInvalid).
    async fn make_authenticated_request(
        &self,
        endpoint: &str,
        method: RequestMethod,
        data: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value>;

    /// Returns the current session without performing I/O.
    fn get_session(&self) -> Option<Session>;

    /// End the session with the broker and forget it locally.
    async fn logout(&self) -> Result<()>;
}
