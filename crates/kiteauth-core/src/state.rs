//! Login state machine values and the events published to observers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Session;

/// Login state held by the [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginState {
    /// No login attempted yet, or logged out.
    #[default]
    Idle,
    /// A login attempt is in flight.
    LoggingIn,
    /// A session is held and believed valid.
    LoggedIn,
    /// The last login failed or the session was rejected.
    Error,
}

impl LoginState {
    /// Returns the wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginState::Idle => "idle",
            LoginState::LoggingIn => "logging_in",
            LoginState::LoggedIn => "logged_in",
            LoginState::Error => "error",
        }
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the manager's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Current login state.
    pub status: LoginState,
    /// Message of the last failure, cleared on successful login.
    pub error: Option<String>,
    /// True iff a session is currently held.
    pub is_authenticated: bool,
}

/// Notification published by the manager on every transition.
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    /// The login state changed.
    StatusChange(StatusSnapshot),
    /// A new session became active.
    SessionUpdate(Session),
}
