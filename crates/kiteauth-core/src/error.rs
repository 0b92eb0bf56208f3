//! Error types for kiteauth.
//!
//! This module provides a unified error type with explicit variants for
//! configuration, login handshake, session, caller input, transport,
//! protocol and storage failures. Every variant carries owned strings so the error is `Clone`,
//! which lets concurrent callers of a shared login attempt all receive it.

use std::fmt;
use thiserror::Error;

/// The unified error type for kiteauth operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Missing or malformed credentials, detected before any network I/O.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// A step of the multi-step login handshake failed.
    #[error("login failed: {0}")]
    Login(#[from] LoginError),

    /// A previously valid session was rejected by a live request.
    #[error("session invalid: {reason}")]
    SessionInvalid { reason: String },

    /// A request was attempted before any login succeeded.
    #[error("session manager not initialized")]
    NotInitialized,

    /// The caller's request could not be encoded; nothing was sent.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Network transport errors (connection, timeout, malformed body).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error envelope returned by the broker for a non-auth failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Reading or writing the persisted session failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    /// Create a session-invalid error.
    pub fn session_invalid(reason: impl Into<String>) -> Self {
        Error::SessionInvalid {
            reason: reason.into(),
        }
    }

    /// Create an invalid-request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Error::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Returns true if this error means the broker rejected the access token.
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Error::SessionInvalid { .. })
    }
}

/// Credential validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// A required field is empty or unset.
    #[error("missing {field}")]
    Missing { field: &'static str },

    /// A field is present but unusable.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// The step of the login handshake that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginStep {
    /// Submitting user id and password.
    Password,
    /// Submitting the time-based one-time password.
    TwoFactor,
    /// Following the app authorization redirect to capture the request token.
    Authorize,
    /// Exchanging the request token and checksum for an access token.
    TokenExchange,
}

impl LoginStep {
    /// Returns the step name as used in logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStep::Password => "password",
            LoginStep::TwoFactor => "two_factor",
            LoginStep::Authorize => "authorize",
            LoginStep::TokenExchange => "token_exchange",
        }
    }
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A login handshake failure, tagged with the failing step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step} step: {reason}")]
pub struct LoginError {
    /// The step that failed.
    pub step: LoginStep,
    /// Broker message or local description of the failure.
    pub reason: String,
}

impl LoginError {
    /// Create a new login error for the given step.
    pub fn new(step: LoginStep, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }
}

/// Transport-level errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// Response body could not be decoded.
    #[error("malformed response: {message}")]
    Decode { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Protocol-level errors from broker error envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Broker error class (e.g. `TokenException`, `InputException`).
    pub error_type: Option<String>,
    /// Error message from the broker.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref error_type) = self.error_type {
            write!(f, " [{}]", error_type)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, error_type: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            error_type,
            message,
        }
    }

    /// Check if the broker rejected the access token.
    ///
    /// Kite reports invalid or expired tokens as `TokenException` (HTTP 403).
    /// A bare 401, or a 403 without any error class, is treated the same way.
    pub fn is_auth_error(&self) -> bool {
        match self.error_type.as_deref() {
            Some("TokenException") => true,
            Some(_) => self.status == 401,
            None => self.status == 401 || self.status == 403,
        }
    }
}

/// Persisted session storage errors.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Filesystem I/O failed.
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    /// The stored record could not be encoded or decoded.
    #[error("corrupt session record: {message}")]
    Corrupt { message: String },
}
