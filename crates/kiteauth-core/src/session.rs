//! The session record produced by a successful login.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccessToken;

/// A live (or restorable) broker session.
///
/// Sessions are immutable: a refresh or re-login replaces the whole value.
/// The access token is redacted from Debug output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    user_id: String,
    access_token: AccessToken,
    obtained_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl Session {
    /// Create a session obtained at `obtained_at` with no known expiry.
    pub fn new(
        user_id: impl Into<String>,
        access_token: AccessToken,
        obtained_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            access_token,
            obtained_at,
            expires_at: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the instant after which the broker stops accepting the token.
    pub fn with_expiry(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Attach raw broker metadata (profile fields, login time, ...).
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the user id this session belongs to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the access token.
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    /// Returns when the token was obtained.
    pub fn obtained_at(&self) -> DateTime<Utc> {
        self.obtained_at
    }

    /// Returns when the token expires, if known.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns the broker metadata captured at login.
    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    /// Check whether the session has expired as of `now`.
    ///
    /// A session without a known expiry never expires locally; only the
    /// broker can reject it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }

    /// Check whether the session has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn expiry_boundaries() {
        let session =
            Session::new("AB1234", AccessToken::new("tok"), at(1_000)).with_expiry(Some(at(2_000)));
        assert!(!session.is_expired_at(at(1_999)));
        assert!(session.is_expired_at(at(2_000)));
    }

    #[test]
    fn no_expiry_never_expires() {
        let session = Session::new("AB1234", AccessToken::new("tok"), at(0));
        assert!(!session.is_expired_at(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn debug_redacts_token() {
        let session = Session::new("AB1234", AccessToken::new("very-secret"), at(0));
        let debug = format!("{:?}", session);
        assert!(debug.contains("AB1234"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn persisted_form() {
        let session = Session::new("AB1234", AccessToken::new("tok"), at(0))
            .with_metadata(json!({"user_name": "Test User"}));
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["access_token"], "tok");
        assert_eq!(value["metadata"]["user_name"], "Test User");
        assert!(value.get("expires_at").is_none());

        let back: Session = serde_json::from_value(value).unwrap();
        assert_eq!(back, session);
    }
}
