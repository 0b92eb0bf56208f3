//! Output formatting helpers.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use serde::Serialize;

use kiteauth_core::{LoginState, Session};

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print a value as compact JSON.
pub fn json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    println!("{}", json);
    Ok(())
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// Render a timestamp in local time.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}

/// Colored login state.
pub fn state(state: LoginState) -> String {
    match state {
        LoginState::LoggedIn => state.as_str().green().to_string(),
        LoginState::Error => state.as_str().red().to_string(),
        LoginState::LoggingIn | LoginState::Idle => state.as_str().yellow().to_string(),
    }
}

/// Session fields safe to print; the access token is never included.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub user_id: String,
    pub obtained_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id().to_string(),
            obtained_at: session.obtained_at(),
            expires_at: session.expires_at(),
            expired: session.is_expired(),
            user_name: session
                .metadata()
                .get("user_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

impl SessionSummary {
    /// Print the summary as labeled fields.
    pub fn print(&self) {
        field("User", &self.user_id);
        if let Some(name) = &self.user_name {
            field("Name", name);
        }
        field("Obtained", &timestamp(self.obtained_at));
        match self.expires_at {
            Some(at) => field("Expires", &timestamp(at)),
            None => field("Expires", "unknown"),
        }
        let validity = if self.expired {
            "expired".red().to_string()
        } else {
            "valid".green().to_string()
        };
        field("Token", &validity);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;
    use kiteauth_core::AccessToken;

    #[test]
    fn summary_never_carries_the_token() {
        let now = Utc::now();
        let session = Session::new("AB1234", AccessToken::new("secret-token"), now)
            .with_expiry(Some(now + Duration::hours(1)))
            .with_metadata(json!({"user_name": "Test User"}));

        let summary = SessionSummary::from(&session);
        assert!(!summary.expired);
        assert_eq!(summary.user_name.as_deref(), Some("Test User"));

        let rendered = serde_json::to_string(&summary).unwrap();
        assert!(rendered.contains(r#""userId":"AB1234""#));
        assert!(!rendered.contains("secret-token"));
    }
}
