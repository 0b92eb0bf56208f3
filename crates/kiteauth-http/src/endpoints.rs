//! Kite Connect endpoint definitions and request/response types.

use serde::Deserialize;
use url::Url;

// ============================================================================
// Base URLs
// ============================================================================

/// Host serving the web login flow.
pub const DEFAULT_LOGIN_URL: &str = "https://kite.zerodha.com";

/// Host serving the Kite Connect REST API.
pub const DEFAULT_API_URL: &str = "https://api.kite.trade";

/// Value of the `X-Kite-Version` header.
pub const KITE_VERSION: &str = "3";

// ============================================================================
// Endpoint Paths
// ============================================================================

/// Password login (login host).
pub const LOGIN: &str = "/api/login";

/// Second factor submission (login host).
pub const TWOFA: &str = "/api/twofa";

/// App authorization entry point that redirects with a request token (login host).
pub const CONNECT_LOGIN: &str = "/connect/login";

/// Token exchange and logout (API host).
pub const SESSION_TOKEN: &str = "/session/token";

/// Lightweight authenticated call used to validate a restored session (API host).
pub const USER_PROFILE: &str = "/user/profile";

/// Base URLs for the two Kite hosts.
///
/// Both can be pointed at a sandbox or a mock server; paths are appended to
/// whatever base is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KiteEndpoints {
    login: Url,
    api: Url,
}

impl KiteEndpoints {
    /// Create endpoints from explicit base URLs.
    pub fn new(login: Url, api: Url) -> Self {
        Self { login, api }
    }

    /// Serve both hosts from one base URL (useful for mock servers).
    pub fn single(base: Url) -> Self {
        Self {
            login: base.clone(),
            api: base,
        }
    }

    /// Returns the login host base URL.
    pub fn login_base(&self) -> &Url {
        &self.login
    }

    /// Returns the API host base URL.
    pub fn api_base(&self) -> &Url {
        &self.api
    }

    /// Full URL for a path on the login host.
    pub fn login_url(&self, path: &str) -> String {
        join(&self.login, path)
    }

    /// Full URL for a path on the API host.
    pub fn api_url(&self, path: &str) -> String {
        join(&self.api, path)
    }
}

impl Default for KiteEndpoints {
    fn default() -> Self {
        Self {
            login: Url::parse(DEFAULT_LOGIN_URL).expect("valid default login URL"),
            api: Url::parse(DEFAULT_API_URL).expect("valid default API URL"),
        }
    }
}

fn join(base: &Url, path: &str) -> String {
    // Url always renders a root path as a trailing slash
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Standard Kite response envelope. Missing fields deserialize as `None`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub status: Option<String>,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error_type: Option<String>,
}

/// `data` of a successful password login.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub request_id: String,
    #[serde(default)]
    pub twofa_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_kite() {
        let endpoints = KiteEndpoints::default();
        assert_eq!(endpoints.login_url(LOGIN), "https://kite.zerodha.com/api/login");
        assert_eq!(
            endpoints.api_url(SESSION_TOKEN),
            "https://api.kite.trade/session/token"
        );
    }

    #[test]
    fn join_handles_slashes() {
        let endpoints = KiteEndpoints::single(Url::parse("http://127.0.0.1:8080/").unwrap());
        assert_eq!(endpoints.api_url("/orders"), "http://127.0.0.1:8080/orders");
        assert_eq!(endpoints.api_url("orders"), "http://127.0.0.1:8080/orders");

        let prefixed = KiteEndpoints::single(Url::parse("http://localhost/kite/").unwrap());
        assert_eq!(prefixed.api_url("/user/profile"), "http://localhost/kite/user/profile");
    }

    #[test]
    fn envelope_tolerates_missing_fields() {
        let env: Envelope<LoginData> =
            serde_json::from_str(r#"{"status":"error","message":"Invalid password","error_type":"InputException"}"#)
                .unwrap();
        assert!(env.data.is_none());
        assert_eq!(env.error_type.as_deref(), Some("InputException"));
    }
}
