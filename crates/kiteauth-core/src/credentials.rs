//! Login credentials type.

use std::fmt;

use url::Url;

use crate::error::CredentialError;
use crate::otp::Totp;

/// Redirect URI used when none is configured.
pub const DEFAULT_REDIRECT_URI: &str = "https://127.0.0.1";

/// Long-lived credentials for a Kite Connect app and its user.
///
/// Credentials are validated once at construction and never mutated. The
/// TOTP seed is parsed eagerly, so a malformed seed fails here rather than
/// in the middle of a login.
///
/// # Security
///
/// The API secret, password and TOTP seed are never exposed in Debug output.
///
/// # Example
///
/// ```
/// use kiteauth_core::Credentials;
///
/// let creds = Credentials::new(
///     "kite-api-key",
///     "kite-api-secret",
///     "AB1234",
///     "hunter2",
///     "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ",
/// ).unwrap();
/// assert_eq!(creds.user_id(), "AB1234");
/// assert_eq!(creds.redirect_uri().as_str(), "https://127.0.0.1/");
/// ```
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
    user_id: String,
    password: String,
    totp: Totp,
    redirect_uri: Url,
}

impl Credentials {
    /// Create and validate credentials using the default redirect URI.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if a field is empty or the TOTP seed is
    /// not valid base32.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        user_id: impl Into<String>,
        password: impl Into<String>,
        totp_secret: &str,
    ) -> Result<Self, CredentialError> {
        let api_key = identifier("api_key", api_key.into())?;
        let api_secret = required("api_secret", api_secret.into())?;
        let user_id = identifier("user_id", user_id.into())?;
        let password = required("password", password.into())?;
        let totp = Totp::new(totp_secret)?;
        let redirect_uri = parse_redirect_uri(DEFAULT_REDIRECT_URI)?;

        Ok(Self {
            api_key,
            api_secret,
            user_id,
            password,
            totp,
            redirect_uri,
        })
    }

    /// Replace the redirect URI registered for the Kite Connect app.
    pub fn with_redirect_uri(mut self, redirect_uri: &str) -> Result<Self, CredentialError> {
        self.redirect_uri = parse_redirect_uri(redirect_uri)?;
        Ok(self)
    }

    /// Load credentials from `API_KEY`, `API_SECRET`, `USER_ID`, `PASSWORD`,
    /// `TOTP_SECRET` and the optional `REDIRECT_URI`.
    pub fn from_env() -> Result<Self, CredentialError> {
        Self::from_env_prefixed("")
    }

    /// Load credentials from environment variables with a common prefix,
    /// e.g. `KITE_` reads `KITE_API_KEY`.
    pub fn from_env_prefixed(prefix: &str) -> Result<Self, CredentialError> {
        Self::from_lookup(|name| std::env::var(format!("{}{}", prefix, name)).ok())
    }

    /// Load credentials through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).unwrap_or_default();

        let creds = Self::new(
            get("API_KEY"),
            get("API_SECRET"),
            get("USER_ID"),
            get("PASSWORD"),
            &get("TOTP_SECRET"),
        )?;

        match lookup("REDIRECT_URI").filter(|uri| !uri.trim().is_empty()) {
            Some(uri) => creds.with_redirect_uri(&uri),
            None => Ok(creds),
        }
    }

    /// Returns the Kite Connect API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the Kite Connect API secret.
    ///
    /// # Security
    ///
    /// Use this only when computing the token exchange checksum.
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// Returns the broker user id (client code).
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the account password.
    ///
    /// # Security
    ///
    /// Use this only when constructing the login request.
    /// Never log or display this value.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the TOTP generator for the second factor.
    pub fn totp(&self) -> &Totp {
        &self.totp
    }

    /// Returns the redirect URI registered for the app.
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }
}

// Intentionally hide secrets in Debug output
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("password", &"[REDACTED]")
            .field("totp", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri.as_str())
            .finish()
    }
}

/// Secrets are kept byte for byte; surrounding spaces may be significant.
fn required(field: &'static str, value: String) -> Result<String, CredentialError> {
    if value.trim().is_empty() {
        Err(CredentialError::Missing { field })
    } else {
        Ok(value)
    }
}

fn identifier(field: &'static str, value: String) -> Result<String, CredentialError> {
    required(field, value).map(|v| v.trim().to_string())
}

fn parse_redirect_uri(value: &str) -> Result<Url, CredentialError> {
    let url = Url::parse(value.trim()).map_err(|e| CredentialError::Invalid {
        field: "redirect_uri",
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(CredentialError::Invalid {
            field: "redirect_uri",
            reason: format!("unsupported scheme '{}'", scheme),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SEED: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            ("API_KEY", "key"),
            ("API_SECRET", "secret"),
            ("USER_ID", "AB1234"),
            ("PASSWORD", "pw"),
            ("TOTP_SECRET", SEED),
        ])
    }

    #[test]
    fn credentials_hide_secrets_in_debug() {
        let creds = Credentials::new("key", "topsecret", "AB1234", "hunter2", SEED).unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("AB1234"));
        assert!(debug.contains("key"));
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains(SEED));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn lookup_uses_default_redirect() {
        let vars = full_env();
        let creds = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(creds.api_key(), "key");
        assert_eq!(creds.redirect_uri().as_str(), "https://127.0.0.1/");
    }

    #[test]
    fn lookup_reads_redirect_override() {
        let mut vars = full_env();
        vars.insert("REDIRECT_URI".into(), "http://localhost:5000/callback".into());
        let creds = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(creds.redirect_uri().as_str(), "http://localhost:5000/callback");
    }

    #[test]
    fn missing_field_fails_fast() {
        let mut vars = full_env();
        vars.remove("PASSWORD");
        let err = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert_eq!(err, CredentialError::Missing { field: "password" });
    }

    #[test]
    fn blank_field_counts_as_missing() {
        let err = Credentials::new("key", "   ", "AB1234", "pw", SEED).unwrap_err();
        assert_eq!(err, CredentialError::Missing { field: "api_secret" });
    }

    #[test]
    fn secrets_are_stored_verbatim() {
        let creds = Credentials::new(" key ", " secret ", "AB1234\n", "  pass word ", SEED).unwrap();
        assert_eq!(creds.password(), "  pass word ");
        assert_eq!(creds.api_secret(), " secret ");
        assert_eq!(creds.api_key(), "key");
        assert_eq!(creds.user_id(), "AB1234");
    }

    #[test]
    fn blank_password_counts_as_missing() {
        let err = Credentials::new("key", "secret", "AB1234", " \t ", SEED).unwrap_err();
        assert_eq!(err, CredentialError::Missing { field: "password" });
    }

    #[test]
    fn bad_totp_seed_fails_fast() {
        let err = Credentials::new("key", "secret", "AB1234", "pw", "0000").unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Invalid { field: "totp_secret", .. }
        ));
    }

    #[test]
    fn redirect_must_be_http() {
        let creds = Credentials::new("key", "secret", "AB1234", "pw", SEED).unwrap();
        let err = creds.with_redirect_uri("ftp://example.com").unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Invalid { field: "redirect_uri", .. }
        ));
    }
}
