//! Time-based one-time passwords and the token exchange checksum.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use data_encoding::{BASE32_NOPAD, HEXLOWER};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::CredentialError;

type HmacSha1 = Hmac<Sha1>;

/// Length of one TOTP window in seconds.
pub const TOTP_STEP_SECS: u64 = 30;

/// Number of digits in a generated code.
pub const TOTP_DIGITS: u32 = 6;

/// RFC 6238 code generator (HMAC-SHA1, 30 second step, 6 digits).
///
/// The shared secret is the base32 seed shown when the authenticator app is
/// enrolled. Spaces, lowercase letters and trailing `=` padding are accepted.
///
/// # Example
///
/// ```
/// use kiteauth_core::Totp;
///
/// let totp = Totp::new("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ").unwrap();
/// assert_eq!(totp.generate_at(59), "287082");
/// ```
#[derive(Clone)]
pub struct Totp {
    mac: HmacSha1,
}

impl Totp {
    /// Parse a base32 seed into a generator.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the seed is empty or not valid base32.
    pub fn new(secret: &str) -> Result<Self, CredentialError> {
        let normalized: String = secret
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .trim_end_matches('=')
            .to_ascii_uppercase();

        if normalized.is_empty() {
            return Err(CredentialError::Missing {
                field: "totp_secret",
            });
        }

        let key = BASE32_NOPAD
            .decode(normalized.as_bytes())
            .map_err(|e| CredentialError::Invalid {
                field: "totp_secret",
                reason: format!("not valid base32: {}", e),
            })?;

        let mac = HmacSha1::new_from_slice(&key).map_err(|e| CredentialError::Invalid {
            field: "totp_secret",
            reason: e.to_string(),
        })?;

        Ok(Self { mac })
    }

    /// Generate the code for the window containing `unix_secs`.
    pub fn generate_at(&self, unix_secs: u64) -> String {
        let counter = unix_secs / TOTP_STEP_SECS;

        let mut mac = self.mac.clone();
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        // Dynamic truncation (RFC 4226 section 5.3)
        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = u32::from_be_bytes([
            digest[offset] & 0x7f,
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);

        let code = binary % 10u32.pow(TOTP_DIGITS);
        format!("{:0width$}", code, width = TOTP_DIGITS as usize)
    }

    /// Generate the code for the current time.
    pub fn generate_now(&self) -> String {
        self.generate_at(unix_now())
    }

    /// Seconds until the current code rolls over.
    pub fn seconds_remaining(&self) -> u64 {
        TOTP_STEP_SECS - unix_now() % TOTP_STEP_SECS
    }
}

impl fmt::Debug for Totp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Totp").field(&"[REDACTED]").finish()
    }
}

/// Checksum required by the token exchange:
/// lowercase hex SHA-256 of `api_key + request_token + api_secret`.
pub fn checksum(api_key: &str, request_token: &str, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.update(request_token.as_bytes());
    hasher.update(api_secret.as_bytes());
    HEXLOWER.encode(&hasher.finalize())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
