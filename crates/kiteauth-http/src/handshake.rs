//! The Kite web login handshake as a chain of typed steps.
//!
//! ```text
//! submit_password -> PendingTwoFactor --submit_totp--> Authorized
//!     --authorize--> RequestToken --exchange--> Session
//! ```
//!
//! Each step consumes the previous one, so steps cannot run out of order.
//! Broker rejections become [`LoginError`]s tagged with the failing step;
//! transport failures pass through unchanged.

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use kiteauth_core::{
    AccessToken, Credentials, Error, LoginError, LoginStep, RequestToken, Result, Session,
    checksum,
};

use crate::client::KiteClient;
use crate::endpoints::{CONNECT_LOGIN, LOGIN, LoginData, SESSION_TOKEN, TWOFA};

/// Redirect hops followed before the authorize step gives up.
pub const MAX_REDIRECTS: usize = 10;

/// Offset of Indian Standard Time from UTC, in seconds.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 1800;

/// Hour (IST) at which Kite invalidates every access token.
const TOKEN_RESET_HOUR: u32 = 6;

/// Fields of the token exchange response never written to session metadata.
const SECRET_FIELDS: &[&str] = &["access_token", "refresh_token", "enctoken"];

/// Tag broker rejections with the step that produced them.
fn at(step: LoginStep) -> impl FnOnce(Error) -> Error {
    move |err| match err {
        Error::Protocol(p) => {
            let reason = p.message.clone().unwrap_or_else(|| p.to_string());
            LoginError::new(step, reason).into()
        }
        other => other,
    }
}

fn fail(step: LoginStep, reason: impl Into<String>) -> Error {
    LoginError::new(step, reason).into()
}

/// Password accepted; the broker is waiting for the second factor.
#[derive(Debug)]
pub struct PendingTwoFactor {
    request_id: String,
    twofa_type: String,
}

impl PendingTwoFactor {
    /// Returns the intermediate login token.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the second factor the broker asked for.
    pub fn twofa_type(&self) -> &str {
        &self.twofa_type
    }
}

/// Both factors accepted; the client holds the broker's session cookies.
#[derive(Debug)]
pub struct Authorized {
    _private: (),
}

/// Submit user id and password.
#[instrument(skip_all, fields(user_id = %credentials.user_id()))]
pub async fn submit_password(
    client: &KiteClient,
    credentials: &Credentials,
) -> Result<PendingTwoFactor> {
    let url = client.endpoints().login_url(LOGIN);
    let envelope = client
        .post_form::<LoginData>(
            &url,
            &[
                ("user_id", credentials.user_id()),
                ("password", credentials.password()),
            ],
        )
        .await
        .map_err(at(LoginStep::Password))?;

    let data = envelope
        .data
        .ok_or_else(|| fail(LoginStep::Password, "response missing request_id"))?;

    let twofa_type = data.twofa_type.unwrap_or_else(|| "totp".to_string());
    debug!(%twofa_type, "Password accepted");

    Ok(PendingTwoFactor {
        request_id: data.request_id,
        twofa_type,
    })
}

impl PendingTwoFactor {
    /// Submit the current TOTP code.
    #[instrument(skip_all, fields(user_id = %credentials.user_id()))]
    pub async fn submit_totp(
        self,
        client: &KiteClient,
        credentials: &Credentials,
    ) -> Result<Authorized> {
        if self.twofa_type != "totp" {
            warn!(twofa_type = %self.twofa_type, "Broker asked for a non-TOTP factor; sending TOTP anyway");
        }

        let code = credentials.totp().generate_now();
        let url = client.endpoints().login_url(TWOFA);
        client
            .post_form::<Value>(
                &url,
                &[
                    ("user_id", credentials.user_id()),
                    ("request_id", self.request_id.as_str()),
                    ("twofa_value", code.as_str()),
                    ("twofa_type", "totp"),
                    ("skip_totp", "true"),
                ],
            )
            .await
            .map_err(at(LoginStep::TwoFactor))?;

        debug!("Second factor accepted");
        Ok(Authorized { _private: () })
    }
}

impl Authorized {
    /// Start the Connect app login and follow redirects until one carries
    /// the request token.
    #[instrument(skip_all)]
    pub async fn authorize(
        self,
        client: &KiteClient,
        credentials: &Credentials,
    ) -> Result<RequestToken> {
        let start = client.endpoints().login_url(CONNECT_LOGIN);
        let mut url = Url::parse_with_params(&start, &[("api_key", credentials.api_key()), ("v", "3")])
            .map_err(|e| fail(LoginStep::Authorize, format!("invalid login URL: {}", e)))?;

        for hop in 0..MAX_REDIRECTS {
            let response = client
                .get_raw(url.as_str())
                .await
                .map_err(at(LoginStep::Authorize))?;

            let location = response.location.ok_or_else(|| {
                fail(
                    LoginStep::Authorize,
                    format!("HTTP {} without a redirect carrying request_token", response.status),
                )
            })?;

            let next = url.join(&location).map_err(|e| {
                fail(LoginStep::Authorize, format!("invalid redirect location: {}", e))
            })?;
            debug!(hop, path = next.path(), "Following redirect");

            if let Some(token) = request_token(&next) {
                if next.origin() != credentials.redirect_uri().origin() {
                    warn!(
                        redirect = %next.origin().ascii_serialization(),
                        "Request token delivered to an unexpected origin"
                    );
                }
                return Ok(token);
            }

            if next.origin() == credentials.redirect_uri().origin() {
                let reason = query_value(&next, "message")
                    .unwrap_or_else(|| "redirected without request_token".to_string());
                return Err(fail(LoginStep::Authorize, reason));
            }

            url = next;
        }

        Err(fail(
            LoginStep::Authorize,
            format!("no request_token after {} redirects", MAX_REDIRECTS),
        ))
    }
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn request_token(url: &Url) -> Option<RequestToken> {
    query_value(url, "request_token")
        .filter(|t| !t.is_empty())
        .map(RequestToken::new)
}

/// Exchange the request token for an access token.
#[instrument(skip_all, fields(user_id = %credentials.user_id()))]
pub async fn exchange(
    client: &KiteClient,
    credentials: &Credentials,
    request_token: RequestToken,
) -> Result<Session> {
    let checksum = checksum(
        credentials.api_key(),
        request_token.as_str(),
        credentials.api_secret(),
    );

    let url = client.endpoints().api_url(SESSION_TOKEN);
    let envelope = client
        .post_form::<Value>(
            &url,
            &[
                ("api_key", credentials.api_key()),
                ("request_token", request_token.as_str()),
                ("checksum", checksum.as_str()),
            ],
        )
        .await
        .map_err(at(LoginStep::TokenExchange))?;

    let mut data = envelope.data.unwrap_or(Value::Null);
    let access_token = data
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(AccessToken::new)
        .ok_or_else(|| fail(LoginStep::TokenExchange, "response missing access_token"))?;

    if let Some(object) = data.as_object_mut() {
        for field in SECRET_FIELDS {
            object.remove(*field);
        }
    }

    let obtained_at = Utc::now();
    let session = Session::new(credentials.user_id(), access_token, obtained_at)
        .with_expiry(kite_token_expiry(obtained_at))
        .with_metadata(data);

    info!(expires_at = ?session.expires_at(), "Access token obtained");
    Ok(session)
}

/// Run every step of the handshake.
pub async fn run(client: &KiteClient, credentials: &Credentials) -> Result<Session> {
    let pending = submit_password(client, credentials).await?;
    let authorized = pending.submit_totp(client, credentials).await?;
    let request_token = authorized.authorize(client, credentials).await?;
    exchange(client, credentials, request_token).await
}

/// Kite access tokens stop working at the next 06:00 IST after issue.
pub fn kite_token_expiry(obtained_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS)?;
    let local = obtained_at.with_timezone(&ist);
    let reset = NaiveTime::from_hms_opt(TOKEN_RESET_HOUR, 0, 0)?;

    let mut day = local.date_naive();
    if local.time() >= reset {
        day = day.succ_opt()?;
    }

    let expiry = ist.from_local_datetime(&day.and_time(reset)).single()?;
    Some(expiry.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn expiry_after_reset_is_next_morning() {
        // 10:00 IST on the 10th
        let expiry = kite_token_expiry(utc(2024, 1, 10, 4, 30)).unwrap();
        assert_eq!(expiry, utc(2024, 1, 11, 0, 30));
    }

    #[test]
    fn expiry_before_reset_is_same_morning() {
        // 05:00 IST on the 10th
        let expiry = kite_token_expiry(utc(2024, 1, 9, 23, 30)).unwrap();
        assert_eq!(expiry, utc(2024, 1, 10, 0, 30));
    }

    #[test]
    fn expiry_exactly_at_reset_rolls_over() {
        let expiry = kite_token_expiry(utc(2024, 1, 10, 0, 30)).unwrap();
        assert_eq!(expiry, utc(2024, 1, 11, 0, 30));
    }

    #[test]
    fn request_token_from_redirect() {
        let url = Url::parse("https://127.0.0.1/?action=login&type=login&status=success&request_token=rt123").unwrap();
        assert_eq!(request_token(&url).unwrap().as_str(), "rt123");

        let empty = Url::parse("https://127.0.0.1/?request_token=").unwrap();
        assert!(request_token(&empty).is_none());
    }

    #[test]
    fn protocol_errors_are_tagged_with_step() {
        let err = at(LoginStep::TwoFactor)(Error::Protocol(kiteauth_core::ProtocolError::new(
            400,
            Some("TwoFAException".into()),
            Some("Invalid TOTP".into()),
        )));
        match err {
            Error::Login(login) => {
                assert_eq!(login.step, LoginStep::TwoFactor);
                assert_eq!(login.reason, "Invalid TOTP");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
