//! HTTP client for the Kite login and API hosts.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, LOCATION};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use kiteauth_core::{Error, ProtocolError, RequestMethod, Result, TransportError};

use crate::endpoints::{Envelope, KITE_VERSION, KiteEndpoints};

/// Default request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const X_KITE_VERSION: &str = "X-Kite-Version";

/// Map a reqwest failure onto the transport taxonomy.
pub(crate) fn transport(err: reqwest::Error) -> Error {
    let message = err.to_string();
    let err = if err.is_timeout() {
        TransportError::Timeout { message }
    } else if err.is_connect() {
        TransportError::Connection { message }
    } else if err.is_decode() {
        TransportError::Decode { message }
    } else {
        TransportError::Http { message }
    };
    Error::Transport(err)
}

fn decode(message: impl Into<String>) -> Error {
    Error::Transport(TransportError::Decode {
        message: message.into(),
    })
}

/// Error body fields; everything else in the envelope is ignored.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error_type: Option<String>,
}

/// A response that was not followed: either a redirect or a final answer.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub location: Option<String>,
}

/// Thin wrapper over a cookie-keeping reqwest client.
///
/// Redirects are never followed automatically; the authorize step needs to
/// see each `Location` header itself.
#[derive(Debug, Clone)]
pub struct KiteClient {
    client: reqwest::Client,
    endpoints: KiteEndpoints,
}

impl KiteClient {
    /// Create a client for the given endpoints.
    pub fn new(endpoints: KiteEndpoints) -> Result<Self> {
        Self::with_timeout(endpoints, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(endpoints: KiteEndpoints, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kiteauth/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(transport)?;

        Ok(Self { client, endpoints })
    }

    /// Returns the configured endpoints.
    pub fn endpoints(&self) -> &KiteEndpoints {
        &self.endpoints
    }

    /// POST a form and unwrap `data` from the success envelope.
    #[instrument(skip(self, form))]
    pub(crate) async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<Envelope<T>> {
        debug!("POST form");
        let response = self
            .client
            .post(url)
            .header(X_KITE_VERSION, KITE_VERSION)
            .form(form)
            .send()
            .await
            .map_err(transport)?;

        read_envelope(response).await
    }

    /// GET without following redirects.
    #[instrument(skip(self))]
    pub(crate) async fn get_raw(&self, url: &str) -> Result<RawResponse> {
        let response = self
            .client
            .get(url)
            .header(X_KITE_VERSION, KITE_VERSION)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        trace!(%status, ?location, "raw response");

        if status.is_success() || status.is_redirection() {
            Ok(RawResponse { status, location })
        } else {
            Err(Error::Protocol(parse_error_response(response).await))
        }
    }

    /// Send an authenticated request to the API host.
    ///
    /// `data` must be a JSON object when present. It is sent as query
    /// parameters for GET and DELETE and as a form body otherwise.
    #[instrument(skip(self, auth, data))]
    pub(crate) async fn send_authed(
        &self,
        method: RequestMethod,
        endpoint: &str,
        auth: &str,
        data: Option<&Value>,
    ) -> Result<Value> {
        let url = self.endpoints.api_url(endpoint);
        let params = data.map(form_pairs).transpose()?.unwrap_or_default();
        debug!(%method, %url, "Authenticated request");

        let mut builder = self
            .client
            .request(http_method(method), &url)
            .headers(auth_headers(auth)?);
        if !params.is_empty() {
            builder = match method {
                RequestMethod::Get | RequestMethod::Delete => builder.query(&params),
                RequestMethod::Post | RequestMethod::Put => builder.form(&params),
            };
        }

        let response = builder.send().await.map_err(transport)?;
        read_payload(response).await
    }
}

fn http_method(method: RequestMethod) -> Method {
    match method {
        RequestMethod::Get => Method::GET,
        RequestMethod::Post => Method::POST,
        RequestMethod::Put => Method::PUT,
        RequestMethod::Delete => Method::DELETE,
    }
}

/// Build the `Authorization: token api_key:access_token` header set.
fn auth_headers(auth: &str) -> Result<HeaderMap> {
    let mut value = HeaderValue::from_str(&format!("token {}", auth)).map_err(|_| {
        Error::Transport(TransportError::Http {
            message: "authorization header contains invalid characters".to_string(),
        })
    })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    headers.insert(X_KITE_VERSION, HeaderValue::from_static(KITE_VERSION));
    Ok(headers)
}

/// Flatten a JSON object into string pairs for a query or form body.
fn form_pairs(data: &Value) -> Result<Vec<(String, String)>> {
    let object = data
        .as_object()
        .ok_or_else(|| Error::invalid_request("request data must be a JSON object"))?;

    Ok(object
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        })
        .collect())
}

/// Decode a success envelope or turn an error response into a
/// [`ProtocolError`].
pub(crate) async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Envelope<T>> {
    let status = response.status();
    trace!(%status, "Kite response");

    if !status.is_success() {
        return Err(Error::Protocol(parse_error_response(response).await));
    }

    let body = response.bytes().await.map_err(transport)?;
    let envelope: Envelope<T> =
        serde_json::from_slice(&body).map_err(|e| decode(format!("invalid response body: {}", e)))?;

    if envelope.status.as_deref() == Some("error") {
        return Err(Error::Protocol(ProtocolError::new(
            status.as_u16(),
            envelope.error_type,
            envelope.message,
        )));
    }

    Ok(envelope)
}

/// Like [`read_envelope`], but for arbitrary payloads: returns `data` when
/// the body is a Kite envelope and the whole body otherwise.
async fn read_payload(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    trace!(%status, "Kite response");

    if !status.is_success() {
        return Err(Error::Protocol(parse_error_response(response).await));
    }

    let body = response.bytes().await.map_err(transport)?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    let value: Value =
        serde_json::from_slice(&body).map_err(|e| decode(format!("invalid response body: {}", e)))?;

    unwrap_payload(status, value)
}

fn unwrap_payload(status: StatusCode, mut value: Value) -> Result<Value> {
    let Some(object) = value.as_object_mut() else {
        return Ok(value);
    };

    match object.get("status").and_then(Value::as_str) {
        Some("error") => {
            let body: ErrorBody = serde_json::from_value(value).unwrap_or_default();
            Err(Error::Protocol(ProtocolError::new(
                status.as_u16(),
                body.error_type,
                body.message,
            )))
        }
        Some(_) => Ok(object.remove("data").unwrap_or(Value::Null)),
        None => Ok(value),
    }
}

/// Parse a Kite error body, tolerating non-JSON responses.
pub(crate) async fn parse_error_response(response: reqwest::Response) -> ProtocolError {
    let status = response.status().as_u16();

    match response.json::<ErrorBody>().await {
        Ok(body) => ProtocolError::new(status, body.error_type, body.message),
        Err(_) => ProtocolError::new(status, None, None),
    }
}
