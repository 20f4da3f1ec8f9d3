//! Outgoing request framing
//!
//! Turns a logical call (method, URL, optional body) plus the current
//! [`SessionState`] into the exact bytes and headers put on the wire. Building
//! is pure: it reads the state and performs no I/O.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, USER_AGENT};
use reqwest::Method;
use rmpv::Value;
use uuid::Uuid;

use crate::codec;
use crate::config::defaults::BINARY_CONTENT_TYPE;
use crate::error::{ClientError, Result};
use crate::session::SessionState;

/// `X-Session-Token` header, sent once the server has issued a token
pub const SESSION_TOKEN: HeaderName = HeaderName::from_static("x-session-token");
/// `X-Request-Id` header, fresh per request
pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const X_AI: HeaderName = HeaderName::from_static("x-ai");
const X_GA: HeaderName = HeaderName::from_static("x-ga");
const X_MA: HeaderName = HeaderName::from_static("x-ma");
const X_IF: HeaderName = HeaderName::from_static("x-if");
const X_KC: HeaderName = HeaderName::from_static("x-kc");
const X_DEVICE_MODEL: HeaderName = HeaderName::from_static("x-devicemodel");
const X_OPERATING_SYSTEM: HeaderName = HeaderName::from_static("x-operatingsystem");
const X_PLATFORM: HeaderName = HeaderName::from_static("x-platform");
const X_UNITY_VERSION: HeaderName = HeaderName::from_static("x-unity-version");
const X_APP_HASH: HeaderName = HeaderName::from_static("x-app-hash");
const X_APP_VERSION: HeaderName = HeaderName::from_static("x-app-version");
const X_ASSET_VERSION: HeaderName = HeaderName::from_static("x-asset-version");
const X_DATA_VERSION: HeaderName = HeaderName::from_static("x-data-version");
const X_INSTALL_ID: HeaderName = HeaderName::from_static("x-install-id");

/// A fully framed request, ready for a [`Transport`](super::Transport)
#[derive(Debug, Clone)]
pub struct WireRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// All headers, including identity and request id
    pub headers: HeaderMap,
    /// Encrypted MessagePack body, or empty
    pub body: Vec<u8>,
}

impl WireRequest {
    /// Request id header value, if set
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(REQUEST_ID).and_then(|v| v.to_str().ok())
    }

    /// Header value as text
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ClientError::InvalidHeader {
        name,
        reason: e.to_string(),
    })
}

/// Build the wire request for one call
///
/// A present body is always MessagePack-encoded and encrypted, even when it is
/// an empty map; an absent body leaves the payload empty and touches neither
/// the codec nor the cipher.
///
/// # Errors
///
/// Returns an error if the body cannot be encoded or encrypted, or if a state
/// field is not a valid header value.
pub fn build_request(
    state: &SessionState,
    method: Method,
    url: impl Into<String>,
    body: Option<&Value>,
) -> Result<WireRequest> {
    let url = url.into();

    let payload = match body {
        Some(value) => {
            let packed = codec::encode(value)?;
            state.cipher.encrypt(&packed)?
        }
        None => Vec::new(),
    };

    let mut headers = HeaderMap::new();
    let binary = HeaderValue::from_static(BINARY_CONTENT_TYPE);
    let empty = HeaderValue::from_static("");

    let _ = headers.insert(USER_AGENT, header_value("user-agent", &state.device.user_agent)?);
    let _ = headers.insert(ACCEPT, binary.clone());
    let _ = headers.insert(CONTENT_TYPE, binary);

    let _ = headers.insert(X_AI, empty.clone());
    let _ = headers.insert(X_GA, empty.clone());
    let _ = headers.insert(X_MA, empty.clone());
    let _ = headers.insert(X_IF, empty);
    let _ = headers.insert(X_KC, header_value("x-kc", &state.client_id)?);

    let _ = headers.insert(
        X_DEVICE_MODEL,
        header_value("x-devicemodel", &state.device.device_model)?,
    );
    let _ = headers.insert(
        X_OPERATING_SYSTEM,
        header_value("x-operatingsystem", &state.device.operating_system)?,
    );
    let _ = headers.insert(X_PLATFORM, header_value("x-platform", &state.device.platform)?);
    let _ = headers.insert(
        X_UNITY_VERSION,
        header_value("x-unity-version", &state.device.unity_version)?,
    );

    let _ = headers.insert(X_APP_HASH, header_value("x-app-hash", &state.versions.app_hash)?);
    let _ = headers.insert(
        X_APP_VERSION,
        header_value("x-app-version", &state.versions.app_version)?,
    );
    let _ = headers.insert(
        X_ASSET_VERSION,
        header_value("x-asset-version", &state.versions.asset_version)?,
    );
    let _ = headers.insert(
        X_DATA_VERSION,
        header_value("x-data-version", &state.versions.data_version)?,
    );

    let _ = headers.insert(X_INSTALL_ID, header_value("x-install-id", &state.install_id)?);
    let _ = headers.insert(
        REQUEST_ID,
        header_value("x-request-id", &Uuid::new_v4().to_string())?,
    );

    if state.has_session_token() {
        let _ = headers.insert(
            SESSION_TOKEN,
            header_value("x-session-token", &state.session_token)?,
        );
    }

    if let Some(cookies) = state.cookies.to_header_value() {
        let _ = headers.insert(COOKIE, header_value("cookie", &cookies)?);
    }

    tracing::debug!(%method, %url, body_len = payload.len(), "built request");

    Ok(WireRequest {
        method,
        url,
        headers,
        body: payload,
    })
}
