//! Response types
//!
//! A [`RawResponse`] is what a transport hands back; a [`Response`] is the
//! same exchange after its body has been decrypted and decoded.

use std::fmt;

use reqwest::header::{HeaderMap, CONTENT_TYPE, SET_COOKIE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::config::defaults::JSON_CONTENT_TYPE;
use crate::error::{ClientError, Result};

use super::request::SESSION_TOKEN;

/// Undecoded response as received from the wire
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Body bytes
    pub body: Vec<u8>,
}

impl RawResponse {
    /// All `Set-Cookie` header values that are valid text
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
    }

    /// How the body is encoded
    #[must_use]
    pub fn content_kind(&self) -> ContentKind {
        ContentKind::from_headers(&self.headers)
    }
}

/// Declared body encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Plain JSON, no encryption
    Json,
    /// Encrypted MessagePack (anything that is not JSON)
    Encrypted,
}

impl ContentKind {
    /// Classify by `Content-Type`, ignoring parameters and case
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let is_json = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE));

        if is_json {
            Self::Json
        } else {
            Self::Encrypted
        }
    }
}

/// Decoded response body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Body {
    /// JSON body, passed through as-is
    Json(serde_json::Value),
    /// Decrypted MessagePack body
    Packed(rmpv::Value),
}

impl Body {
    /// Read a typed record out of the body
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DecodeValidation`] when the body does not have
    /// the fields `T` needs.
    pub fn decode<T: DeserializeOwned>(self, record: &'static str) -> Result<T> {
        match self {
            Self::Json(value) => serde_json::from_value(value).map_err(|e| e.to_string()),
            Self::Packed(value) => codec::from_value(value),
        }
        .map_err(|reason| ClientError::DecodeValidation { record, reason })
    }

    /// The body as JSON, whatever its wire format
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Packed(value) => codec::to_json(value),
        }
    }
}

/// Coarse meaning of a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    /// 2xx
    Ok,
    /// 403, typically a blocked request
    Forbidden,
    /// 426, client version is too old
    UpgradeRequired,
    /// 429
    TooManyRequests,
    /// 503, server maintenance
    Maintenance,
    /// Any other status
    Other,
}

impl ApiStatus {
    /// Classify an HTTP status
    #[must_use]
    pub fn classify(status: StatusCode) -> Self {
        match status {
            s if s.is_success() => Self::Ok,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::UPGRADE_REQUIRED => Self::UpgradeRequired,
            StatusCode::TOO_MANY_REQUESTS => Self::TooManyRequests,
            StatusCode::SERVICE_UNAVAILABLE => Self::Maintenance,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ok => "ok",
            Self::Forbidden => "forbidden",
            Self::UpgradeRequired => "upgrade required",
            Self::TooManyRequests => "too many requests",
            Self::Maintenance => "maintenance",
            Self::Other => "unexpected status",
        };
        f.write_str(text)
    }
}

/// One completed exchange with its body decoded
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Decoded body; `None` for an empty encrypted body
    pub body: Option<Body>,
}

impl Response {
    /// Status classification
    #[must_use]
    pub fn api_status(&self) -> ApiStatus {
        ApiStatus::classify(self.status)
    }

    /// Fail unless the status is 2xx
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ServerStatus`] for any non-success status.
    pub fn ensure_success(self) -> Result<Self> {
        match self.api_status() {
            ApiStatus::Ok => Ok(self),
            class => Err(ClientError::ServerStatus {
                status: self.status.as_u16(),
                class,
            }),
        }
    }

    /// Session token issued by the server on this response
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.headers
            .get(SESSION_TOKEN)
            .and_then(|value| value.to_str().ok())
            .filter(|token| !token.is_empty())
    }

    /// Decode the body into a typed record; an absent body is a validation error
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::DecodeValidation`] if the body is absent or has
    /// the wrong shape.
    pub fn decode_body<T: DeserializeOwned>(self, record: &'static str) -> Result<T> {
        self.body
            .ok_or(ClientError::DecodeValidation {
                record,
                reason: "response body is empty".to_string(),
            })?
            .decode(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde::Deserialize;

    fn headers_with_content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_content_kind() {
        assert_eq!(
            ContentKind::from_headers(&headers_with_content_type("application/json; charset=utf-8")),
            ContentKind::Json
        );
        assert_eq!(
            ContentKind::from_headers(&headers_with_content_type("Application/JSON")),
            ContentKind::Json
        );
        assert_eq!(
            ContentKind::from_headers(&headers_with_content_type("application/octet-stream")),
            ContentKind::Encrypted
        );
        assert_eq!(ContentKind::from_headers(&HeaderMap::new()), ContentKind::Encrypted);
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(ApiStatus::classify(StatusCode::OK), ApiStatus::Ok);
        assert_eq!(ApiStatus::classify(StatusCode::NO_CONTENT), ApiStatus::Ok);
        assert_eq!(
            ApiStatus::classify(StatusCode::UPGRADE_REQUIRED),
            ApiStatus::UpgradeRequired
        );
        assert_eq!(
            ApiStatus::classify(StatusCode::SERVICE_UNAVAILABLE),
            ApiStatus::Maintenance
        );
        assert_eq!(ApiStatus::classify(StatusCode::NOT_FOUND), ApiStatus::Other);
    }

    #[test]
    fn test_ensure_success() {
        let response = Response {
            status: StatusCode::TOO_MANY_REQUESTS,
            headers: HeaderMap::new(),
            body: None,
        };
        let err = response.ensure_success().unwrap_err();
        assert!(matches!(
            err,
            ClientError::ServerStatus {
                status: 429,
                class: ApiStatus::TooManyRequests
            }
        ));
    }

    #[test]
    fn test_json_body_decode() {
        #[derive(Deserialize)]
        struct Flag {
            ok: bool,
        }
        let body = Body::Json(serde_json::json!({"ok": true, "ignored": 1}));
        assert!(body.decode::<Flag>("flag").unwrap().ok);

        let err = Body::Json(serde_json::json!({"nope": 1}))
            .decode::<Flag>("flag")
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::DecodeValidation { record: "flag", .. }));
    }

    #[test]
    fn test_packed_body_with_integer_keys_renders_as_json() {
        let body = Body::Packed(rmpv::Value::Map(vec![(
            rmpv::Value::from(7),
            rmpv::Value::from("agreed"),
        )]));
        let json = serde_json::to_string_pretty(&body.to_json()).unwrap();
        assert!(json.contains("\"7\": \"agreed\""));
    }

    #[test]
    fn test_empty_body_is_validation_error() {
        let response = Response {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
        };
        let err = response.decode_body::<serde_json::Value>("anything").unwrap_err();
        assert!(matches!(err, ClientError::DecodeValidation { .. }));
    }
}
