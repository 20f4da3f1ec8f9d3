//! Scripted in-memory transport
//!
//! Replays canned responses in order and records every request it was given,
//! so pipeline runs can be exercised without a network. Packed bodies are
//! encrypted with the session cipher at send time, the way the server would.
//!
//! ## Usage in Tests
//! ```ignore
//! let transport = ScriptedTransport::new(cipher)
//!     .then(ScriptedResponse::empty().with_cookie("a=1"))
//!     .then(ScriptedResponse::packed(&body));
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, SET_COOKIE};
use reqwest::StatusCode;
use rmpv::Value;

use crate::codec;
use crate::config::defaults::BINARY_CONTENT_TYPE;
use crate::crypto::Cipher;
use crate::error::{ClientError, Result};

use super::request::WireRequest;
use super::response::RawResponse;
use super::transport::Transport;

#[derive(Debug, Clone)]
enum ScriptedBody {
    Empty,
    Packed(Value),
    Json(serde_json::Value),
    Raw(Vec<u8>),
    Fail(String),
}

/// One canned answer
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    status: u16,
    headers: Vec<(HeaderName, String)>,
    body: ScriptedBody,
}

impl ScriptedResponse {
    fn new(body: ScriptedBody) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    /// 200 with an empty binary body
    #[must_use]
    pub fn empty() -> Self {
        Self::new(ScriptedBody::Empty)
    }

    /// 200 with an encrypted MessagePack body
    #[must_use]
    pub fn packed(value: &Value) -> Self {
        Self::new(ScriptedBody::Packed(value.clone()))
    }

    /// 200 with a plain JSON body
    #[must_use]
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(ScriptedBody::Json(value.clone()))
    }

    /// 200 with these exact bytes as a binary body
    #[must_use]
    pub fn raw(bytes: Vec<u8>) -> Self {
        Self::new(ScriptedBody::Raw(bytes))
    }

    /// A network failure instead of a response
    #[must_use]
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::new(ScriptedBody::Fail(reason.into()))
    }

    /// Override the status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a `Set-Cookie` header
    #[must_use]
    pub fn with_cookie(self, set_cookie: &str) -> Self {
        self.with_header(SET_COOKIE, set_cookie)
    }

    /// Add an arbitrary header
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    fn into_raw(self, cipher: &Cipher, url: &str) -> Result<RawResponse> {
        let mut headers = HeaderMap::new();
        let (content_type, body) = match self.body {
            ScriptedBody::Fail(reason) => {
                return Err(ClientError::Transport {
                    url: url.to_string(),
                    reason,
                })
            }
            ScriptedBody::Empty => (BINARY_CONTENT_TYPE, Vec::new()),
            ScriptedBody::Raw(bytes) => (BINARY_CONTENT_TYPE, bytes),
            ScriptedBody::Packed(value) => {
                (BINARY_CONTENT_TYPE, cipher.encrypt(&codec::encode(&value)?)?)
            }
            ScriptedBody::Json(value) => (
                "application/json; charset=utf-8",
                value.to_string().into_bytes(),
            ),
        };

        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        for (name, value) in self.headers {
            let value = HeaderValue::from_str(&value).map_err(|e| ClientError::InvalidHeader {
                name: "scripted",
                reason: e.to_string(),
            })?;
            let _ = headers.append(name, value);
        }

        let status = StatusCode::from_u16(self.status).map_err(|e| ClientError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Transport that replays a fixed script
#[derive(Debug)]
pub struct ScriptedTransport {
    cipher: Cipher,
    script: Mutex<VecDeque<ScriptedResponse>>,
    sent: Mutex<Vec<WireRequest>>,
}

impl ScriptedTransport {
    /// Empty script; every send fails until responses are queued
    #[must_use]
    pub fn new(cipher: Cipher) -> Self {
        Self {
            cipher,
            script: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Queue the next response
    #[must_use]
    pub fn then(self, response: ScriptedResponse) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
        self
    }

    /// Requests received so far, in order
    #[must_use]
    pub fn sent(&self) -> Vec<WireRequest> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Responses not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: WireRequest) -> Result<RawResponse> {
        let url = request.url.clone();
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match next {
            Some(response) => response.into_raw(&self.cipher, &url),
            None => Err(ClientError::Transport {
                url,
                reason: "script exhausted".to_string(),
            }),
        }
    }
}
