//! Request execution
//!
//! Sends a built request, merges the response cookies into the caller's jar
//! and decodes the body according to its declared content kind.

use crate::codec;
use crate::crypto::Cipher;
use crate::error::{ClientError, CodecError, Result};
use crate::session::CookieJar;

use super::request::WireRequest;
use super::response::{Body, ContentKind, RawResponse, Response};
use super::transport::Transport;

/// Perform one exchange and decode its body
///
/// Cookies are merged into `jar` before the body is looked at, so the jar is
/// updated even when decoding fails afterwards. A non-2xx status is returned
/// as a normal [`Response`].
///
/// # Errors
///
/// Returns a transport error if the exchange fails, or a crypto/codec error if
/// the body cannot be decrypted or decoded.
pub async fn execute<T>(
    transport: &T,
    cipher: &Cipher,
    jar: &mut CookieJar,
    request: WireRequest,
) -> Result<Response>
where
    T: Transport + ?Sized,
{
    let method = request.method.clone();
    let url = request.url.clone();

    let raw = transport.send(request).await?;

    let merged = jar.merge_set_cookies(raw.set_cookies());
    let kind = raw.content_kind();
    tracing::debug!(
        %method,
        %url,
        status = raw.status.as_u16(),
        ?kind,
        body_len = raw.body.len(),
        cookies_merged = merged,
        "received response"
    );

    let RawResponse {
        status,
        headers,
        body,
    } = raw;

    let body = decode_body(cipher, kind, &body)?;

    Ok(Response {
        status,
        headers,
        body,
    })
}

/// Decode a response body of the given kind
///
/// An empty body is absent for either kind, and an empty encrypted body never
/// reaches the cipher.
///
/// # Errors
///
/// Returns a crypto or codec error for undecodable bodies.
pub fn decode_body(cipher: &Cipher, kind: ContentKind, body: &[u8]) -> Result<Option<Body>> {
    if body.is_empty() {
        return Ok(None);
    }

    match kind {
        ContentKind::Json => serde_json::from_slice(body)
            .map(|value| Some(Body::Json(value)))
            .map_err(|e| ClientError::from(CodecError::Json(e.to_string()))),
        ContentKind::Encrypted => {
            let plaintext = cipher.decrypt(body)?;
            Ok(Some(Body::Packed(codec::decode(&plaintext)?)))
        }
    }
}
