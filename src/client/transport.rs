//! Wire transport
//!
//! The [`Transport`] trait is the only place bytes leave the process.
//! [`HttpTransport`] is the production implementation over a pooled
//! `reqwest` client; tests swap in the scripted transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::config::HttpConfig;
use crate::error::{ClientError, Result};

use super::request::WireRequest;
use super::response::RawResponse;

/// Sends one framed request and returns the undecoded response
///
/// Implementations must not retry and must not interpret the status: a non-2xx
/// answer is still `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one exchange
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] on connection, DNS or timeout failure.
    async fn send(&self, request: WireRequest) -> Result<RawResponse>;
}

/// Create the HTTP client used for all API calls
///
/// Features:
/// - Connection pooling with keep-alive, so consecutive calls share a connection
/// - Bounded connect and whole-request timeouts
/// - No cookie store: cookies are carried by the session jar
/// - No redirect following: a 3xx comes back as-is so its cookies reach the jar
///
/// # Errors
///
/// Returns an error if the client cannot be built (e.g., TLS backend failure).
pub fn create_http_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::none())
        .build()
        .map_err(|e| ClientError::InvalidConfig(format!("Failed to create HTTP client: {e}")))
}

/// Production transport over `reqwest`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport with a tuned client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: create_http_client(config)?,
        })
    }

    /// Wrap an existing client
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: WireRequest) -> Result<RawResponse> {
        let WireRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let transport_error = |e: reqwest::Error| ClientError::Transport {
            url: url.clone(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(transport_error)?;

        Ok(RawResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use reqwest::{Method, StatusCode};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn transport() -> HttpTransport {
        HttpTransport::new(&HttpConfig {
            timeout_secs: 5,
            connect_timeout_secs: 2,
        })
        .unwrap()
    }

    fn get(url: String) -> WireRequest {
        WireRequest {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Serve one canned HTTP/1.1 response per accepted connection
    async fn serve(responses: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        // Bind then release a port so nothing is listening on it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let err = transport()
            .send(get(format!("http://127.0.0.1:{port}/api/system")))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Transport { ref url, .. } if url.ends_with("/api/system")));
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn test_redirect_is_returned_with_its_cookies() {
        let base = serve(vec![
            "HTTP/1.1 302 Found\r\nLocation: /b\r\nSet-Cookie: AWSALB=first; Path=/\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ])
        .await;

        let raw = transport().send(get(format!("{base}/a"))).await.unwrap();

        assert_eq!(raw.status, StatusCode::FOUND);
        assert_eq!(raw.set_cookies().collect::<Vec<_>>(), ["AWSALB=first; Path=/"]);
    }
}
