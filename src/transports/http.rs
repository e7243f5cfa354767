//! HTTP transport implementation using `reqwest`.
//!
//! This module provides [`ReqwestTransport`], a [`Transport`] implementation
//! that issues each protocol request as an HTTP POST. Both `http://` and
//! `https://` URLs are supported; TLS is handled by `reqwest`.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-reqwest` feature is
//! enabled (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), quizwire_client::QuizError> {
//! use quizwire_client::{ReqwestTransport, Transport};
//!
//! let mut transport = ReqwestTransport::new()?;
//! let response = transport
//!     .post("https://kahoot.it/cometd/123456/token/handshake", &[], "{}".to_string())
//!     .await?;
//! println!("status {}: {}", response.status, response.body);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::error::QuizError;
use crate::transport::{HttpResponse, Transport};

/// Default per-request timeout. Must exceed the 60 second long-poll window.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(75);

/// Default `User-Agent` header sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("quizwire-client/", env!("CARGO_PKG_VERSION"));

/// A [`Transport`] implementation backed by a [`reqwest::Client`].
///
/// The inner client is cheap to clone and pools connections, so one
/// `ReqwestTransport` per game session is fine even when many sessions run
/// side by side.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the default user agent and a request timeout
    /// of [`DEFAULT_REQUEST_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Transport`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, QuizError> {
        Self::with_options(DEFAULT_USER_AGENT, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom user agent and request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Transport`] if the TLS backend cannot be initialized.
    pub fn with_options(user_agent: &str, timeout: Duration) -> Result<Self, QuizError> {
        let inner = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| QuizError::Transport(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Wrap an already-configured [`reqwest::Client`] (custom proxy, TLS roots, ...).
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<HttpResponse, QuizError> {
        let mut builder = self
            .inner
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        for &(name, value) in headers {
            builder = builder.header(name, value);
        }

        let response = builder.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                QuizError::Timeout
            } else {
                QuizError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| QuizError::Transport(e.to_string()))?;

        let response = HttpResponse {
            status,
            headers,
            body,
        };
        if !response.is_success() {
            tracing::debug!(url = %url, status, body = %response.body, "request failed with non-success status");
            return Err(QuizError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn reqwest_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ReqwestTransport>();
    }

    #[test]
    fn reqwest_transport_is_debug() {
        fn assert_debug<T: std::fmt::Debug>() {}
        assert_debug::<ReqwestTransport>();
    }

    // ── Mock-server helpers ──────────────────────────────────────────────

    /// Start a one-shot HTTP server that records the raw request and answers
    /// with `response`. Returns the base URL and a receiver for the request.
    async fn start_mock_server(
        response: &'static str,
    ) -> (String, tokio::sync::oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, request_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut tcp, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = tcp.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            tcp.write_all(response.as_bytes()).await.unwrap();
            tcp.shutdown().await.unwrap();
            let _ = request_tx.send(String::from_utf8_lossy(&raw).to_string());
        });

        (format!("http://{addr}"), request_rx)
    }

    // ── Mock-server tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn post_sends_body_headers_and_collects_response() {
        let (url, request_rx) = start_mock_server(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: application/json\r\n\
             Set-Cookie: BAYEUX_BROWSER=abc123; Path=/\r\n\
             Content-Length: 21\r\n\
             Connection: close\r\n\r\n\
             [{\"successful\":true}]",
        )
        .await;

        let mut transport = ReqwestTransport::new().unwrap();
        let response = transport
            .post(
                &format!("{url}/cometd/1/tok/handshake"),
                &[("Cookie", "BAYEUX_BROWSER=abc123")],
                r#"{"channel":"/meta/handshake"}"#.to_string(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"[{"successful":true}]"#);
        assert_eq!(
            response.header("set-cookie"),
            Some("BAYEUX_BROWSER=abc123; Path=/")
        );

        let request = request_rx.await.unwrap();
        assert!(request.starts_with("POST /cometd/1/tok/handshake HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("cookie: bayeux_browser=abc123"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"channel":"/meta/handshake"}"#));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (url, _request_rx) = start_mock_server(
            "HTTP/1.1 503 Service Unavailable\r\n\
             Content-Length: 0\r\n\
             Connection: close\r\n\r\n",
        )
        .await;

        let mut transport = ReqwestTransport::new().unwrap();
        let err = transport
            .post(&url, &[], "{}".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::HttpStatus { status: 503, .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let mut transport = ReqwestTransport::new().unwrap();
        let err = transport
            .post("http://127.0.0.1:1/cometd", &[], "{}".to_string())
            .await
            .unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn invalid_url_is_a_transport_error() {
        let mut transport = ReqwestTransport::new().unwrap();
        let err = transport
            .post("not-a-valid-url", &[], "{}".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::Transport(_)));
    }
}
