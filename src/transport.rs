//! Transport abstraction for the quiz long-polling protocol.
//!
//! The [`Transport`] trait is a single-shot HTTP POST: the client sends a JSON
//! text body with a list of headers and receives the status, headers and body
//! of the response. Everything the protocol needs (cookies, long-poll
//! suspension) is expressed through those three parts.
//!
//! # Connection Setup
//!
//! Connection pooling, TLS and the user-agent string are NOT part of this
//! trait. Build the HTTP client externally (or use
//! [`ReqwestTransport`](crate::transports::ReqwestTransport)) and hand it to
//! `QuizClient::start`.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use quizwire_client::error::QuizError;
//! use quizwire_client::transport::{HttpResponse, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn post(
//!         &mut self,
//!         url: &str,
//!         headers: &[(&str, &str)],
//!         body: String,
//!     ) -> Result<HttpResponse, QuizError> {
//!         // Issue the POST and collect the response.
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::QuizError;

/// A request/response HTTP transport.
///
/// # Object Safety
///
/// This trait is object-safe, so `Box<dyn Transport>` works for dynamic dispatch.
///
/// # Long polling
///
/// A `/meta/connect` request is held open by the server for up to the
/// advertised 60 second timeout. Implementations must not enforce a request
/// timeout shorter than that.
#[async_trait]
pub trait Transport: Send + 'static {
    /// POST `body` to `url` with the given headers.
    ///
    /// # Errors
    ///
    /// Returns [`QuizError::Transport`] when the request could not be completed
    /// and [`QuizError::HttpStatus`] when the server answered with a non-2xx
    /// status code.
    async fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<HttpResponse, QuizError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn post(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<HttpResponse, QuizError> {
        (**self).post(url, headers, body).await
    }
}

/// A minimal HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: u16,
    /// Response headers as `(lowercase name, value)` pairs, in arrival order.
    /// A header that appears several times appears several times here.
    pub headers: Vec<(String, String)>,
    /// The response body.
    pub body: String,
}

impl HttpResponse {
    /// Create a `200 OK` response with the given body and no headers.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Look up the first value of a response header (case-insensitive).
    pub fn header<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.headers_named(name).next()
    }

    /// Iterate over every value of a response header (case-insensitive).
    pub fn headers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = HttpResponse::ok("[]").with_header("Set-Cookie", "a=1; Path=/");
        assert_eq!(response.header("set-cookie"), Some("a=1; Path=/"));
        assert_eq!(response.header("SET-COOKIE"), Some("a=1; Path=/"));
        assert!(response.header("cookie").is_none());
    }

    #[test]
    fn header_value_outlives_a_borrowed_name() {
        let response = HttpResponse::ok("[]").with_header("Set-Cookie", "a=1");
        let name = String::from("set-cookie");
        let value = response.header(&name);
        assert_eq!(value, Some("a=1"));
    }

    #[test]
    fn repeated_headers_are_preserved_in_order() {
        let response = HttpResponse::ok("[]")
            .with_header("Set-Cookie", "first=1")
            .with_header("Set-Cookie", "second=2");
        let values: Vec<_> = response.headers_named("set-cookie").collect();
        assert_eq!(values, vec!["first=1", "second=2"]);
    }

    #[test]
    fn success_range() {
        assert!(HttpResponse::ok("").is_success());
        let mut response = HttpResponse::ok("");
        response.status = 204;
        assert!(response.is_success());
        response.status = 302;
        assert!(!response.is_success());
        response.status = 500;
        assert!(!response.is_success());
    }
}
