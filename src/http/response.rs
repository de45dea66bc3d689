//! HTTP response construction.
//!
//! Every response is serialized into one contiguous, exactly-sized buffer
//! so the connection can stream it with a plain byte cursor. Sessions are
//! single-request, so `Connection: close` is always emitted.

use crate::http::types::StatusCode;
use std::borrow::Cow;

/// HTTP response builder.
///
/// Collects status, content type, extra headers, and body, then serializes
/// once with [`into_bytes`](Response::into_bytes). The wire layout is:
///
/// ```text
/// HTTP/1.1 <code> <text>\r\n
/// Content-Type: <ct>\r\n
/// Content-Length: <n>\r\n
/// Connection: close\r\n
/// [extra headers...]
/// \r\n
/// <body>
/// ```
///
/// # Examples
/// ```
/// use weathervane::{Response, StatusCode};
///
/// let bytes = Response::new(StatusCode::Ok, "text/plain", "hi")
///     .header("X-Served-By", "weathervane")
///     .into_bytes();
///
/// assert!(bytes.starts_with(b"HTTP/1.1 200 OK\r\n"));
/// assert!(bytes.ends_with(b"\r\n\r\nhi"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    content_type: Cow<'static, str>,
    headers: Vec<(Cow<'static, str>, String)>,
    body: Vec<u8>,
}

impl Response {
    #[inline]
    pub fn new(
        status: StatusCode,
        content_type: impl Into<Cow<'static, str>>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds an extra header.
    ///
    /// `Content-Type`, `Content-Length`, and `Connection` are emitted by
    /// the serializer; do not add them here.
    #[inline]
    pub fn header(
        mut self,
        name: impl Into<Cow<'static, str>>,
        value: impl ToString,
    ) -> Self {
        self.headers.push((name.into(), value.to_string()));
        self
    }

    /// Serializes into a single exactly-sized buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        let length = self.body.len().to_string();

        let mut size = self.status.status_line().len()
            + "Content-Type: \r\n".len() + self.content_type.len()
            + "Content-Length: \r\n".len() + length.len()
            + "Connection: close\r\n".len()
            + 2
            + self.body.len();
        for (name, value) in &self.headers {
            size += name.len() + 2 + value.len() + 2;
        }

        let mut buffer = Vec::with_capacity(size);
        buffer.extend_from_slice(self.status.status_line());
        buffer.extend_from_slice(b"Content-Type: ");
        buffer.extend_from_slice(self.content_type.as_bytes());
        buffer.extend_from_slice(b"\r\nContent-Length: ");
        buffer.extend_from_slice(length.as_bytes());
        buffer.extend_from_slice(b"\r\nConnection: close\r\n");
        for (name, value) in &self.headers {
            buffer.extend_from_slice(name.as_bytes());
            buffer.extend_from_slice(b": ");
            buffer.extend_from_slice(value.as_bytes());
            buffer.extend_from_slice(b"\r\n");
        }
        buffer.extend_from_slice(b"\r\n");
        buffer.extend_from_slice(&self.body);

        buffer
    }
}

// Shorthand constructors for everything the server emits.

/// `200 OK` with a plain text body.
#[inline]
pub fn text(body: &str) -> Vec<u8> {
    Response::new(StatusCode::Ok, "text/plain", body).into_bytes()
}

/// `200 OK` with a JSON body.
#[inline]
pub fn json(body: Vec<u8>) -> Vec<u8> {
    Response::new(StatusCode::Ok, "application/json", body).into_bytes()
}

/// `200 OK` with an HTML body.
#[inline]
pub fn html(body: &str) -> Vec<u8> {
    Response::new(StatusCode::Ok, "text/html", body).into_bytes()
}

/// `200 OK` with a caller-declared content type, for binary payloads.
#[inline]
pub fn binary(content_type: impl Into<Cow<'static, str>>, body: Vec<u8>) -> Vec<u8> {
    Response::new(StatusCode::Ok, content_type, body).into_bytes()
}

/// `400 Bad Request`.
#[inline]
pub fn bad_request(reason: &str) -> Vec<u8> {
    Response::new(StatusCode::BadRequest, "text/plain", reason).into_bytes()
}

/// `404 Not Found`.
#[inline]
pub fn not_found(resource: &str) -> Vec<u8> {
    let body = format!("{} was not found", resource);
    Response::new(StatusCode::NotFound, "text/plain", body).into_bytes()
}

/// `405 Method Not Allowed`, advertising the allowed methods.
#[inline]
pub fn method_not_allowed(allowed: &str) -> Vec<u8> {
    Response::new(StatusCode::MethodNotAllowed, "text/plain", "Method not allowed")
        .header("Allow", allowed)
        .into_bytes()
}

/// `408 Request Timeout`.
#[inline]
pub fn request_timeout() -> Vec<u8> {
    Response::new(StatusCode::RequestTimeout, "text/plain", "Request timed out").into_bytes()
}

/// `413 Content Too Large`, naming the limit.
#[inline]
pub fn content_too_large(max: usize) -> Vec<u8> {
    let body = format!("Request exceeds {} bytes", max);
    Response::new(StatusCode::ContentTooLarge, "text/plain", body).into_bytes()
}

/// `429 Too Many Requests` with an optional `Retry-After` in seconds.
#[inline]
pub fn too_many_requests(retry_after: Option<u64>) -> Vec<u8> {
    let resp = Response::new(StatusCode::TooManyRequests, "text/plain", "Too many requests");
    match retry_after {
        Some(secs) => resp.header("Retry-After", secs).into_bytes(),
        None => resp.into_bytes(),
    }
}

/// `500 Internal Server Error`.
#[inline]
pub fn internal_error(details: &str) -> Vec<u8> {
    Response::new(StatusCode::InternalServerError, "text/plain", details).into_bytes()
}

/// `501 Not Implemented`.
#[inline]
pub fn not_implemented(feature: &str) -> Vec<u8> {
    let body = format!("{} is not implemented", feature);
    Response::new(StatusCode::NotImplemented, "text/plain", body).into_bytes()
}

/// `503 Service Unavailable` with an optional `Retry-After` in seconds.
#[inline]
pub fn service_unavailable(retry_after: Option<u64>) -> Vec<u8> {
    let resp = Response::new(StatusCode::ServiceUnavailable, "text/plain", "Service unavailable");
    match retry_after {
        Some(secs) => resp.header("Retry-After", secs).into_bytes(),
        None => resp.into_bytes(),
    }
}
