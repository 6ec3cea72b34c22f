//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! A [`Response`] is a thin wrapper around `http::Response` whose body is a
//! boxed [`hyper::body::Body`]: a fixed buffer for ordinary replies, or a lazy
//! stream for endpoints that drip data out over time. Middleware sees both
//! kinds through the same type.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Body, Frame};
use serde::Serialize;

use crate::error::HttpError;

/// Boxed error carried by request and response bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Body type of every [`Response`].
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content-type values used by the service.
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Json,        // application/json; encoding=utf-8
    OctetStream, // application/octet-stream
    Text,        // text/plain; charset=utf-8
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json        => "application/json; encoding=utf-8",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }

    fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use httpbin::Response;
///
/// Response::json(&serde_json::json!({"origin": "127.0.0.1"}));
/// Response::text("hello");
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use httpbin::{ContentType, Response};
/// use http::StatusCode;
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/stream/42")
///     .bytes(ContentType::OctetStream, vec![1, 2, 3]);
/// ```
pub struct Response {
    inner: http::Response<ResponseBody>,
}

impl Response {
    /// `200 OK` with `value` encoded as JSON.
    ///
    /// An encoding failure becomes a `500`; the cause is logged.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::builder().json(value)
    }

    /// `200 OK`: `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self::builder().status(code).no_body()
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// Exact body length, when it is known without consuming the body.
    pub fn body_len(&self) -> Option<u64> {
        self.inner.body().size_hint().exact()
    }

    /// Swaps the body out, returning the old one.
    pub fn replace_body(&mut self, body: ResponseBody) -> ResponseBody {
        std::mem::replace(self.inner.body_mut(), body)
    }

    pub fn into_inner(self) -> http::Response<ResponseBody> {
        self.inner
    }

    pub(crate) fn from_parts(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        let mut inner = http::Response::new(body);
        *inner.status_mut() = status;
        *inner.headers_mut() = headers;
        Self { inner }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.inner.status())
            .field("headers", self.inner.headers())
            .finish_non_exhaustive()
    }
}

// ── Bodies ────────────────────────────────────────────────────────────────────

/// A body that yields `bytes` in one frame.
pub fn full(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed_unsync()
}

/// A body with no frames.
pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync()
}

/// A body that polls `stream` for each frame. Each item becomes its own frame
/// and is written to the client as soon as it is produced.
pub fn streaming<S>(stream: S) -> ResponseBody
where
    S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
{
    StreamBody::new(stream.map(|chunk| chunk.map(Frame::data))).boxed_unsync()
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method: you always know what you're sending.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Appends a header. Names or values that are not valid HTTP are dropped
    /// with a warning rather than failing the response.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(name, "dropping invalid response header"),
        }
        self
    }

    /// Terminate with `value` encoded as JSON.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.bytes(ContentType::Json, bytes),
            Err(e) => HttpError::Internal(format!("encoding json response: {e}")).into_response(),
        }
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.bytes(ContentType::Text, body.into())
    }

    /// Terminate with a typed, fully buffered body.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, full(body))
    }

    /// Terminate with a streamed body. See [`streaming`].
    pub fn stream<S>(self, content_type: ContentType, stream: S) -> Response
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        self.finish(content_type, streaming(stream))
    }

    /// Terminate with no body (e.g. `204 No Content`, a preflight reply).
    pub fn no_body(self) -> Response {
        Response::from_parts(self.status, self.headers, empty())
    }

    fn finish(mut self, content_type: ContentType, body: ResponseBody) -> Response {
        self.headers.entry(CONTENT_TYPE).or_insert(content_type.header_value());
        Response::from_parts(self.status, self.headers, body)
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Handlers may return anything implementing this trait. The important
/// implementation is the one for `Result`: a handler written as
/// `async fn(Request) -> Result<Response, HttpError>` can use `?` and have
/// every error turned into its status code.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NO_CONTENT`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(ok) => ok.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sets_content_type_and_length() {
        let response = Response::json(&serde_json::json!({"a": 1}));
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], ContentType::Json.as_str());
        assert_eq!(response.body_len(), Some(br#"{"a":1}"#.len() as u64));
    }

    #[test]
    fn explicit_content_type_wins_over_the_typed_default() {
        let response = Response::builder()
            .header("content-type", "application/x-ndjson")
            .text("x");
        assert_eq!(response.headers()[CONTENT_TYPE], "application/x-ndjson");
    }

    #[test]
    fn streamed_bodies_have_no_known_length() {
        let chunks = futures::stream::iter([Ok::<_, BoxError>(Bytes::from_static(b"a"))]);
        let response = Response::builder().stream(ContentType::Text, chunks);
        assert_eq!(response.body_len(), None);
    }

    #[test]
    fn result_errors_render_their_status() {
        let response = Err::<Response, _>(HttpError::NotFound).into_response();
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }
}
