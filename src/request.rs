//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, HeaderMap};
use http::request::Parts;
use http::Uri;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, LengthLimitError};
use hyper::body::Body;
use tracing::debug;

use crate::error::HttpError;
use crate::mirror;
use crate::multimap::OrderedMultimap;
use crate::response::BoxError;

/// Body type of every [`Request`]: the connection's body, possibly wrapped
/// by middleware (for example in a size limit).
pub type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// An incoming HTTP request.
///
/// The body is not read up front. Handlers that need it call
/// [`read_body`](Request::read_body); everything else never pays for it.
pub struct Request {
    parts: Parts,
    body: RequestBody,
    params: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Wraps any `http::Request` whose body yields [`Bytes`].
    ///
    /// `remote_addr` is the peer of the TCP connection; the server always
    /// knows it, tests may pass `None`.
    pub fn new<B>(req: http::Request<B>, remote_addr: Option<SocketAddr>) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        Self {
            parts,
            body: body.map_err(Into::into).boxed_unsync(),
            params: HashMap::new(),
            remote_addr,
        }
    }

    pub fn method(&self) -> &http::Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn query(&self) -> Option<&str> { self.parts.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Header lookup. Header names are case-insensitive. A value that is not
    /// visible ASCII reads as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/stream/{n}`, `req.param("n")` on `/stream/5` returns `Some("5")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The decoded query string, every value of every key kept.
    pub fn args(&self) -> OrderedMultimap<String, String> {
        self.query().map(mirror::parse_query).unwrap_or_default()
    }

    /// First value of query parameter `name`.
    pub fn arg(&self, name: &str) -> Option<String> {
        self.args().first(name).cloned()
    }

    /// The `Content-Length` the client declared, if it is a valid number.
    pub fn content_length(&self) -> Option<u64> {
        self.header(CONTENT_LENGTH.as_str())?.trim().parse().ok()
    }

    /// Reads the whole body.
    ///
    /// Fails with [`HttpError::PayloadTooLarge`] when a size-limit wrapper
    /// trips, and with [`HttpError::Timeout`] when the body does not arrive
    /// within `within`. The body can be read once; later calls return empty.
    pub async fn read_body(&mut self, within: Duration) -> Result<Bytes, HttpError> {
        let body = std::mem::replace(
            &mut self.body,
            Empty::new().map_err(|never| match never {}).boxed_unsync(),
        );

        match tokio::time::timeout(within, body.collect()).await {
            Ok(Ok(collected)) => Ok(collected.to_bytes()),
            Ok(Err(e)) if is_length_limit(&*e) => Err(HttpError::PayloadTooLarge),
            Ok(Err(e)) => {
                debug!(error = %e, "request body read failed");
                Err(HttpError::bad_request(format!("error reading request body: {e}")))
            }
            Err(_) => Err(HttpError::Timeout),
        }
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn map_body(mut self, f: impl FnOnce(RequestBody) -> RequestBody) -> Self {
        let body = std::mem::replace(
            &mut self.body,
            Empty::new().map_err(|never| match never {}).boxed_unsync(),
        );
        self.body = f(body);
        self
    }
}

/// True when `e`, or anything in its source chain, is a body size-limit trip.
fn is_length_limit(e: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(e);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}
