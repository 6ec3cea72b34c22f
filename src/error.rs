//! Error types.
//!
//! Two layers, kept apart on purpose:
//!
//! - [`Error`]: infrastructure failures surfaced from [`Server`](crate::Server):
//!   binding a port, accepting a connection.
//! - [`HttpError`]: request-level failures. Each variant owns exactly one
//!   status code and converts into a [`Response`], so handlers return
//!   `Result<Response, HttpError>` and reach for `?`.

use http::StatusCode;
use http::header::{ALLOW, HeaderValue};
use tracing::error;

use crate::response::{IntoResponse, Response};

/// The error type returned by the server's fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        source: std::net::AddrParseError,
    },
}

/// A request that cannot be answered normally.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The body, declared or streamed, is larger than the configured limit.
    #[error("request body too large")]
    PayloadTooLarge,

    /// The path exists but not for this method. `allow` is the ready-made
    /// `Allow` header value, e.g. `"GET, HEAD, OPTIONS"`.
    #[error("method not allowed")]
    MethodNotAllowed { allow: String },

    #[error("not found")]
    NotFound,

    /// A malformed path segment or query parameter.
    #[error("{0}")]
    BadRequest(String),

    /// A route the service knows about and deliberately does not implement.
    #[error("not implemented")]
    NotImplemented,

    /// The body did not arrive within the configured maximum duration.
    #[error("timed out reading request body")]
    Timeout,

    /// Anything unexpected. The message is logged, never sent to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge         => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotFound                => StatusCode::NOT_FOUND,
            Self::BadRequest(_)           => StatusCode::BAD_REQUEST,
            Self::NotImplemented          => StatusCode::NOT_IMPLEMENTED,
            Self::Timeout                 => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_)             => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(detail) => {
                error!(%detail, "internal error");
                status.canonical_reason().unwrap_or("Internal Server Error").to_owned()
            }
            other => other.to_string(),
        };

        let mut response = Response::builder().status(status).text(format!("{message}\n"));
        if let Self::MethodNotAllowed { allow } = &self {
            if let Ok(value) = HeaderValue::from_str(allow) {
                response.headers_mut().insert(ALLOW, value);
            }
        }
        response
    }
}
