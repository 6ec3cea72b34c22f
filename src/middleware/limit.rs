use http_body_util::{BodyExt, Limited};
use tracing::debug;

use super::{Middleware, Next};
use crate::error::HttpError;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::IntoResponse;

/// Caps request bodies at `max` bytes.
///
/// A declared `Content-Length` over the cap is refused right away, before
/// any inner stage runs. Otherwise the body is wrapped so that reading past
/// the cap fails; [`Request::read_body`] reports that as
/// [`HttpError::PayloadTooLarge`]. Chunked bodies with no declared length
/// are caught the same way.
pub struct LimitRequestSize {
    max: u64,
}

impl LimitRequestSize {
    pub fn new(max: u64) -> Self {
        Self { max }
    }
}

impl Middleware for LimitRequestSize {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        if let Some(declared) = req.content_length().filter(|&len| len > self.max) {
            debug!(declared, max = self.max, "refusing oversized request body");
            return Box::pin(async { HttpError::PayloadTooLarge.into_response() });
        }

        let max = usize::try_from(self.max).unwrap_or(usize::MAX);
        let req = req.map_body(|body| Limited::new(body, max).boxed_unsync());
        next.run(req)
    }
}
