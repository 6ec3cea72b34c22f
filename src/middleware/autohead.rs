use http::header::{CONTENT_LENGTH, HeaderValue};
use http::Method;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response;

/// Answers `HEAD` for every `GET` route.
///
/// The request runs inward still a `HEAD`: the router serves it from the
/// path's `HEAD` handler, or else its `GET` handler. Status and headers come
/// back untouched; the body is dropped unread and, when its size was known,
/// reported in `Content-Length`. A streamed body (unknown size) is dropped
/// without being generated.
pub struct Autohead;

impl Middleware for Autohead {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        if *req.method() != Method::HEAD {
            return next.run(req);
        }

        let fut = next.run(req);
        Box::pin(async move {
            let mut response = fut.await;
            if let Some(len) = response.body_len() {
                response.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
            }
            drop(response.replace_body(response::empty()));
            response
        })
    }
}
