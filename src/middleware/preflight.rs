use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
    ACCESS_CONTROL_REQUEST_METHOD, HeaderMap, HeaderValue, ORIGIN,
};
use http::Method;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

const ALLOWED_METHODS: &str = "GET, POST, HEAD, PUT, DELETE, PATCH, OPTIONS";
const MAX_AGE_SECS: &str = "3600";

/// Permissive CORS.
///
/// A browser preflight (`OPTIONS` with `Access-Control-Request-Method`) is
/// answered here with `200` and an empty body; inner stages never see it.
/// Every other response leaves with CORS headers added, whatever its status.
pub struct Preflight;

impl Middleware for Preflight {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let origin = allow_origin(req.headers());

        if is_preflight(&req) {
            let mut response = Response::builder().no_body();
            let headers = response.headers_mut();
            insert_cors(headers, origin);
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
            headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
            if let Some(requested) = req.headers().get(ACCESS_CONTROL_REQUEST_HEADERS) {
                headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
            }
            return Box::pin(async move { response });
        }

        let fut = next.run(req);
        Box::pin(async move {
            let mut response = fut.await;
            insert_cors(response.headers_mut(), origin);
            response
        })
    }
}

fn is_preflight(req: &Request) -> bool {
    *req.method() == Method::OPTIONS && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

/// The request's own `Origin` when present, else `*`.
fn allow_origin(headers: &HeaderMap) -> HeaderValue {
    headers
        .get(ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"))
}

fn insert_cors(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
}
