//! # httpbin
//!
//! An HTTP test fixture: every endpoint answers by echoing, transforming, or
//! deliberately exercising some part of the request it got.
//!
//! ## What is inside
//!
//! - **Request mirroring**: headers, query args, form fields and uploaded
//!   file names captured as an ordered multi-map and rendered with the
//!   classic httpbin quirk: one value becomes a bare scalar, anything else
//!   stays an array. See [`compat`].
//! - **Middleware**: body-size limit, CORS preflight, automatic `HEAD`, and
//!   per-request observation. See [`middleware`].
//! - **Routing**: a radix tree via [`matchit`], method-gated, with `405` +
//!   `Allow` for known paths and no implicit trailing-slash redirects.
//! - **Lazy sequences**: `/stream`, `/drip` and friends produce one item at a
//!   time, stop at a deadline, and stop the moment the client goes away.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use httpbin::middleware::log_observation;
//! use httpbin::{Config, HttpBin, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), httpbin::Error> {
//!     let config = Config::default().observer(Arc::new(log_observation));
//!     let app = HttpBin::new(config);
//!     Server::bind("0.0.0.0:8080").serve(app.pipeline()).await
//! }
//! ```
//!
//! ## Your own endpoints
//!
//! A handler is any `async fn(Request) -> impl IntoResponse`:
//!
//! ```rust
//! use httpbin::{HttpError, Request, Response, RequestSnapshot, Router};
//!
//! async fn anything(req: Request) -> Result<Response, HttpError> {
//!     if req.param("name").is_none() {
//!         return Err(HttpError::NotFound);
//!     }
//!     Ok(Response::json(&RequestSnapshot::capture(&req)))
//! }
//!
//! let router = Router::new().get("/anything/{name}", anything);
//! ```

mod app;
mod config;
mod endpoints;
mod error;
mod handler;
mod method;
mod multimap;
mod request;
mod response;
mod router;
mod server;

pub mod compat;
pub mod middleware;
pub mod mirror;
pub mod sequence;

pub use app::HttpBin;
pub use compat::Compat;
pub use config::{
    Config, DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_DURATION, DEFAULT_PARAMS, DefaultParams,
    MAX_BODY_SIZE_VAR, MAX_DURATION_VAR,
};
pub use error::{Error, HttpError};
pub use handler::{BoxFuture, Handler};
pub use method::Method;
pub use mirror::{BodyEcho, DeflateEcho, GzipEcho, HeadersEcho, OriginEcho, RequestSnapshot, UserAgentEcho};
pub use multimap::OrderedMultimap;
pub use request::{Request, RequestBody};
pub use response::{BoxError, ContentType, IntoResponse, Response, ResponseBody, ResponseBuilder};
pub use router::Router;
pub use sequence::{MAX_STREAM_RECORDS, Sequence, StreamRecord};
pub use server::Server;
