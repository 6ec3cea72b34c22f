//! Radix-tree request router.
//!
//! One [`matchit`] tree keyed by path; each path carries its own small method
//! table. Resolving the path first is what lets a known path answer
//! `405 Method Not Allowed` with an `Allow` header instead of a bare 404.
//!
//! # Trailing slashes
//!
//! There is no implicit redirect between `/stream` and `/stream/`. Paths that
//! need a suffix (`/stream/{n}`, `/delay/{seconds}`) register their bare
//! forms with [`Router::not_found`], so a client exercising redirects never
//! receives one it did not ask for.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::header::ALLOW;
use matchit::Router as MatchitRouter;
use tracing::error;

use crate::error::HttpError;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::method::{Method, allow_header};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// What a registered path does.
enum Route {
    Methods(Vec<(Method, BoxedHandler)>),
    /// Registered only to answer 404.
    NotFound,
}

pub(crate) enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    /// Plain `OPTIONS` on a known path; carries the `Allow` value.
    Options(String),
    NotAllowed(String),
    NotFound,
}

/// The application router.
///
/// Build it once at startup. Each registration returns `self` so calls
/// chain naturally.
pub struct Router {
    tree: MatchitRouter<usize>,
    routes: Vec<Route>,
    by_pattern: HashMap<String, usize>,
}

impl Router {
    pub fn new() -> Self {
        Self { tree: MatchitRouter::new(), routes: Vec::new(), by_pattern: HashMap::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust
    /// # use httpbin::{Method, Request, Response, Router};
    /// # async fn stream(_: Request) -> Response { Response::text("") }
    /// # async fn post(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::Get,  "/stream/{n}", stream)
    ///     .on(Method::Post, "/post",       post);
    /// ```
    ///
    /// # Panics
    ///
    /// On an invalid pattern, a pattern that conflicts with an existing one,
    /// or a method registered twice for the same path.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let idx = self.slot(path, || Route::Methods(Vec::new()));
        match &mut self.routes[idx] {
            Route::Methods(handlers) => {
                assert!(
                    handlers.iter().all(|(m, _)| *m != method),
                    "route `{method} {path}` registered twice"
                );
                handlers.push((method, handler.into_boxed_handler()));
            }
            Route::NotFound => panic!("route `{path}` is registered as not-found"),
        }
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, path, handler)
    }

    /// Pin `path` to `404 Not Found` for every method.
    pub fn not_found(mut self, path: &str) -> Self {
        let idx = self.slot(path, || Route::NotFound);
        assert!(
            matches!(self.routes[idx], Route::NotFound),
            "route `{path}` already has handlers"
        );
        self
    }

    fn slot(&mut self, path: &str, init: impl FnOnce() -> Route) -> usize {
        if let Some(&idx) = self.by_pattern.get(path) {
            return idx;
        }
        let idx = self.routes.len();
        self.tree
            .insert(path, idx)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.routes.push(init());
        self.by_pattern.insert(path.to_owned(), idx);
        idx
    }

    pub(crate) fn lookup(&self, method: &http::Method, path: &str) -> Lookup {
        let Ok(matched) = self.tree.at(path) else {
            return Lookup::NotFound;
        };
        let Route::Methods(handlers) = &self.routes[*matched.value] else {
            return Lookup::NotFound;
        };

        let find = |wanted: Method| {
            handlers.iter().find(|(m, _)| *m == wanted).map(|(_, h)| Arc::clone(h))
        };
        let allow = || allow_header(handlers.iter().map(|(m, _)| *m));

        match Method::try_from(method) {
            Ok(wanted) => {
                let handler = find(wanted).or_else(|| match wanted {
                    Method::Head => find(Method::Get),
                    _ => None,
                });
                match (handler, wanted) {
                    (Some(handler), _) => {
                        let params = matched.params.iter()
                            .map(|(k, v)| (k.to_owned(), v.to_owned()))
                            .collect();
                        Lookup::Found(handler, params)
                    }
                    (None, Method::Options) => Lookup::Options(allow()),
                    (None, _) => Lookup::NotAllowed(allow()),
                }
            }
            Err(()) => Lookup::NotAllowed(allow()),
        }
    }

    /// Routes `req` and runs its handler. A panicking handler is answered
    /// with `500`.
    pub(crate) fn dispatch(&self, mut req: Request) -> BoxFuture {
        match self.lookup(req.method(), req.path()) {
            Lookup::Found(handler, params) => {
                req.set_params(params);
                let method = req.method().clone();
                let path = req.path().to_owned();
                let fut = handler.call(req);
                Box::pin(async move {
                    match AssertUnwindSafe(fut).catch_unwind().await {
                        Ok(response) => response,
                        Err(panic) => {
                            let reason = panic
                                .downcast_ref::<&str>()
                                .map(|s| (*s).to_owned())
                                .or_else(|| panic.downcast_ref::<String>().cloned())
                                .unwrap_or_default();
                            error!(%method, %path, %reason, "handler panicked");
                            HttpError::Internal(format!("handler panicked: {reason}")).into_response()
                        }
                    }
                })
            }
            Lookup::Options(allow) => {
                let response = Response::builder().header(ALLOW.as_str(), &allow).no_body();
                Box::pin(async move { response })
            }
            Lookup::NotAllowed(allow) => {
                let response = HttpError::MethodNotAllowed { allow }.into_response();
                Box::pin(async move { response })
            }
            Lookup::NotFound => Box::pin(async { HttpError::NotFound.into_response() }),
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
