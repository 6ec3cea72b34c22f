//! The assembled service: route table plus middleware.

use std::future::Future;
use std::sync::Arc;

use crate::config::Config;
use crate::endpoints;
use crate::method::Method;
use crate::middleware::{Autohead, LimitRequestSize, Observe, Pipeline, Preflight};
use crate::request::Request;
use crate::router::Router;

/// An httpbin app built from a [`Config`].
///
/// ```rust,no_run
/// use httpbin::{Config, HttpBin, Server};
///
/// # async fn run() -> Result<(), httpbin::Error> {
/// let app = HttpBin::new(Config::default());
/// Server::bind("127.0.0.1:8080").serve(app.pipeline()).await
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpBin {
    config: Arc<Config>,
}

impl HttpBin {
    pub fn new(config: Config) -> Self {
        Self { config: Arc::new(config) }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every endpoint, with no middleware.
    pub fn router(&self) -> Router {
        let config = &self.config;
        Router::new()
            .get("/get", endpoints::get)
            .on(Method::Head, "/head", endpoints::get)
            .post("/post", bind(config, endpoints::body_echo))
            .put("/put", bind(config, endpoints::body_echo))
            .patch("/patch", bind(config, endpoints::body_echo))
            .delete("/delete", bind(config, endpoints::body_echo))
            .get("/headers", endpoints::headers)
            .get("/ip", endpoints::ip)
            .get("/user-agent", endpoints::user_agent)
            .get("/stream/{n}", bind(config, endpoints::stream))
            .not_found("/stream")
            .not_found("/stream/")
            .get("/delay/{seconds}", bind(config, endpoints::delay))
            .not_found("/delay")
            .not_found("/delay/")
            .get("/drip", bind(config, endpoints::drip))
            .get("/brotli", endpoints::not_implemented)
    }

    /// The router inside the standard stages. Outermost first, a request meets
    /// `Observe` (when an observer is configured), `Autohead`, `Preflight`,
    /// then `LimitRequestSize`.
    pub fn pipeline(&self) -> Pipeline {
        let pipeline = Pipeline::new(self.router())
            .layer(LimitRequestSize::new(self.config.max_body_size))
            .layer(Preflight)
            .layer(Autohead);

        match &self.config.observer {
            Some(observer) => pipeline.layer(Observe::new(Arc::clone(observer))),
            None => pipeline,
        }
    }
}

/// Closes a handler over the shared config.
fn bind<F, Fut>(config: &Arc<Config>, handler: F) -> impl Fn(Request) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<Config>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future,
{
    let config = Arc::clone(config);
    move |req| handler(Arc::clone(&config), req)
}
