//! Middleware layer.
//!
//! Middleware intercepts requests and responses: the place for cross-cutting
//! concerns every endpoint shares. A stage implements [`Middleware`]; it gets
//! the request and a [`Next`], and either runs `next` (optionally editing the
//! request before and the response after) or answers on its own.
//!
//! A [`Pipeline`] is a [`Router`] plus stages. [`Pipeline::layer`] wraps
//! everything added so far, so the last layer added sees the request first:
//!
//! ```text
//! Pipeline::new(router)
//!     .layer(LimitRequestSize)   ┐
//!     .layer(Preflight)          │ request:  Observe → Autohead → Preflight → LimitRequestSize → router
//!     .layer(Autohead)           │ response: router → LimitRequestSize → Preflight → Autohead → Observe
//!     .layer(Observe)            ┘
//! ```
//!
//! Built-in stages:
//! - [`LimitRequestSize`]: `413` for bodies over the configured cap
//! - [`Preflight`]: CORS preflight replies and permissive CORS headers
//! - [`Autohead`]: `HEAD` for every `GET` route
//! - [`Observe`]: one [`Observation`] per request, handed to an [`Observer`]

mod autohead;
mod limit;
mod observe;
mod preflight;

use std::sync::Arc;

pub use autohead::Autohead;
pub use limit::LimitRequestSize;
pub use observe::{Observation, Observe, Observer, log_observation};
pub use preflight::Preflight;

use crate::handler::BoxFuture;
use crate::request::Request;
use crate::router::Router;

/// One request-wrapping stage.
pub trait Middleware: Send + Sync + 'static {
    /// Handle `req`. Call `next.run(req)` to continue inward, or return a
    /// response without calling it to short-circuit.
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

/// The rest of the pipeline, from the current stage inward.
pub struct Next {
    stages: Arc<[Arc<dyn Middleware>]>,
    router: Arc<Router>,
    index: usize,
}

impl Next {
    pub fn run(self, req: Request) -> BoxFuture {
        match self.stages.get(self.index) {
            Some(stage) => {
                let stage = Arc::clone(stage);
                let next = Self { index: self.index + 1, ..self };
                stage.call(req, next)
            }
            None => self.router.dispatch(req),
        }
    }
}

/// A [`Router`] wrapped in an ordered list of [`Middleware`] stages.
///
/// Cheap to clone: the stages and router sit behind `Arc`s.
#[derive(Clone)]
pub struct Pipeline {
    /// Outermost first.
    stages: Arc<[Arc<dyn Middleware>]>,
    router: Arc<Router>,
}

impl Pipeline {
    pub fn new(router: Router) -> Self {
        Self { stages: Arc::from(Vec::new()), router: Arc::new(router) }
    }

    /// Wrap the pipeline built so far in `stage`.
    pub fn layer(mut self, stage: impl Middleware) -> Self {
        let mut stages: Vec<Arc<dyn Middleware>> = Vec::with_capacity(self.stages.len() + 1);
        stages.push(Arc::new(stage));
        stages.extend(self.stages.iter().cloned());
        self.stages = stages.into();
        self
    }

    /// Runs `req` through every stage and the router.
    pub fn handle(&self, req: Request) -> BoxFuture {
        Next {
            stages: Arc::clone(&self.stages),
            router: Arc::clone(&self.router),
            index: 0,
        }
        .run(req)
    }
}
