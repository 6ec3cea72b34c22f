//! Runs the full httpbin service, logging one line per request.
//!
//! Run with:
//!   cargo run --example serve                 # port 8080, or $PORT
//!   cargo run --example serve -- 9000         # or pick one
//!   HTTPBIN_MAX_BODY_SIZE=65536 HTTPBIN_MAX_DURATION=30 cargo run --example serve
//!
//! Try:
//!   curl 'http://localhost:8080/get?a=1&a=2&b=3'
//!   curl -d 'name=alice' http://localhost:8080/post
//!   curl http://localhost:8080/stream/3
//!   curl 'http://localhost:8080/drip?numbytes=5&duration=1&delay=0'
//!   curl -I http://localhost:8080/get

use std::sync::Arc;

use httpbin::middleware::log_observation;
use httpbin::{Config, HttpBin, Server};

#[tokio::main]
async fn main() -> Result<(), httpbin::Error> {
    tracing_subscriber::fmt::init();

    let port = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PORT").ok())
        .unwrap_or_else(|| "8080".to_owned());
    let config = Config::default().with_env().observer(Arc::new(log_observation));
    tracing::info!(?config, "starting");

    Server::bind(&format!("0.0.0.0:{port}"))
        .serve(HttpBin::new(config).pipeline())
        .await
}
