use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::stream;
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ALLOW, CONTENT_LENGTH, CONTENT_TYPE,
    HeaderMap,
};
use http::StatusCode;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use serde_json::{Value, json};
use tokio::time::Instant;

use httpbin::middleware::{Observation, Pipeline};
use httpbin::{Config, HttpBin, Method, Request, Router};

fn app() -> Pipeline {
    HttpBin::new(Config::default()).pipeline()
}

fn peer() -> Option<SocketAddr> {
    Some("10.0.0.1:40000".parse().unwrap())
}

fn builder(method: &str, uri: &str) -> http::request::Builder {
    http::Request::builder().method(method).uri(uri).header("host", "example.test")
}

fn request(builder: http::request::Builder, body: &'static str) -> Request {
    Request::new(builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap(), peer())
}

fn get(uri: &str) -> Request {
    request(builder("GET", uri), "")
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn header(&self, name: impl http::header::AsHeaderName) -> &str {
        self.headers.get(name).unwrap().to_str().unwrap()
    }
}

async fn send(app: &Pipeline, req: Request) -> Reply {
    let (parts, body) = app.handle(req).await.into_inner().into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    Reply { status: parts.status, headers: parts.headers, body }
}

// ── Mirroring ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_mirrors_args_headers_origin_and_url() {
    let req = request(builder("GET", "/get?a=1&a=2&b=3").header("user-agent", "curl/8.5.0"), "");
    let reply = send(&app(), req).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header(CONTENT_TYPE), "application/json; encoding=utf-8");
    let body = reply.json();
    assert_eq!(body["args"], json!({"a": ["1", "2"], "b": "3"}));
    assert_eq!(body["headers"]["User-Agent"], "curl/8.5.0");
    assert_eq!(body["headers"]["Host"], "example.test");
    assert_eq!(body["origin"], "10.0.0.1");
    assert_eq!(body["url"], "http://example.test/get?a=1&a=2&b=3");
}

#[tokio::test]
async fn small_echo_endpoints() {
    let app = app();

    let req = request(builder("GET", "/user-agent").header("user-agent", "curl/8.5.0"), "");
    assert_eq!(send(&app, req).await.json(), json!({"user-agent": "curl/8.5.0"}));

    let req = request(builder("GET", "/ip").header("x-forwarded-for", "1.1.1.1, 10.0.0.9"), "");
    assert_eq!(send(&app, req).await.json(), json!({"origin": "1.1.1.1, 10.0.0.9"}));

    let req = request(builder("GET", "/headers").header("x-thing", "a").header("x-thing", "b"), "");
    assert_eq!(send(&app, req).await.json()["headers"]["X-Thing"], json!(["a", "b"]));
}

#[tokio::test]
async fn body_methods_echo_their_body() {
    let app = app();
    for (method, path) in [("POST", "/post"), ("PUT", "/put"), ("PATCH", "/patch"), ("DELETE", "/delete")] {
        let req = request(
            builder(method, path).header("content-type", "application/json"),
            r#"{"k": [1, 2]}"#,
        );
        let reply = send(&app, req).await;
        assert_eq!(reply.status, StatusCode::OK, "{method} {path}");
        let body = reply.json();
        assert_eq!(body["data"], r#"{"k": [1, 2]}"#);
        assert_eq!(body["json"], json!({"k": [1, 2]}));
        assert_eq!(body["form"], json!({}));
        assert_eq!(body["files"], json!({}));
    }
}

// ── Routing ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn wrong_method_is_405_with_allow() {
    let reply = send(&app(), request(builder("POST", "/get"), "")).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.header(ALLOW), "GET, HEAD, OPTIONS");
}

#[tokio::test]
async fn bare_suffix_paths_are_not_found() {
    let app = app();
    for path in ["/stream", "/stream/", "/delay", "/delay/", "/nope"] {
        assert_eq!(send(&app, get(path)).await.status, StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn brotli_is_not_implemented() {
    assert_eq!(send(&app(), get("/brotli")).await.status, StatusCode::NOT_IMPLEMENTED);
}

// ── Autohead ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn head_matches_get_without_a_body() {
    let app = app();
    let full = send(&app, get("/get")).await;
    let head = send(&app, request(builder("HEAD", "/get"), "")).await;

    assert_eq!(head.status, full.status);
    assert_eq!(head.header(CONTENT_TYPE), full.header(CONTENT_TYPE));
    assert_eq!(head.header(CONTENT_LENGTH), full.body.len().to_string());
    assert!(head.body.is_empty());
}

#[tokio::test]
async fn head_only_route_refuses_get() {
    let app = app();

    let head = send(&app, request(builder("HEAD", "/head"), "")).await;
    assert_eq!(head.status, StatusCode::OK);
    assert_eq!(head.header(CONTENT_TYPE), "application/json; encoding=utf-8");
    assert_ne!(head.header(CONTENT_LENGTH), "0");
    assert!(head.body.is_empty());

    let refused = send(&app, get("/head")).await;
    assert_eq!(refused.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(refused.header(ALLOW), "HEAD, OPTIONS");
}

// ── CORS ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn preflight_is_answered_before_the_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let router = Router::new().on(Method::Options, "/thing", move |_req: Request| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            StatusCode::NO_CONTENT
        }
    });
    let pipeline = Pipeline::new(router).layer(httpbin::middleware::Preflight);

    let preflight = request(
        builder("OPTIONS", "/thing")
            .header("origin", "https://app.test")
            .header("access-control-request-method", "PUT")
            .header("access-control-request-headers", "X-Custom"),
        "",
    );
    let reply = send(&pipeline, preflight).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.is_empty());
    assert_eq!(reply.header(ACCESS_CONTROL_ALLOW_ORIGIN), "https://app.test");
    assert_eq!(reply.header(ACCESS_CONTROL_ALLOW_CREDENTIALS), "true");
    assert_eq!(reply.header(ACCESS_CONTROL_ALLOW_METHODS), "GET, POST, HEAD, PUT, DELETE, PATCH, OPTIONS");
    assert_eq!(reply.header(ACCESS_CONTROL_MAX_AGE), "3600");
    assert_eq!(reply.header(ACCESS_CONTROL_ALLOW_HEADERS), "X-Custom");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Without Access-Control-Request-Method it is an ordinary OPTIONS.
    let plain = send(&pipeline, request(builder("OPTIONS", "/thing"), "")).await;
    assert_eq!(plain.status, StatusCode::NO_CONTENT);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn every_response_carries_cors_headers() {
    let app = app();
    for path in ["/get", "/nope"] {
        let reply = send(&app, get(path)).await;
        assert_eq!(reply.header(ACCESS_CONTROL_ALLOW_ORIGIN), "*", "{path}");
        assert_eq!(reply.header(ACCESS_CONTROL_ALLOW_CREDENTIALS), "true", "{path}");
    }
}

#[tokio::test]
async fn plain_options_lists_allowed_methods() {
    let reply = send(&app(), request(builder("OPTIONS", "/get"), "")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header(ALLOW), "GET, HEAD, OPTIONS");
}

// ── Body size limit ───────────────────────────────────────────────────────────

fn limited_app() -> Pipeline {
    HttpBin::new(Config::default().max_body_size(16)).pipeline()
}

fn chunked(method: &str, uri: &str, chunks: &[&'static str]) -> Request {
    let frames: Vec<Result<Frame<Bytes>, Infallible>> =
        chunks.iter().map(|c| Ok(Frame::data(Bytes::from_static(c.as_bytes())))).collect();
    let body = StreamBody::new(stream::iter(frames));
    Request::new(builder(method, uri).body(body).unwrap(), peer())
}

#[tokio::test]
async fn declared_length_at_the_limit_is_accepted() {
    let body = "0123456789abcdef";
    let req = request(builder("POST", "/post").header("content-length", body.len()), body);
    let reply = send(&limited_app(), req).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["data"], body);
}

#[tokio::test]
async fn declared_length_over_the_limit_is_413() {
    let body = "0123456789abcdefX";
    let req = request(builder("POST", "/post").header("content-length", body.len()), body);
    assert_eq!(send(&limited_app(), req).await.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn undeclared_bodies_are_limited_while_read() {
    let app = limited_app();

    let fits = send(&app, chunked("PUT", "/put", &["01234567", "89abcdef"])).await;
    assert_eq!(fits.status, StatusCode::OK);
    assert_eq!(fits.json()["data"], "0123456789abcdef");

    let over = send(&app, chunked("PUT", "/put", &["01234567", "89abcdefX"])).await;
    assert_eq!(over.status, StatusCode::PAYLOAD_TOO_LARGE);
}

// ── Observation ───────────────────────────────────────────────────────────────

fn observed_app(max_body_size: u64) -> (Pipeline, Arc<Mutex<Vec<Observation>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let config = Config::default()
        .max_body_size(max_body_size)
        .observer(Arc::new(move |o: &Observation| sink.lock().unwrap().push(o.clone())));
    (HttpBin::new(config).pipeline(), seen)
}

#[tokio::test]
async fn observer_sees_each_request_once_with_bytes_written() {
    let (app, seen) = observed_app(1024);
    let reply = send(&app, get("/get?x=1")).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, http::Method::GET);
    assert_eq!(seen[0].path, "/get");
    assert_eq!(seen[0].status, StatusCode::OK);
    assert_eq!(seen[0].bytes_written, reply.body.len() as u64);
}

#[tokio::test]
async fn observer_sees_upfront_rejections() {
    let (app, seen) = observed_app(4);
    let req = request(builder("POST", "/post").header("content-length", 10), "0123456789");
    assert_eq!(send(&app, req).await.status, StatusCode::PAYLOAD_TOO_LARGE);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test(start_paused = true)]
async fn abandoned_requests_are_still_observed() {
    let (app, seen) = observed_app(1024);
    let pending = app.handle(get("/delay/5"));
    assert!(tokio::time::timeout(Duration::from_millis(10), pending).await.is_err());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status.as_u16(), 499);
    assert_eq!(seen[0].bytes_written, 0);
}

#[tokio::test]
async fn stream_dropped_mid_body_is_observed_once_with_bytes_sent() {
    let (app, seen) = observed_app(1024);
    let mut body = app.handle(get("/stream/5")).await.into_inner().into_body();

    let mut sent = 0;
    for _ in 0..2 {
        let frame = body.frame().await.unwrap().unwrap();
        sent += frame.into_data().unwrap().len();
    }
    assert!(seen.lock().unwrap().is_empty());

    // Client goes away.
    drop(body);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status, StatusCode::OK);
    assert_eq!(seen[0].bytes_written, sent as u64);
}

// ── Streaming and timing ──────────────────────────────────────────────────────

fn lines(body: &Bytes) -> Vec<Value> {
    std::str::from_utf8(body)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn stream_writes_n_records() {
    let reply = send(&app(), get("/stream/5?k=v")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.ends_with(b"\n"));

    let records = lines(&reply.body);
    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record["id"], i);
        assert_eq!(record["args"], json!({"k": "v"}));
        assert_eq!(record["url"], "http://example.test/stream/5?k=v");
    }
}

#[tokio::test]
async fn stream_count_is_validated_and_clamped() {
    let app = app();
    assert_eq!(send(&app, get("/stream/-1")).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(send(&app, get("/stream/abc")).await.status, StatusCode::BAD_REQUEST);
    assert!(send(&app, get("/stream/0")).await.body.is_empty());
    assert_eq!(lines(&send(&app, get("/stream/1000")).await.body).len(), 100);
}

#[tokio::test(start_paused = true)]
async fn delay_is_capped_at_max_duration() {
    let app = HttpBin::new(Config::default().max_duration(Duration::from_secs(1))).pipeline();
    let start = Instant::now();
    let reply = send(&app, get("/delay/5")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["url"], "http://example.test/delay/5");
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(1), "{waited:?}");
    assert!(waited < Duration::from_secs(5), "{waited:?}");
}

#[tokio::test(start_paused = true)]
async fn drip_spreads_bytes_over_the_duration() {
    let start = Instant::now();
    let reply = send(&app(), get("/drip?numbytes=5&duration=1&delay=0.5&code=201")).await;

    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.header(CONTENT_TYPE), "application/octet-stream");
    assert_eq!(reply.header(CONTENT_LENGTH), "5");
    assert_eq!(&reply.body[..], b"*****");
    assert!(start.elapsed() >= Duration::from_millis(1300));
}

// Real clock: a drip whose schedule exactly fills max_duration must still
// deliver the length it declared.
#[tokio::test]
async fn drip_at_max_duration_delivers_its_content_length() {
    let app = HttpBin::new(Config::default().max_duration(Duration::from_secs(1))).pipeline();
    let reply = send(&app, get("/drip?numbytes=200&duration=0.9&delay=0.1")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.header(CONTENT_LENGTH), "200");
    assert_eq!(reply.body.len(), 200);
}

#[tokio::test]
async fn drip_rejects_bad_parameters() {
    let app = app();
    for query in ["numbytes=0", "numbytes=-1", "duration=8&delay=8", "code=99", "duration=soon"] {
        let reply = send(&app, get(&format!("/drip?{query}"))).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{query}");
    }
}
