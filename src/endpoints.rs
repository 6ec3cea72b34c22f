//! Endpoint handlers.
//!
//! Each one is a thin shell over [`mirror`](crate::mirror) and
//! [`sequence`](crate::sequence). Handlers that need configuration take it as
//! their first argument; [`HttpBin::router`](crate::HttpBin::router) binds it.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use http::header::{CONTENT_LENGTH, USER_AGENT};

use crate::config::Config;
use crate::error::HttpError;
use crate::mirror::{BodyEcho, HeadersEcho, OriginEcho, RequestSnapshot, UserAgentEcho};
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::sequence::{self, MAX_STREAM_RECORDS, parse_count, parse_seconds};

/// `GET /get`, `HEAD /head`
pub async fn get(req: Request) -> Response {
    Response::json(&RequestSnapshot::capture(&req))
}

/// `POST /post`, `PUT /put`, `PATCH /patch`, `DELETE /delete`
pub async fn body_echo(config: Arc<Config>, mut req: Request) -> Result<Response, HttpError> {
    let echo = BodyEcho::capture(&mut req, config.max_duration).await?;
    Ok(Response::json(&echo))
}

/// `GET /headers`
pub async fn headers(req: Request) -> Response {
    Response::json(&HeadersEcho { headers: crate::mirror::headers(req.headers()) })
}

/// `GET /ip`
pub async fn ip(req: Request) -> Response {
    Response::json(&OriginEcho { origin: crate::mirror::origin(&req) })
}

/// `GET /user-agent`
pub async fn user_agent(req: Request) -> Response {
    let user_agent = req.header(USER_AGENT.as_str()).unwrap_or_default().to_owned();
    Response::json(&UserAgentEcho { user_agent })
}

/// `GET /stream/{n}`: `n` newline-delimited JSON records, written one at a
/// time. `n` is clamped to [`MAX_STREAM_RECORDS`].
pub async fn stream(config: Arc<Config>, req: Request) -> Result<Response, HttpError> {
    let n = parse_count(req.param("n").unwrap_or_default(), MAX_STREAM_RECORDS)?;
    let snapshot = RequestSnapshot::capture(&req);
    let records = sequence::records(snapshot, n, Duration::ZERO, config.max_duration);
    Ok(Response::builder().stream(ContentType::Json, records))
}

/// `GET /delay/{seconds}`: the mirror response, after a delay capped at
/// `max_duration`.
pub async fn delay(config: Arc<Config>, req: Request) -> Result<Response, HttpError> {
    let requested = parse_seconds(req.param("seconds").unwrap_or_default())?;
    tokio::time::sleep(requested.min(config.max_duration)).await;
    Ok(Response::json(&RequestSnapshot::capture(&req)))
}

/// `GET /drip?duration=&numbytes=&code=&delay=`
///
/// Waits `delay`, then sends `numbytes` `*` bytes spread over `duration`,
/// with status `code`. Omitted parameters come from
/// [`Config::default_params`](crate::Config::default_params).
pub async fn drip(config: Arc<Config>, req: Request) -> Result<Response, HttpError> {
    let defaults = config.default_params;
    let args = req.args();
    let arg = |name: &str| args.first(name).cloned();

    let duration = arg("duration").as_deref().map(parse_seconds).transpose()?.unwrap_or(defaults.drip_duration);
    let delay = arg("delay").as_deref().map(parse_seconds).transpose()?.unwrap_or(defaults.drip_delay);
    let num_bytes = arg("numbytes").as_deref().map(parse_num_bytes).transpose()?.unwrap_or(defaults.drip_num_bytes);
    let code = arg("code").as_deref().map(parse_status).transpose()?.unwrap_or(StatusCode::OK);

    if num_bytes > config.max_body_size {
        return Err(HttpError::bad_request(format!(
            "numbytes must be at most {}",
            config.max_body_size
        )));
    }
    if duration.checked_add(delay).is_none_or(|total| total > config.max_duration) {
        return Err(HttpError::bad_request(format!(
            "duration plus delay must not exceed {:?}",
            config.max_duration
        )));
    }

    let bytes = sequence::drip(num_bytes, duration, delay, config.max_duration);
    Ok(Response::builder()
        .status(code)
        .header(CONTENT_LENGTH.as_str(), &num_bytes.to_string())
        .stream(ContentType::OctetStream, bytes))
}

/// `/brotli`: known to the classic service, not offered here.
pub async fn not_implemented(_req: Request) -> HttpError {
    HttpError::NotImplemented
}

fn parse_num_bytes(raw: &str) -> Result<u64, HttpError> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(HttpError::bad_request(format!("numbytes must be a positive integer: {raw:?}"))),
    }
}

fn parse_status(raw: &str) -> Result<StatusCode, HttpError> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|code| (100..600).contains(code))
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| HttpError::bad_request(format!("invalid status code: {raw:?}")))
}
