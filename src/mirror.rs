//! Request mirroring.
//!
//! Turns an incoming [`Request`] into the JSON snapshots the echo endpoints
//! send back. Two builders:
//!
//! - [`RequestSnapshot::capture`]: `args`, `headers`, `origin`, `url`. Never
//!   touches the body.
//! - [`BodyEcho::capture`]: the snapshot plus `data`, `files`, `form` and
//!   `json`, for methods that carry a body.
//!
//! Decoding is best-effort throughout. A malformed query, form, multipart or
//! JSON body degrades to empty fields or a `null`; the only fatal outcomes
//! are the ones reading the body itself can produce (too large, too slow).
//!
//! Every multi-valued field goes through [`compat`](crate::compat), so a key
//! seen once renders as a string and a repeated key as an array.

use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap};
use serde::Serialize;
use tracing::debug;

use crate::compat;
use crate::error::HttpError;
use crate::multimap::OrderedMultimap;
use crate::request::Request;

// ── Response shapes ───────────────────────────────────────────────────────────

/// What the service saw of a request, minus its body.
#[derive(Clone, Debug, Serialize)]
pub struct RequestSnapshot {
    #[serde(serialize_with = "compat::serialize")]
    pub args: OrderedMultimap<String, String>,
    #[serde(serialize_with = "compat::serialize")]
    pub headers: OrderedMultimap<String, String>,
    pub origin: String,
    pub url: String,
}

/// A [`RequestSnapshot`] plus everything decoded from the body.
#[derive(Clone, Debug, Serialize)]
pub struct BodyEcho {
    #[serde(flatten)]
    pub request: RequestSnapshot,
    /// The raw body, lossily decoded as UTF-8.
    pub data: String,
    /// Multipart fields that carried a file name, by field name.
    #[serde(serialize_with = "compat::serialize")]
    pub files: OrderedMultimap<String, String>,
    #[serde(serialize_with = "compat::serialize")]
    pub form: OrderedMultimap<String, String>,
    /// The body parsed as JSON, when the content type says JSON and it parses.
    pub json: Option<serde_json::Value>,
}

/// `/headers`
#[derive(Clone, Debug, Serialize)]
pub struct HeadersEcho {
    #[serde(serialize_with = "compat::serialize")]
    pub headers: OrderedMultimap<String, String>,
}

/// `/ip`
#[derive(Clone, Debug, Serialize)]
pub struct OriginEcho {
    pub origin: String,
}

/// `/user-agent`
#[derive(Clone, Debug, Serialize)]
pub struct UserAgentEcho {
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

/// Body of a gzip-encoded mirror, before compression.
#[derive(Clone, Debug, Serialize)]
pub struct GzipEcho {
    #[serde(serialize_with = "compat::serialize")]
    pub headers: OrderedMultimap<String, String>,
    pub origin: String,
    pub gzipped: bool,
}

/// Body of a deflate-encoded mirror, before compression.
#[derive(Clone, Debug, Serialize)]
pub struct DeflateEcho {
    #[serde(serialize_with = "compat::serialize")]
    pub headers: OrderedMultimap<String, String>,
    pub origin: String,
    pub deflated: bool,
}

// ── Builders ──────────────────────────────────────────────────────────────────

impl RequestSnapshot {
    pub fn capture(req: &Request) -> Self {
        Self {
            args: req.args(),
            headers: headers(req.headers()),
            origin: origin(req),
            url: url(req),
        }
    }
}

impl GzipEcho {
    pub fn capture(req: &Request) -> Self {
        Self { headers: headers(req.headers()), origin: origin(req), gzipped: true }
    }
}

impl DeflateEcho {
    pub fn capture(req: &Request) -> Self {
        Self { headers: headers(req.headers()), origin: origin(req), deflated: true }
    }
}

impl BodyEcho {
    /// Reads the body (giving up after `within`) and decodes it according to
    /// its `Content-Type`.
    pub async fn capture(req: &mut Request, within: Duration) -> Result<Self, HttpError> {
        let request = RequestSnapshot::capture(req);
        let body = req.read_body(within).await?;
        let content_type = req.header(CONTENT_TYPE.as_str()).unwrap_or_default().to_owned();

        let mut echo = Self {
            request,
            data: String::from_utf8_lossy(&body).into_owned(),
            files: OrderedMultimap::new(),
            form: OrderedMultimap::new(),
            json: None,
        };

        match media_type(&content_type).as_str() {
            "application/x-www-form-urlencoded" => {
                echo.form = parse_query(&echo.data);
            }
            "multipart/form-data" => {
                if let Err(e) = echo.decode_multipart(&content_type, body).await {
                    debug!(error = %e, "ignoring undecodable multipart body");
                    echo.form.clear();
                    echo.files.clear();
                }
            }
            essence if essence == "application/json" || essence.ends_with("+json") => {
                echo.json = match serde_json::from_slice(&body) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!(error = %e, "ignoring undecodable json body");
                        None
                    }
                };
            }
            _ => {}
        }

        Ok(echo)
    }

    async fn decode_multipart(&mut self, content_type: &str, body: Bytes) -> Result<(), multer::Error> {
        let boundary = multer::parse_boundary(content_type)?;
        let chunks = futures::stream::once(async move { Ok::<_, Infallible>(body) });
        let mut multipart = multer::Multipart::new(chunks, boundary);

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            let is_file = field.file_name().is_some();
            let content = field.bytes().await?;
            let content = String::from_utf8_lossy(&content).into_owned();
            if is_file {
                self.files.append(name, content);
            } else {
                self.form.append(name, content);
            }
        }
        Ok(())
    }
}

// ── Pieces ────────────────────────────────────────────────────────────────────

/// Decodes an `application/x-www-form-urlencoded` string (a query string or
/// a form body). Each pair splits at its first `=`, so `q=a=b` is `q: "a=b"`
/// and a bare `flag` is `flag: ""`. `+` is a space; bad escapes are kept
/// as-is; pairs with an empty key are dropped.
pub fn parse_query(query: &str) -> OrderedMultimap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Copies every header, names in canonical form (`user-agent` → `User-Agent`),
/// repeated headers kept in arrival order.
pub fn headers(map: &HeaderMap) -> OrderedMultimap<String, String> {
    map.iter()
        .map(|(name, value)| {
            (
                canonical_header_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

/// `x-forwarded-for` → `X-Forwarded-For`.
pub fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper = c == '-';
    }
    out
}

/// The client address as the service sees it.
///
/// A non-empty `X-Forwarded-For` is returned verbatim, proxy hops and all;
/// otherwise the IP of the connection peer. No attempt is made to pick the
/// "real" client out of a forwarded chain.
pub fn origin(req: &Request) -> String {
    if let Some(forwarded) = req.header("x-forwarded-for").map(str::trim) {
        if !forwarded.is_empty() {
            return forwarded.to_owned();
        }
    }
    req.remote_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default()
}

/// Rebuilds the URL the client used to reach the service.
///
/// The scheme honours `X-Forwarded-Proto`, `X-Forwarded-Protocol` and
/// `X-Forwarded-Ssl: on` from a TLS-terminating proxy. With no host known at
/// all the result is relative (path and query only).
pub fn url(req: &Request) -> String {
    let path_and_query = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
    let host = req
        .header("host")
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .unwrap_or_default();

    if host.is_empty() {
        return path_and_query.to_owned();
    }
    format!("{}://{host}{path_and_query}", scheme(req))
}

fn scheme(req: &Request) -> String {
    for name in ["x-forwarded-proto", "x-forwarded-protocol"] {
        if let Some(proto) = req.header(name).map(str::trim).filter(|p| !p.is_empty()) {
            return proto.to_ascii_lowercase();
        }
    }
    if req.header("x-forwarded-ssl").is_some_and(|v| v.eq_ignore_ascii_case("on")) {
        return "https".to_owned();
    }
    req.uri().scheme_str().unwrap_or("http").to_owned()
}

/// `multipart/form-data; boundary=x` → `multipart/form-data`.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
