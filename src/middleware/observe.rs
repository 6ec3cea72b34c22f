use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use hyper::body::{Body, Frame, SizeHint};
use tokio::time::Instant;
use tracing::info;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::{BoxError, ResponseBody};

/// The record of one finished request.
#[derive(Clone, Debug)]
pub struct Observation {
    pub method: http::Method,
    pub path: String,
    /// The status actually sent, error statuses included.
    pub status: StatusCode,
    /// From the request entering the pipeline to the last body byte (or the
    /// client going away).
    pub duration: Duration,
    /// Body bytes handed to the connection.
    pub bytes_written: u64,
}

/// Callback receiving every [`Observation`].
///
/// Called from many connection tasks at once and never serialized, so it
/// must be `Sync` and should return quickly.
pub type Observer = Arc<dyn Fn(&Observation) + Send + Sync + 'static>;

/// An [`Observer`] that logs each request as a `tracing` event.
///
/// ```rust
/// use std::sync::Arc;
/// use httpbin::Config;
/// use httpbin::middleware::log_observation;
///
/// let config = Config::default().observer(Arc::new(log_observation));
/// ```
pub fn log_observation(o: &Observation) {
    info!(
        method = %o.method,
        path = %o.path,
        status = o.status.as_u16(),
        duration_ms = o.duration.as_secs_f64() * 1000.0,
        bytes = o.bytes_written,
        "request handled"
    );
}

/// Reports every request to an [`Observer`] exactly once.
///
/// The report fires when the response body is finished with: fully written,
/// or dropped because the client disconnected. Streamed responses are
/// therefore reported with the bytes that actually went out.
pub struct Observe {
    observer: Observer,
}

impl Observe {
    pub fn new(observer: Observer) -> Self {
        Self { observer }
    }
}

impl Middleware for Observe {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let mut report = Report {
            observer: Arc::clone(&self.observer),
            method: req.method().clone(),
            path: req.path().to_owned(),
            status: client_closed_request(),
            start: Instant::now(),
            written: 0,
        };

        let fut = next.run(req);
        Box::pin(async move {
            // Dropped here, unfinished, if the client leaves before a response exists.
            let mut response = fut.await;
            report.status = response.status_code();
            let inner = response.replace_body(crate::response::empty());
            response.replace_body(ResponseBody::new(ObservedBody { inner, report }));
            response
        })
    }
}

/// nginx's "client closed request": the client left before a response existed.
fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT)
}

/// An observation in progress. Delivered to the observer when dropped, which
/// makes "exactly once" a property of ownership.
struct Report {
    observer: Observer,
    method: http::Method,
    path: String,
    status: StatusCode,
    start: Instant,
    written: u64,
}

impl Drop for Report {
    fn drop(&mut self) {
        let observation = Observation {
            method: self.method.clone(),
            path: std::mem::take(&mut self.path),
            status: self.status,
            duration: self.start.elapsed(),
            bytes_written: self.written,
        };
        (self.observer)(&observation);
    }
}

/// Counts data bytes on their way to the connection.
struct ObservedBody {
    inner: ResponseBody,
    report: Report,
}

impl Body for ObservedBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let poll = Pin::new(&mut self.inner).poll_frame(cx);
        if let Poll::Ready(Some(Ok(frame))) = &poll {
            if let Some(data) = frame.data_ref() {
                self.report.written += data.len() as u64;
            }
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
