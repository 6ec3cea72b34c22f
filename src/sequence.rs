//! Lazy, bounded, timed sequences.
//!
//! Streaming endpoints (`/stream/{n}`, `/drip`) do not build their body up
//! front. They describe it as a [`Sequence`]: how many items, how long to wait
//! before the first one and between the rest, and a hard deadline. The
//! sequence becomes a [`Stream`] that hyper polls one frame at a time:
//!
//! ```text
//! poll ─▶ sleep until due (delay + i·interval) ─▶ make(i) ─▶ frame i on the wire
//!   ▲                                                          │
//!   └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is produced ahead of the client, so memory stays flat no matter
//! how long the stream is.
//!
//! # Stopping
//!
//! A sequence ends, without error, when:
//! - all `count` items are out, or
//! - the next item would be due past the deadline, or
//! - the stream is dropped. hyper drops the response body when the client
//!   disconnects, which drops the pending timer with it. There is no
//!   background task to cancel.

use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::error::HttpError;
use crate::mirror::RequestSnapshot;
use crate::response::BoxError;

/// Upper bound on `/stream/{n}`.
pub const MAX_STREAM_RECORDS: usize = 100;

/// One line of an NDJSON stream: an id plus the request snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct StreamRecord<'a> {
    pub id: usize,
    #[serde(flatten)]
    pub request: &'a RequestSnapshot,
}

/// A finite, timed sequence of body chunks. See the [module docs](self).
pub struct Sequence<F> {
    count: usize,
    initial_delay: Duration,
    interval: Duration,
    origin: Instant,
    deadline: Option<Instant>,
    make: F,
}

impl<F> Sequence<F>
where
    F: FnMut(usize) -> Result<Bytes, BoxError> + Send + 'static,
{
    /// `count` items, item `i` built by `make(i)` at the moment it is due.
    pub fn new(count: usize, make: F) -> Self {
        Self {
            count,
            initial_delay: Duration::ZERO,
            interval: Duration::ZERO,
            origin: Instant::now(),
            deadline: None,
            make,
        }
    }

    /// Wait before the first item.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Wait between consecutive items.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Never produce an item due more than `max` after the sequence was
    /// created.
    pub fn max_duration(mut self, max: Duration) -> Self {
        self.deadline = self.origin.checked_add(max);
        self
    }

    /// When item `i` is due: `initial_delay + i * interval` after creation.
    /// Computed from the origin, so late wakeups do not push later items back.
    fn due(&self, i: usize) -> Option<Instant> {
        let steps = u32::try_from(i).ok()?;
        let offset = self.initial_delay.checked_add(self.interval.checked_mul(steps)?)?;
        self.origin.checked_add(offset)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, BoxError>> + Send + 'static {
        futures::stream::unfold((self, 0usize), |(mut seq, i)| async move {
            if i >= seq.count {
                return None;
            }

            let due = match (seq.due(i), seq.deadline) {
                (Some(due), Some(deadline)) if due <= deadline => due,
                (Some(due), None) => due,
                _ => {
                    debug!(emitted = i, requested = seq.count, "sequence stopped at deadline");
                    return None;
                }
            };
            tokio::time::sleep_until(due).await;

            let item = (seq.make)(i);
            Some((item, (seq, i + 1)))
        })
    }
}

/// NDJSON stream of `n` [`StreamRecord`]s for `request`, ids `0..n`.
pub fn records(
    request: RequestSnapshot,
    n: usize,
    interval: Duration,
    max_duration: Duration,
) -> impl Stream<Item = Result<Bytes, BoxError>> + Send + 'static {
    Sequence::new(n, move |id| {
        let mut line = serde_json::to_vec(&StreamRecord { id, request: &request })?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    })
    .interval(interval)
    .max_duration(max_duration)
    .into_stream()
}

/// `num_bytes` single `*` bytes: the first after `delay`, the rest spread
/// evenly across `duration`.
pub fn drip(
    num_bytes: u64,
    duration: Duration,
    delay: Duration,
    max_duration: Duration,
) -> impl Stream<Item = Result<Bytes, BoxError>> + Send + 'static {
    let count = usize::try_from(num_bytes).unwrap_or(usize::MAX);
    let pause = match u32::try_from(num_bytes) {
        Ok(n) if n > 0 => duration / n,
        _ => Duration::ZERO,
    };

    Sequence::new(count, |_| Ok(Bytes::from_static(b"*")))
        .initial_delay(delay)
        .interval(pause)
        .max_duration(max_duration)
        .into_stream()
}

/// Parses a requested item count: a non-negative integer, clamped to `max`.
///
/// Negative numbers and anything that is not an integer are a bad request.
pub fn parse_count(raw: &str, max: usize) -> Result<usize, HttpError> {
    let n: i64 = raw
        .trim()
        .parse()
        .map_err(|_| HttpError::bad_request(format!("invalid count: {raw:?}")))?;
    if n < 0 {
        return Err(HttpError::bad_request(format!("count must not be negative: {n}")));
    }
    Ok(usize::try_from(n).map_or(max, |n| n.min(max)))
}

/// Parses a duration given in (possibly fractional) seconds.
pub fn parse_seconds(raw: &str) -> Result<Duration, HttpError> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| HttpError::bad_request(format!("invalid duration: {raw:?}")))?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| HttpError::bad_request(format!("duration out of range: {raw:?}")))
}
