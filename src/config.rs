//! Server-wide configuration.
//!
//! Built once, then frozen: [`HttpBin::new`](crate::HttpBin::new) moves the
//! [`Config`] into an `Arc` and every handler and middleware stage reads it
//! from there. Nothing mutates it after the app is built, so concurrent
//! requests read it without locks.
//!
//! ```rust
//! use std::time::Duration;
//! use httpbin::Config;
//!
//! let config = Config::default()
//!     .max_body_size(64 * 1024)
//!     .max_duration(Duration::from_secs(5));
//! assert_eq!(config.max_body_size, 64 * 1024);
//! ```

use std::fmt;
use std::time::Duration;

use tracing::warn;

use crate::middleware::Observer;

/// Environment variable overriding [`Config::max_body_size`], in bytes.
pub const MAX_BODY_SIZE_VAR: &str = "HTTPBIN_MAX_BODY_SIZE";

/// Environment variable overriding [`Config::max_duration`], in (possibly
/// fractional) seconds.
pub const MAX_DURATION_VAR: &str = "HTTPBIN_MAX_DURATION";

/// Default cap on request body size: 1 MiB.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 1024 * 1024;

/// Default cap on how long a request may take when the client controls
/// timing (`/delay`, `/drip`, `/stream`) or trickles its body in.
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(10);

/// Default drip parameters, matching the classic httpbin service.
pub const DEFAULT_PARAMS: DefaultParams = DefaultParams {
    drip_duration: Duration::from_secs(2),
    drip_delay: Duration::from_secs(2),
    drip_num_bytes: 10,
};

/// Values endpoints fall back to when a query parameter is omitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultParams {
    /// `/drip`: time over which the bytes are spread.
    pub drip_duration: Duration,
    /// `/drip`: time before the first byte.
    pub drip_delay: Duration,
    /// `/drip`: number of bytes sent.
    pub drip_num_bytes: u64,
}

impl Default for DefaultParams {
    fn default() -> Self { DEFAULT_PARAMS }
}

/// Configuration for an [`HttpBin`](crate::HttpBin) app.
#[derive(Clone)]
pub struct Config {
    /// Largest request body accepted, in bytes. Larger bodies get `413`.
    pub max_body_size: u64,
    /// Upper bound on time spent on one request where timing is
    /// client-controlled.
    pub max_duration: Duration,
    pub default_params: DefaultParams,
    /// Called once per finished request. Invoked concurrently from many
    /// connection tasks; it must not block.
    pub observer: Option<Observer>,
}

impl Config {
    pub fn max_body_size(mut self, bytes: u64) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = duration;
        self
    }

    pub fn default_params(mut self, params: DefaultParams) -> Self {
        self.default_params = params;
        self
    }

    pub fn observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Applies [`MAX_BODY_SIZE_VAR`] and [`MAX_DURATION_VAR`] from the process
    /// environment.
    pub fn with_env(self) -> Self {
        self.with_vars(std::env::vars())
    }

    /// Applies the limit overrides found in `vars`. A value that does not
    /// parse is logged and ignored.
    pub fn with_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                MAX_BODY_SIZE_VAR => match value.parse() {
                    Ok(bytes) => self.max_body_size = bytes,
                    Err(e) => warn!(key, value, "ignoring invalid body size: {e}"),
                },
                MAX_DURATION_VAR => match value.parse::<f64>().map(Duration::try_from_secs_f64) {
                    Ok(Ok(duration)) => self.max_duration = duration,
                    _ => warn!(key, value, "ignoring invalid duration"),
                },
                _ => {}
            }
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_duration: DEFAULT_MAX_DURATION,
            default_params: DEFAULT_PARAMS,
            observer: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("max_body_size", &self.max_body_size)
            .field("max_duration", &self.max_duration)
            .field("default_params", &self.default_params)
            .field("observer", &self.observer.as_ref().map(|_| "Fn(&Observation)"))
            .finish()
    }
}
