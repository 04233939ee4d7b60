//! Caller-supplied callbacks and per-request options.

use std::sync::Arc;
use std::time::Duration;

use crate::error::SensorError;
use crate::sensor::Reading;

/// Callback receiving readings.
pub type ReadingCallback = Arc<dyn Fn(Reading) + Send + Sync>;

/// Callback receiving native errors.
pub type ErrorCallback = Arc<dyn Fn(SensorError) + Send + Sync>;

/// Success/error callback pair for one request.
///
/// `on_success` is required; `on_error` is optional. Consumers without an error
/// callback silently drop native errors.
///
/// ## Example
/// ```rust
/// use magnetovisor::Handlers;
///
/// let handlers = Handlers::new(|r| println!("x={} y={} z={}", r.x, r.y, r.z))
///     .on_error(|e| eprintln!("sensor failed: {e}"));
/// # drop(handlers);
/// ```
#[derive(Clone)]
pub struct Handlers {
    pub(crate) on_success: ReadingCallback,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl Handlers {
    /// Creates handlers with only a success callback.
    pub fn new<F>(on_success: F) -> Self
    where
        F: Fn(Reading) + Send + Sync + 'static,
    {
        Self {
            on_success: Arc::new(on_success),
            on_error: None,
        }
    }

    /// Attaches an error callback.
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(SensorError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }
}

/// Options for [`Distributor::get_current_reading`](crate::Distributor::get_current_reading).
///
/// Currently carries nothing; reserved so the call shape matches `watch_readings`.
#[derive(Clone, Debug, Default)]
pub struct ReadOptions {}

/// Options for [`Distributor::watch_readings`](crate::Distributor::watch_readings).
#[derive(Clone, Debug, Default)]
pub struct WatchOptions {
    /// Delivery cadence (`None` = [`Config::default_interval`](crate::Config::default_interval)).
    pub interval: Option<Duration>,
}

impl WatchOptions {
    /// Options with an explicit delivery interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
        }
    }
}
