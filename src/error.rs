//! Error types used by the distributor and native bridges.
//!
//! This module defines two error types:
//!
//! - [`SensorError`]: opaque error info produced by the native layer and passed
//!   through to consumers unmodified.
//! - [`DistributorError`]: errors raised synchronously by the distributor API itself.
//!
//! Both provide `as_label` for logs/metrics.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// # Error reported by the native sensor layer.
///
/// The distributor performs no interpretation of `code` or `message`; the value
/// reaches every consumer's `on_error` exactly as the bridge produced it.
///
/// # Example
/// ```
/// use magnetovisor::SensorError;
///
/// let err = SensorError::new("PERMISSION_DENIED", "user declined sensor access");
/// assert_eq!(err.code(), "PERMISSION_DENIED");
/// assert_eq!(err.to_string(), "native sensor error [PERMISSION_DENIED]: user declined sensor access");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("native sensor error [{code}]: {message}")]
pub struct SensorError {
    code: Arc<str>,
    message: Arc<str>,
}

impl SensorError {
    /// Code used by bundled bridges when the sensor cannot be registered.
    pub const FAILED_TO_START: &'static str = "FAILED_TO_START";

    /// Code used by bundled bridges when a running sensor disappears.
    pub const SENSOR_LOST: &'static str = "SENSOR_LOST";

    /// Creates a new error with a native code and a human-readable message.
    pub fn new(code: impl Into<Arc<str>>, message: impl Into<Arc<str>>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates an error carrying only a code.
    pub fn from_code(code: impl Into<Arc<str>>) -> Self {
        Self::new(code, "")
    }

    /// Creates a [`SensorError::FAILED_TO_START`] error.
    pub fn failed_to_start(message: impl Into<Arc<str>>) -> Self {
        Self::new(Self::FAILED_TO_START, message)
    }

    /// Creates a [`SensorError::SENSOR_LOST`] error.
    pub fn sensor_lost(message: impl Into<Arc<str>>) -> Self {
        Self::new(Self::SENSOR_LOST, message)
    }

    /// Native error code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Native error message (may be empty).
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self.code() {
            Self::FAILED_TO_START => "sensor_failed_to_start",
            Self::SENSOR_LOST => "sensor_lost",
            _ => "sensor_error",
        }
    }

    /// Returns true if the sensor could not be registered at all.
    pub fn is_failed_to_start(&self) -> bool {
        &*self.code == Self::FAILED_TO_START
    }
}

/// # Errors produced by the distributor API.
///
/// These are raised synchronously, before any consumer is registered.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributorError {
    /// Watch delivery interval must be strictly positive.
    #[error("watch interval must be positive, got {interval:?}")]
    InvalidInterval {
        /// The rejected interval.
        interval: Duration,
    },

    /// No tokio runtime was available to drive watch tickers or bridge tasks.
    #[error("no tokio runtime available; build inside a runtime or pass a handle")]
    NoRuntime,
}

impl DistributorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use magnetovisor::DistributorError;
    /// use std::time::Duration;
    ///
    /// let err = DistributorError::InvalidInterval { interval: Duration::ZERO };
    /// assert_eq!(err.as_label(), "distributor_invalid_interval");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DistributorError::InvalidInterval { .. } => "distributor_invalid_interval",
            DistributorError::NoRuntime => "distributor_no_runtime",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            DistributorError::InvalidInterval { interval } => {
                format!("invalid interval: {interval:?}")
            }
            DistributorError::NoRuntime => "no runtime".to_string(),
        }
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_passthrough_fields() {
        let err = SensorError::new("PERMISSION_DENIED", "denied");
        assert_eq!(err.code(), "PERMISSION_DENIED");
        assert_eq!(err.message(), "denied");
        assert_eq!(err.as_label(), "sensor_error");
        assert!(!err.is_failed_to_start());
    }

    #[test]
    fn test_failed_to_start_label() {
        let err = SensorError::failed_to_start("No sensors found to register to.");
        assert!(err.is_failed_to_start());
        assert_eq!(err.as_label(), "sensor_failed_to_start");
        assert_eq!(SensorError::sensor_lost("gone").as_label(), "sensor_lost");
    }

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*s), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*owned), "owned");
        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*other), "unknown panic");
    }
}
