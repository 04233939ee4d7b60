//! Magnetometer reading value.
//!
//! A [`Reading`] is created by the native bridge for every delivered sample and
//! held by the distributor as the "last known reading" until replaced or cleared
//! when the native stream stops.

use std::time::{SystemTime, UNIX_EPOCH};

/// One magnetometer sample.
///
/// - `x`, `y`, `z`: field strength in native units (no conversion is applied)
/// - `timestamp`: capture time in milliseconds of the native clock epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Field strength along the device X axis.
    pub x: f64,
    /// Field strength along the device Y axis.
    pub y: f64,
    /// Field strength along the device Z axis.
    pub z: f64,
    /// Capture time (milliseconds).
    pub timestamp: i64,
}

impl Reading {
    /// Creates a reading with an explicit timestamp.
    pub const fn new(x: f64, y: f64, z: f64, timestamp: i64) -> Self {
        Self { x, y, z, timestamp }
    }

    /// Creates a reading stamped with the current wall-clock time.
    pub fn captured_now(x: f64, y: f64, z: f64) -> Self {
        Self::new(x, y, z, now_millis())
    }
}

/// Milliseconds since the Unix epoch (0 if the clock is before the epoch).
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().min(i64::MAX as u128) as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captured_now_is_recent() {
        let before = now_millis();
        let r = Reading::captured_now(1.0, 2.0, 3.0);
        assert!(r.timestamp >= before);
        assert_eq!((r.x, r.y, r.z), (1.0, 2.0, 3.0));
    }
}
