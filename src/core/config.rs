//! # Distributor configuration.
//!
//! Provides [`Config`], the settings shared by every operation of a
//! [`Distributor`](crate::Distributor).
//!
//! Config is used in two ways:
//! 1. **Distributor creation**: `Distributor::builder(bridge).with_config(cfg)`
//! 2. **Watch defaults**: `WatchOptions::default()` falls back to `default_interval`
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by the bus

use std::time::Duration;

/// Default watch delivery cadence.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// Global configuration for a distributor.
///
/// ## Field semantics
/// - `default_interval`: watch delivery cadence when `WatchOptions::interval` is unset
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Delivery cadence used by watches that do not set their own interval.
    ///
    /// This is decoupled from the native sampling rate: a watch delivers the
    /// most recent reading once per interval, dropping anything in between.
    pub default_interval: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `default_interval = 10ms`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            default_interval: DEFAULT_INTERVAL,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.default_interval, Duration::from_millis(10));
        assert_eq!(cfg.bus_capacity, 1024);
    }

    #[test]
    fn test_bus_capacity_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
