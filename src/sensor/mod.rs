//! Native sensor side: reading value, bridge seam and the polled reference bridge.
//!
//! - [`Reading`] one magnetometer sample
//! - [`NativeBridge`] / [`ReadingSink`] the start/stop/push boundary used by the distributor
//! - [`PolledBridge`] a bridge that drives any [`MagneticSensor`] on a tokio runtime

mod bridge;
mod polled;
mod reading;

pub use bridge::{NativeBridge, ReadingSink};
pub use polled::{Accuracy, BridgeStatus, MagneticSensor, PolledBridge, PolledBridgeConfig, SensorEvent};
pub use reading::Reading;
