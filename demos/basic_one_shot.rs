//! # Example: basic_one_shot
//!
//! Minimal example: two concurrent one-shot reads served by a single native stream.
//!
//! Demonstrates how to:
//! - Implement [`MagneticSensor`] for a (simulated) device.
//! - Wrap it in a [`PolledBridge`] and hand it to a [`Distributor`].
//! - Issue [`Distributor::get_current_reading`] twice and observe that both resolve
//!   from the same sample, after which the stream stops by itself.
//!
//! ## Flow
//! ```text
//! get_current_reading() ×2 ──► Distributor
//!     ├─► StreamState::begin()
//!     ├─► PolledBridge::start(sink) ──► sensor.open()
//!     ├─► sensor.next_event() ──► sink.reading(r)
//!     │     ├─► consumer #1 removed ──► on_success(r)
//!     │     └─► consumer #2 removed ──► on_success(r)
//!     └─► last consumer gone ──► PolledBridge::stop() ──► sensor.close()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example basic_one_shot
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use magnetovisor::{
    Distributor, Handlers, MagneticSensor, PolledBridge, PolledBridgeConfig, ReadOptions,
    SensorError, SensorEvent,
};
use tokio::sync::{Mutex, mpsc};

/// Simulated magnetometer producing a slowly rotating field every 50ms.
struct SimulatedSensor {
    tick: Mutex<tokio::time::Interval>,
    step: std::sync::atomic::AtomicU32,
}

impl SimulatedSensor {
    fn new() -> Self {
        Self {
            tick: Mutex::new(tokio::time::interval(Duration::from_millis(50))),
            step: Default::default(),
        }
    }
}

#[async_trait]
impl MagneticSensor for SimulatedSensor {
    async fn open(&self) -> Result<(), SensorError> {
        println!("[sensor] open");
        Ok(())
    }

    async fn next_event(&self) -> Option<SensorEvent> {
        self.tick.lock().await.tick().await;
        let n = self
            .step
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed) as f64;
        let angle = n * 0.1;
        Some(SensorEvent::Field {
            x: 40.0 * angle.cos(),
            y: 40.0 * angle.sin(),
            z: -12.5,
        })
    }

    async fn close(&self) {
        println!("[sensor] close");
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bridge = PolledBridge::new(SimulatedSensor::new(), PolledBridgeConfig::default())?;
    let dist = Distributor::builder(Arc::new(bridge)).build()?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    for who in ["compass", "calibration"] {
        let tx = tx.clone();
        dist.get_current_reading(
            Handlers::new(move |r| {
                let _ = tx.send((who, r));
            })
            .on_error(move |err| eprintln!("[{who}] error: {err}")),
            ReadOptions::default(),
        );
    }
    drop(tx);

    println!("streaming={} pending={}", dist.is_streaming(), dist.pending_reads());
    while let Some((who, r)) = rx.recv().await {
        println!("[{who}] x={:.2} y={:.2} z={:.2} ts={}", r.x, r.y, r.z, r.timestamp);
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    println!("streaming={} pending={}", dist.is_streaming(), dist.pending_reads());
    Ok(())
}
