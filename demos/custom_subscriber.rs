//! # Example: custom_subscriber
//!
//! Demonstrates how to build and attach a custom event subscriber.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Inspect [`Event`] / [`EventKind`] for stream and watch lifecycle.
//! - Wire the subscriber into [`DistributorBuilder::with_subscribers`].
//!
//! With `--features logging` the built-in `LogWriter` is attached as well.
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! cargo run --example custom_subscriber --features logging
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use magnetovisor::{
    Distributor, Event, EventKind, Handlers, NativeBridge, Reading, ReadingSink, SensorError,
    Subscribe, WatchOptions,
};

/// Counts readings and prints lifecycle transitions.
#[derive(Default)]
struct StreamStats {
    readings: AtomicU64,
}

#[async_trait]
impl Subscribe for StreamStats {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::StreamStarted => {
                println!("[stats] stream started by {}", ev.source.as_deref().unwrap_or("?"));
            }
            EventKind::StreamStopped => {
                println!(
                    "[stats] stream stopped after {} readings",
                    self.readings.load(Ordering::Relaxed)
                );
            }
            EventKind::ReadingReceived => {
                self.readings.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::WatchStarted => {
                println!(
                    "[stats] watch {} every {}ms",
                    ev.watch.as_ref().map(ToString::to_string).unwrap_or_default(),
                    ev.interval_ms.unwrap_or(0)
                );
            }
            EventKind::WatchFailed => {
                println!(
                    "[stats] watch failed: {}",
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "stream-stats"
    }
}

/// Bridge that emits a few readings and then reports a native error.
struct FlakyBridge;

impl NativeBridge for FlakyBridge {
    fn start(&self, sink: ReadingSink) {
        tokio::spawn(async move {
            for i in 0..5 {
                tokio::time::sleep(Duration::from_millis(20)).await;
                sink.reading(Reading::captured_now(i as f64, 0.0, 45.0));
            }
            sink.error(SensorError::new("SENSOR_LOST", "device disconnected"));
        });
    }

    fn stop(&self) {}

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[allow(unused_mut)]
    let mut subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(StreamStats::default())];
    #[cfg(feature = "logging")]
    subs.push(Arc::new(magnetovisor::LogWriter::new()));

    let dist = Distributor::builder(Arc::new(FlakyBridge))
        .with_subscribers(subs)
        .build()?;

    dist.watch_readings(
        Handlers::new(|r| println!("[watch] x={}", r.x))
            .on_error(|err| println!("[watch] error: {err}")),
        WatchOptions::with_interval(Duration::from_millis(30)),
    )?;

    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("watches left: {}", dist.watch_count());
    Ok(())
}
