//! # Example: watch
//!
//! Two interval watches sharing one native stream, plus a one-shot read in between.
//!
//! Shows how to:
//! - Register watches with different intervals via [`WatchOptions::with_interval`].
//! - Clear them with [`Distributor::clear_watch`].
//! - Observe that the native stream only stops once the last watch is gone.
//!
//! The bridge here is a hand-written [`NativeBridge`] that pushes a sample every
//! 25ms from a spawned task, which is all a platform binding has to do.
//!
//! ## Run
//! ```bash
//! cargo run --example watch
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use magnetovisor::{
    Distributor, Handlers, NativeBridge, ReadOptions, Reading, ReadingSink, WatchOptions,
};
use tokio_util::sync::CancellationToken;

/// Bridge emitting a synthetic sample every 25ms until stopped.
#[derive(Default)]
struct TimerBridge {
    running: Mutex<Option<CancellationToken>>,
}

impl NativeBridge for TimerBridge {
    fn start(&self, sink: ReadingSink) {
        let token = CancellationToken::new();
        if let Some(old) = self.running.lock().unwrap().replace(token.clone()) {
            old.cancel();
        }
        println!("[bridge] start");

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(25));
            let mut n = 0.0_f64;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => {
                        n += 1.0;
                        sink.reading(Reading::captured_now(n, -n, 48.0));
                    }
                }
            }
        });
    }

    fn stop(&self) {
        if let Some(token) = self.running.lock().unwrap().take() {
            token.cancel();
        }
        println!("[bridge] stop");
    }

    fn name(&self) -> &'static str {
        "timer"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dist = Distributor::builder(Arc::new(TimerBridge::default())).build()?;

    let fast = dist.watch_readings(
        Handlers::new(|r| println!("[fast] x={} ts={}", r.x, r.timestamp)),
        WatchOptions::with_interval(Duration::from_millis(40)),
    )?;
    let slow = dist.watch_readings(
        Handlers::new(|r| println!("[slow] x={} ts={}", r.x, r.timestamp)),
        WatchOptions::with_interval(Duration::from_millis(150)),
    )?;
    println!("watches: fast={fast} slow={slow}");

    tokio::time::sleep(Duration::from_millis(200)).await;
    dist.get_current_reading(
        Handlers::new(|r| println!("[once] x={}", r.x)),
        ReadOptions::default(),
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    dist.clear_watch(&fast);
    println!("cleared fast, streaming={}", dist.is_streaming());

    tokio::time::sleep(Duration::from_millis(200)).await;
    dist.clear_watch(&slow);
    println!("cleared slow, streaming={}", dist.is_streaming());

    // Unknown or already-cleared ids are a no-op.
    assert!(!dist.clear_watch(&slow));
    Ok(())
}
