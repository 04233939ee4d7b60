//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [stream-started] bridge="PolledBridge" consumers=1
//! [reading] x=12.5 y=-3.25 z=40 ts=1712345678901 consumers=2
//! [watch-started] watch=6f1c... interval=10ms
//! [native-error] err="native sensor error [FAILED_TO_START]: ..." consumers=1
//! [stream-stopped] bridge="PolledBridge"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn or_unknown(v: &Option<std::sync::Arc<str>>) -> &str {
    v.as_deref().unwrap_or("unknown")
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::StreamStarted => {
                println!(
                    "[stream-started] bridge={:?} consumers={:?}",
                    or_unknown(&e.source),
                    e.consumers
                );
            }
            EventKind::StreamStopped => {
                println!("[stream-stopped] bridge={:?}", or_unknown(&e.source));
            }
            EventKind::ReadingReceived => {
                if let Some(r) = e.reading {
                    println!(
                        "[reading] x={} y={} z={} ts={} consumers={:?}",
                        r.x, r.y, r.z, r.timestamp, e.consumers
                    );
                }
            }
            EventKind::NativeErrorReceived => {
                println!(
                    "[native-error] err={:?} consumers={:?}",
                    or_unknown(&e.reason),
                    e.consumers
                );
            }
            EventKind::StaleDeliveryDropped => {
                println!("[stale-delivery-dropped]");
            }
            EventKind::ConsumerAdded => {
                println!("[consumer-added] consumers={:?}", e.consumers);
            }
            EventKind::ConsumerRemoved => {
                println!("[consumer-removed] consumers={:?}", e.consumers);
            }
            EventKind::WatchStarted => {
                println!(
                    "[watch-started] watch={:?} interval={:?}ms",
                    e.watch.as_ref().map(ToString::to_string),
                    e.interval_ms
                );
            }
            EventKind::WatchCleared => {
                println!(
                    "[watch-cleared] watch={:?}",
                    e.watch.as_ref().map(ToString::to_string)
                );
            }
            EventKind::WatchFailed => {
                println!(
                    "[watch-failed] watch={:?} err={:?}",
                    e.watch.as_ref().map(ToString::to_string),
                    or_unknown(&e.reason)
                );
            }
            EventKind::DistributorReset => {
                println!("[reset] dropped_consumers={:?}", e.consumers);
            }
            EventKind::CallbackPanicked => {
                println!(
                    "[callback-panicked] slot={} info={}",
                    or_unknown(&e.source),
                    or_unknown(&e.reason),
                );
            }
            EventKind::SubscriberOverflow => {
                println!(
                    "[subscriber-overflow] subscriber={:?} reason={:?}",
                    or_unknown(&e.source),
                    or_unknown(&e.reason)
                );
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] subscriber={} info={}",
                    or_unknown(&e.source),
                    or_unknown(&e.reason),
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
