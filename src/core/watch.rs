//! # Watch registry and delivery ticker.
//!
//! A watch is a recurring consumer with its own delivery cadence. The registry
//! maps each caller-visible [`WatchId`] to a [`WatchHandle`] that owns:
//! - the watch's keep-alive consumer record,
//! - the cancellation token of its ticker task.
//!
//! ## Architecture
//! ```text
//! watch_readings() ──► WatchRegistry.insert(id, handle)
//!                  └─► spawn run_ticker(token)
//!
//! run_ticker:
//! loop {
//!   ├─► select! { token.cancelled() → exit, interval.tick() }
//!   └─► last_reading()? ─► on_success(reading)   (skipped while none)
//! }
//!
//! clear_watch(id) / native error ──► WatchRegistry.remove(id)
//!                                   ├─► token.cancel()
//!                                   └─► remove_consumer(record)
//! ```
//!
//! ## Rules
//! - Last-value delivery: each tick sends the most recent reading, never a queue.
//! - The first tick fires one interval after registration.
//! - Missed ticks are skipped, not bursted.
//! - Cancellation is checked before every delivery.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::select;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::Shared;
use crate::core::consumer::ConsumerRecord;
use crate::core::request::ReadingCallback;

/// Caller-visible handle of a recurring watch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchId(Uuid);

impl WatchId {
    /// Generates a fresh random id.
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Live watch bookkeeping.
pub(crate) struct WatchHandle {
    /// Keep-alive record registered in the consumer set.
    pub(crate) record: Arc<ConsumerRecord>,
    /// Cancels the ticker task.
    pub(crate) cancel: CancellationToken,
    /// Delivery cadence.
    pub(crate) interval: Duration,
}

/// Live watches by id.
#[derive(Default)]
pub(crate) struct WatchRegistry {
    watches: HashMap<WatchId, WatchHandle>,
}

impl WatchRegistry {
    pub(crate) fn insert(&mut self, id: WatchId, handle: WatchHandle) {
        self.watches.insert(id, handle);
    }

    /// Removes the handle and cancels its ticker.
    pub(crate) fn remove(&mut self, id: &WatchId) -> Option<WatchHandle> {
        let handle = self.watches.remove(id)?;
        handle.cancel.cancel();
        Some(handle)
    }

    pub(crate) fn get(&self, id: &WatchId) -> Option<&WatchHandle> {
        self.watches.get(id)
    }

    /// Removes every handle, cancelling all tickers.
    pub(crate) fn drain(&mut self) -> Vec<(WatchId, WatchHandle)> {
        let handles: Vec<_> = self.watches.drain().collect();
        for (_, h) in &handles {
            h.cancel.cancel();
        }
        handles
    }

    pub(crate) fn len(&self) -> usize {
        self.watches.len()
    }
}

/// Delivers the last known reading every `interval` until `cancel` fires.
pub(crate) async fn run_ticker(
    shared: Weak<Shared>,
    first: Instant,
    interval: Duration,
    on_success: ReadingCallback,
    cancel: CancellationToken,
) {
    let mut ticks = time::interval_at(first, interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => {}
        }

        let Some(shared) = shared.upgrade() else {
            break;
        };
        if cancel.is_cancelled() {
            break;
        }
        if let Some(reading) = shared.last_reading() {
            shared.guarded("watch_on_success", || on_success(reading));
        }
    }
}
