//! # Runtime events emitted by the distributor.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Stream events**: native stream lifecycle and deliveries
//! - **Consumer events**: registrations, removals, watches
//! - **Isolation events**: panicking callbacks and subscribers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, watch id,
//! consumer counts and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use magnetovisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::NativeErrorReceived)
//!     .with_reason("PERMISSION_DENIED")
//!     .with_consumers(2);
//!
//! assert_eq!(ev.kind, EventKind::NativeErrorReceived);
//! assert_eq!(ev.reason.as_deref(), Some("PERMISSION_DENIED"));
//! assert_eq!(ev.consumers, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::WatchId;
use crate::sensor::Reading;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Stream events ===
    /// Native stream requested from the bridge (Idle → Active).
    ///
    /// Sets:
    /// - `source`: bridge name
    /// - `consumers`: consumer count at start
    StreamStarted,

    /// Native stream stopped (Active → Idle); last reading cleared.
    ///
    /// Sets:
    /// - `source`: bridge name
    StreamStopped,

    /// Native reading accepted and fanned out.
    ///
    /// Sets:
    /// - `reading`: the reading
    /// - `consumers`: size of the fan-out snapshot
    ReadingReceived,

    /// Native error fanned out.
    ///
    /// Sets:
    /// - `reason`: error display string
    /// - `consumers`: size of the fan-out snapshot
    NativeErrorReceived,

    /// Delivery from a sink whose stream already stopped; dropped.
    StaleDeliveryDropped,

    // === Consumer events ===
    /// Consumer registered.
    ///
    /// Sets:
    /// - `consumers`: count after registration
    /// - `watch`: watch id (watch records only)
    ConsumerAdded,

    /// Consumer removed.
    ///
    /// Sets:
    /// - `consumers`: count after removal
    ConsumerRemoved,

    /// Watch registered.
    ///
    /// Sets:
    /// - `watch`: watch id
    /// - `interval_ms`: delivery cadence
    WatchStarted,

    /// Watch cleared by the caller.
    ///
    /// Sets:
    /// - `watch`: watch id
    WatchCleared,

    /// Watch cancelled because the native layer reported an error.
    ///
    /// Sets:
    /// - `watch`: watch id
    /// - `reason`: error display string
    WatchFailed,

    /// All watches and consumers dropped, stream stopped.
    ///
    /// Sets:
    /// - `consumers`: number of consumers dropped
    DistributorReset,

    /// A user callback panicked; the panic was contained.
    ///
    /// Sets:
    /// - `source`: callback slot (e.g. "on_reading", "watch_on_success")
    /// - `reason`: panic message
    CallbackPanicked,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Emitting component (bridge, subscriber or callback slot name).
    pub source: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Watch the event refers to, if any.
    pub watch: Option<WatchId>,
    /// Consumer count relevant to the event.
    pub consumers: Option<usize>,
    /// Watch interval in milliseconds (compact).
    pub interval_ms: Option<u32>,
    /// Reading carried by the event.
    pub reading: Option<Reading>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            reason: None,
            watch: None,
            consumers: None,
            interval_ms: None,
            reading: None,
        }
    }

    /// Attaches the emitting component name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a watch id.
    #[inline]
    pub fn with_watch(mut self, id: &WatchId) -> Self {
        self.watch = Some(id.clone());
        self
    }

    /// Attaches a consumer count.
    #[inline]
    pub fn with_consumers(mut self, n: usize) -> Self {
        self.consumers = Some(n);
        self
    }

    /// Attaches a watch interval (stored as milliseconds).
    #[inline]
    pub fn with_interval(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.interval_ms = Some(ms);
        self
    }

    /// Attaches a reading.
    #[inline]
    pub fn with_reading(mut self, reading: Reading) -> Self {
        self.reading = Some(reading);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }

    /// Creates a callback panic event.
    #[inline]
    pub fn callback_panicked(slot: &'static str, info: String) -> Self {
        Event::new(EventKind::CallbackPanicked)
            .with_source(slot)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
