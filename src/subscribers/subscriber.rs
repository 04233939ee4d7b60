//! # Event subscriber trait.
//!
//! Provides [`Subscribe`], the extension point for observing distributor events
//! (logging, metrics, diagnostics) without touching the reading path.
//!
//! Each subscriber gets a dedicated worker task fed by a bounded queue; a panic
//! inside `on_event` is caught and reported as `EventKind::SubscriberPanicked`.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use magnetovisor::{Event, EventKind, Subscribe};
//!
//! struct StreamAudit;
//!
//! #[async_trait]
//! impl Subscribe for StreamAudit {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::StreamStarted | EventKind::StreamStopped) {
//!             // record the transition
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "stream-audit" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of distributor events.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing only overflows this subscriber's queue; readings are unaffected.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event, in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in overflow/panic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity (clamped to a minimum of 1).
    ///
    /// Reading events arrive at the native sampling rate, so keep this generous.
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
