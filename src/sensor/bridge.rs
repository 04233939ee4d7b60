//! # Native bridge seam.
//!
//! Provides [`NativeBridge`], the boundary between the distributor and whatever
//! actually talks to the platform sensor, and [`ReadingSink`], the push channel the
//! bridge uses to hand readings and errors back.
//!
//! ## Architecture
//! ```text
//! Distributor ── start(sink) ──► NativeBridge ──► platform sensor
//!      ▲                               │
//!      └──── sink.reading(r) ──────────┤
//!      └──── sink.error(e)   ──────────┘
//! Distributor ── stop() ──────► NativeBridge
//! ```
//!
//! ## Rules
//! - `start` is only called on the Idle → Active transition; `stop` only on Active → Idle.
//! - Both are fire-and-forget; neither reports completion.
//! - A sink is bound to the stream it was issued for: once that stream stops, its
//!   deliveries are dropped even if the bridge keeps calling it.
//! - Sink calls fan out synchronously on the calling thread.

use std::sync::Weak;

use crate::core::Shared;
use crate::error::SensorError;
use crate::sensor::Reading;

/// Platform side of a magnetometer stream.
///
/// ### Implementation requirements
/// - `start` must not block; emit readings asynchronously through the sink.
/// - `stop` ends emission; later sink calls are ignored by the distributor anyway.
/// - Errors are reported through [`ReadingSink::error`] and do not end the stream.
pub trait NativeBridge: Send + Sync + 'static {
    /// Begins emitting readings/errors into `sink`.
    fn start(&self, sink: ReadingSink);

    /// Ends emission.
    fn stop(&self);

    /// Returns the bridge name used in events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Push handle given to a [`NativeBridge`] for one native stream.
///
/// Cheap to clone. Holds a weak reference to the distributor, so a bridge that
/// outlives it just delivers into the void.
#[derive(Clone)]
pub struct ReadingSink {
    pub(crate) shared: Weak<Shared>,
    pub(crate) generation: u64,
}

impl ReadingSink {
    pub(crate) fn new(shared: Weak<Shared>, generation: u64) -> Self {
        Self { shared, generation }
    }

    /// Delivers a reading to every registered consumer.
    pub fn reading(&self, reading: Reading) {
        if let Some(shared) = self.shared.upgrade() {
            shared.deliver_reading(self.generation, reading);
        }
    }

    /// Delivers a native error to every registered consumer.
    pub fn error(&self, err: SensorError) {
        if let Some(shared) = self.shared.upgrade() {
            shared.deliver_error(self.generation, err);
        }
    }

    /// Returns true once the stream this sink belongs to has stopped
    /// (or the distributor is gone).
    pub fn is_closed(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => !shared.accepts(self.generation),
            None => true,
        }
    }
}

impl std::fmt::Debug for ReadingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingSink")
            .field("generation", &self.generation)
            .finish()
    }
}
