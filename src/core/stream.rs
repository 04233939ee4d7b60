//! Native stream lifecycle state.
//!
//! ```text
//! Idle ──begin()──► Active(generation n) ──end()──► Idle
//!                     │  ▲
//!                     └──┘ record(n, reading)
//! ```
//!
//! ## Rules
//! - `begin()` is strictly idempotent: only Idle → Active yields a generation.
//! - `last` is `Some` only while active; `end()` clears it.
//! - Deliveries tagged with an older generation are rejected.

use crate::sensor::Reading;

#[derive(Debug, Default)]
pub(crate) struct StreamState {
    active: bool,
    last: Option<Reading>,
    generation: u64,
}

impl StreamState {
    /// Marks the stream active. Returns the new generation if a native start is needed.
    pub(crate) fn begin(&mut self) -> Option<u64> {
        if self.active {
            return None;
        }
        self.active = true;
        self.generation += 1;
        Some(self.generation)
    }

    /// Marks the stream idle. Returns true if a native stop is needed.
    pub(crate) fn end(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.last = None;
        true
    }

    pub(crate) fn accepts(&self, generation: u64) -> bool {
        self.active && self.generation == generation
    }

    /// Stores `reading` as the last known value if `generation` is current.
    pub(crate) fn record(&mut self, generation: u64, reading: Reading) -> bool {
        if !self.accepts(generation) {
            return false;
        }
        self.last = Some(reading);
        true
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn last(&self) -> Option<Reading> {
        self.last
    }
}
