//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! built-in implementations for observing events published on the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Distributor ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                          ├──► LogWriter
//!                                                          ├──► Metrics
//!                                                          └──► Custom ...
//! ```

mod embedded;
mod subscriber;
mod subscriber_set;

pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
