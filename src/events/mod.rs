//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the distributor, its watch tickers
//! and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Distributor` (stream, consumer and watch lifecycle),
//!   watch tickers (callback panics), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the subscriber listener spawned by `DistributorBuilder`
//!   (fans out to `SubscriberSet`) and any receiver from `Distributor::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
