//! Distributor core: registration, fan-out and stream lifecycle.
//!
//! The only public API from this module is [`Distributor`] (with its builder,
//! configuration and request types). Internal modules:
//! - [`distributor`]: shared state, fan-out, start/stop decisions;
//! - [`consumer`]: consumer records with self-removal and the identity-keyed set;
//! - [`stream`]: native stream state machine (Idle/Active, last reading, generation);
//! - [`watch`]: watch ids, handles and the delivery ticker;
//! - [`request`]: caller callbacks and options;
//! - [`builder`]: distributor construction;
//! - [`config`]: distributor settings.

mod builder;
mod config;
mod consumer;
mod distributor;
mod request;
mod stream;
mod watch;

pub use builder::DistributorBuilder;
pub use config::{Config, DEFAULT_INTERVAL};
pub use distributor::Distributor;
pub use request::{ErrorCallback, Handlers, ReadOptions, ReadingCallback, WatchOptions};
pub use watch::WatchId;

pub(crate) use distributor::Shared;
