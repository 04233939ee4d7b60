//! # magnetovisor
//!
//! **Magnetovisor** shares one native magnetometer stream between any number of
//! independent consumers.
//!
//! Callers either ask for the next reading once ([`Distributor::get_current_reading`])
//! or subscribe to periodic delivery ([`Distributor::watch_readings`]). The
//! distributor starts the native stream when the first consumer arrives, stops it
//! when the last one leaves, and never runs more than one stream at a time.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   get_current_reading()     watch_readings()        clear_watch(id)
//!            │                       │                       │
//!            ▼                       ▼                       ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Distributor                                                      │
//! │  - ConsumerSet (one-shot + watch records, identity keyed)         │
//! │  - StreamState (Idle/Active, last reading, generation)            │
//! │  - WatchRegistry (WatchId → ticker token)                         │
//! └──────┬──────────────────────────────▲─────────────────────┬───────┘
//!        │ start(sink) / stop()         │ sink.reading(r)     │
//!        ▼                              │ sink.error(e)       │ ticks
//! ┌──────────────────────┐              │             ┌───────▼────────┐
//! │  NativeBridge        │──────────────┘             │ watch ticker   │
//! │  (e.g. PolledBridge) │                            │ (per WatchId)  │
//! └──────────────────────┘                            └────────────────┘
//!        │
//!        │ Publishes events (StreamStarted, ReadingReceived, WatchCleared, ...)
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! │                  (capacity: Config::bus_capacity)                 │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                        subscriber listener ──► SubscriberSet
//!                                                ├──► worker1 ──► sub1.on_event()
//!                                                └──► workerN ──► subN.on_event()
//! ```
//!
//! ### Lifecycle
//! ```text
//! first consumer registered ──► StreamState::begin() ──► bridge.start(sink)
//!
//! on sink.reading(r):
//!   ├─► last = r
//!   └─► every registered consumer: one-shots resolve and remove themselves
//!
//! on sink.error(e):
//!   └─► every registered consumer: one-shots resolve, watches are cleared
//!
//! last consumer removed ──► StreamState::end() ──► bridge.stop(), last = None
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                        |
//! |-------------------|-------------------------------------------------------------|-------------------------------------------|
//! | **Distribution**  | One-shot reads and interval watches over one native stream. | [`Distributor`], [`Handlers`], [`WatchId`] |
//! | **Native seam**   | Plug in whatever talks to the platform sensor.              | [`NativeBridge`], [`ReadingSink`]         |
//! | **Polled bridge** | Reference bridge over an async sensor port.                 | [`PolledBridge`], [`MagneticSensor`]      |
//! | **Subscriber API**| Observe stream, consumer and watch lifecycle events.        | [`Subscribe`], [`Event`], [`EventKind`]   |
//! | **Errors**        | Native errors passed through, typed API errors.             | [`SensorError`], [`DistributorError`]     |
//! | **Configuration** | Default watch interval and bus capacity.                    | [`Config`], [`PolledBridgeConfig`]        |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use magnetovisor::{Distributor, Handlers, NativeBridge, ReadOptions, Reading, ReadingSink};
//!
//! /// Bridge that emits one fixed reading as soon as it is started.
//! struct Fixed;
//!
//! impl NativeBridge for Fixed {
//!     fn start(&self, sink: ReadingSink) {
//!         tokio::spawn(async move { sink.reading(Reading::new(12.0, -3.5, 40.1, 1)) });
//!     }
//!     fn stop(&self) {}
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dist = Distributor::builder(Arc::new(Fixed)).build()?;
//!
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!     let tx = Mutex::new(Some(tx));
//!     dist.get_current_reading(
//!         Handlers::new(move |r| {
//!             if let Some(tx) = tx.lock().unwrap().take() {
//!                 let _ = tx.send(r);
//!             }
//!         }),
//!         ReadOptions::default(),
//!     );
//!
//!     let reading = rx.await?;
//!     assert_eq!(reading.x, 12.0);
//!     assert!(!dist.is_streaming());
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod sensor;
mod subscribers;

// ---- Public re-exports ----

pub use core::{
    Config, DEFAULT_INTERVAL, Distributor, DistributorBuilder, ErrorCallback, Handlers,
    ReadOptions, ReadingCallback, WatchId, WatchOptions,
};
pub use error::{DistributorError, SensorError};
pub use events::{Event, EventKind};
pub use sensor::{
    Accuracy, BridgeStatus, MagneticSensor, NativeBridge, PolledBridge, PolledBridgeConfig,
    Reading, ReadingSink, SensorEvent,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
