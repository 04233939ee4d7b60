//! # Distributor: one native stream, many logical consumers.
//!
//! The [`Distributor`] owns at most one active native magnetometer stream and
//! multiplexes it to any number of one-shot reads and recurring watches.
//!
//! ## Architecture
//! ```text
//! get_current_reading() ─┐                      ┌─► NativeBridge::start(sink)   (Idle → Active)
//! watch_readings()      ─┼─► register record ───┤
//!                        │   (one critical       └─► nothing                    (already Active)
//!                        │    section)
//! clear_watch()         ─┴─► remove record ─────┬─► NativeBridge::stop()        (Active → Idle)
//!                                               └─► nothing                     (consumers left)
//!
//! sink.reading(r) ─► last = r ─► snapshot(consumers) ─► record.on_reading(r) for each
//! sink.error(e)   ─────────────► snapshot(consumers) ─► record.on_error(e)   for each
//! ```
//!
//! ## Rules
//! - **Register-then-start**: a record is inserted and the stream marked active in the
//!   same critical section; the native `start` is issued after the lock is released.
//! - **Ordered bridge calls**: every Idle/Active transition queues its `start`/`stop`
//!   under the lock; one caller at a time drains the queue, so the bridge sees calls
//!   in transition order even when transitions race on different threads.
//! - **No lock across callbacks**: user callbacks, bridge calls and event publishing
//!   never run under the state lock, so callbacks may re-enter the distributor.
//! - **Snapshot fan-out**: records added during a fan-out miss the current reading but
//!   see the next one; records removed during a fan-out are still visited, and their
//!   self-removal guard keeps delivery at most once.
//! - **Contained panics**: a panicking user callback is reported as `CallbackPanicked`
//!   and never unwinds into the bridge.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::builder::DistributorBuilder;
use crate::core::config::Config;
use crate::core::consumer::{ConsumerKind, ConsumerRecord, ConsumerSet};
use crate::core::request::{Handlers, ReadOptions, WatchOptions};
use crate::core::stream::StreamState;
use crate::core::watch::{self, WatchHandle, WatchId, WatchRegistry};
use crate::error::{DistributorError, SensorError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::sensor::{NativeBridge, Reading, ReadingSink};

/// Bridge call queued by a stream transition.
enum BridgeOp {
    Start { sink: ReadingSink, consumers: usize },
    Stop,
}

/// Everything guarded by the distributor lock.
#[derive(Default)]
struct State {
    consumers: ConsumerSet,
    stream: StreamState,
    watches: WatchRegistry,
    ops: VecDeque<BridgeOp>,
    draining: bool,
}

/// Outcome of removing one record.
struct Detached {
    removed: bool,
    stop: bool,
    remaining: usize,
}

/// Releases the drain slot if a bridge call unwinds.
struct DrainGuard<'a>(&'a Shared);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

impl State {
    fn detach(&mut self, record: &Arc<ConsumerRecord>) -> Detached {
        let removed = self.consumers.remove(record);
        let stop = removed && self.consumers.is_empty() && self.stream.end();
        if stop {
            self.ops.push_back(BridgeOp::Stop);
        }
        Detached {
            removed,
            stop,
            remaining: self.consumers.len(),
        }
    }
}

/// State shared between the distributor, its sinks, tickers and consumer records.
pub(crate) struct Shared {
    cfg: Config,
    bridge: Arc<dyn NativeBridge>,
    bus: Bus,
    runtime: Handle,
    runtime_token: CancellationToken,
    state: Mutex<State>,
}

impl Shared {
    pub(crate) fn new(
        cfg: Config,
        bridge: Arc<dyn NativeBridge>,
        bus: Bus,
        runtime: Handle,
        runtime_token: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            bridge,
            bus,
            runtime,
            runtime_token,
            state: Mutex::new(State::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Callbacks never run under this lock, so poisoning cannot leave it half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs a user callback, converting a panic into a `CallbackPanicked` event.
    pub(crate) fn guarded(&self, slot: &'static str, f: impl FnOnce()) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
            self.bus
                .publish(Event::callback_panicked(slot, panic_message(&*payload)));
        }
    }

    pub(crate) fn accepts(&self, generation: u64) -> bool {
        self.lock().stream.accepts(generation)
    }

    pub(crate) fn last_reading(&self) -> Option<Reading> {
        self.lock().stream.last()
    }

    // ---------------------------
    // Native stream
    // ---------------------------

    /// Queues the native `start` for a stream that just became active.
    fn queue_start(self: &Arc<Self>, st: &mut State, generation: u64) {
        st.ops.push_back(BridgeOp::Start {
            sink: ReadingSink::new(Arc::downgrade(self), generation),
            consumers: st.consumers.len(),
        });
    }

    /// Issues queued bridge calls in order.
    ///
    /// Only one caller drains at a time; a caller that finds the queue already being
    /// drained (another thread, or a bridge re-entering from `start`) returns and
    /// leaves its calls to the active drainer.
    fn run_bridge_ops(&self) {
        {
            let mut st = self.lock();
            if st.draining {
                return;
            }
            st.draining = true;
        }
        let _guard = DrainGuard(self);

        loop {
            let op = {
                let mut st = self.lock();
                match st.ops.pop_front() {
                    Some(op) => op,
                    None => {
                        st.draining = false;
                        return;
                    }
                }
            };
            match op {
                BridgeOp::Start { sink, consumers } => {
                    self.bus.publish(
                        Event::new(EventKind::StreamStarted)
                            .with_source(self.bridge.name())
                            .with_consumers(consumers),
                    );
                    self.bridge.start(sink);
                }
                BridgeOp::Stop => {
                    self.bridge.stop();
                    self.bus.publish(
                        Event::new(EventKind::StreamStopped).with_source(self.bridge.name()),
                    );
                }
            }
        }
    }

    pub(crate) fn deliver_reading(&self, generation: u64, reading: Reading) {
        let snapshot = {
            let mut st = self.lock();
            if !st.stream.record(generation, reading) {
                None
            } else {
                Some(st.consumers.snapshot())
            }
        };
        let Some(snapshot) = snapshot else {
            self.bus.publish(Event::new(EventKind::StaleDeliveryDropped));
            return;
        };

        if !self.bus.is_idle() {
            self.bus.publish(
                Event::new(EventKind::ReadingReceived)
                    .with_reading(reading)
                    .with_consumers(snapshot.len()),
            );
        }
        for record in &snapshot {
            self.guarded("on_reading", || record.on_reading(reading));
        }
    }

    pub(crate) fn deliver_error(&self, generation: u64, err: SensorError) {
        let snapshot = {
            let st = self.lock();
            st.stream
                .accepts(generation)
                .then(|| st.consumers.snapshot())
        };
        let Some(snapshot) = snapshot else {
            self.bus.publish(Event::new(EventKind::StaleDeliveryDropped));
            return;
        };

        self.bus.publish(
            Event::new(EventKind::NativeErrorReceived)
                .with_reason(err.to_string())
                .with_consumers(snapshot.len()),
        );
        for record in &snapshot {
            let err = err.clone();
            self.guarded("on_error", || record.on_error(err));
        }
    }

    // ---------------------------
    // Consumers
    // ---------------------------

    /// Removes `record`; stops the stream if it was the last one.
    ///
    /// Returns false if the record was already gone.
    pub(crate) fn remove_consumer(&self, record: &Arc<ConsumerRecord>) -> bool {
        let detached = self.lock().detach(record);
        self.after_detach(&detached);
        detached.removed
    }

    fn after_detach(&self, detached: &Detached) {
        if detached.removed {
            self.bus.publish(
                Event::new(EventKind::ConsumerRemoved).with_consumers(detached.remaining),
            );
        }
        if detached.stop {
            self.run_bridge_ops();
        }
    }

    fn get_current_reading(self: &Arc<Self>, handlers: Handlers) {
        let record = ConsumerRecord::one_shot(Arc::downgrade(self), handlers);

        let count = {
            let mut st = self.lock();
            st.consumers.insert(record);
            if let Some(generation) = st.stream.begin() {
                self.queue_start(&mut st, generation);
            }
            st.consumers.len()
        };

        self.bus
            .publish(Event::new(EventKind::ConsumerAdded).with_consumers(count));
        self.run_bridge_ops();
    }

    // ---------------------------
    // Watches
    // ---------------------------

    fn watch_readings(
        self: &Arc<Self>,
        handlers: Handlers,
        options: WatchOptions,
    ) -> Result<WatchId, DistributorError> {
        let interval = options.interval.unwrap_or(self.cfg.default_interval);
        let first = match Instant::now().checked_add(interval) {
            Some(first) if !interval.is_zero() => first,
            _ => return Err(DistributorError::InvalidInterval { interval }),
        };

        let Handlers {
            on_success,
            on_error,
        } = handlers;
        let id = WatchId::new();
        let record = ConsumerRecord::watch(Arc::downgrade(self), id.clone(), on_error);
        let cancel = self.runtime_token.child_token();

        let (existing, count) = {
            let mut st = self.lock();
            st.consumers.insert(Arc::clone(&record));
            st.watches.insert(
                id.clone(),
                WatchHandle {
                    record,
                    cancel: cancel.clone(),
                    interval,
                },
            );
            let existing = if st.stream.is_active() {
                st.stream.last()
            } else {
                None
            };
            if let Some(generation) = st.stream.begin() {
                self.queue_start(&mut st, generation);
            }
            (existing, st.consumers.len())
        };

        self.runtime.spawn(watch::run_ticker(
            Arc::downgrade(self),
            first,
            interval,
            Arc::clone(&on_success),
            cancel,
        ));

        self.bus.publish(
            Event::new(EventKind::WatchStarted)
                .with_watch(&id)
                .with_interval(interval),
        );
        self.bus.publish(
            Event::new(EventKind::ConsumerAdded)
                .with_watch(&id)
                .with_consumers(count),
        );

        if let Some(reading) = existing {
            self.guarded("watch_on_success", || on_success(reading));
        }
        self.run_bridge_ops();
        Ok(id)
    }

    fn detach_watch(&self, id: &WatchId, event: Event) -> bool {
        let (handle, detached) = {
            let mut st = self.lock();
            let Some(handle) = st.watches.remove(id) else {
                return false;
            };
            let detached = st.detach(&handle.record);
            (handle, detached)
        };

        self.bus.publish(event.with_watch(id));
        self.after_detach(&detached);
        drop(handle);
        true
    }

    fn clear_watch(&self, id: &WatchId) -> bool {
        self.detach_watch(id, Event::new(EventKind::WatchCleared))
    }

    /// Cancels a watch after a native error. Returns false if it was already gone.
    pub(crate) fn fail_watch(&self, id: &WatchId, err: &SensorError) -> bool {
        self.detach_watch(
            id,
            Event::new(EventKind::WatchFailed).with_reason(err.to_string()),
        )
    }

    // ---------------------------
    // Teardown
    // ---------------------------

    fn reset(&self) {
        let (watches, records) = {
            let mut st = self.lock();
            let watches = st.watches.drain();
            let records = st.consumers.take_all();
            if st.stream.end() {
                st.ops.push_back(BridgeOp::Stop);
            }
            (watches, records)
        };

        self.bus.publish(
            Event::new(EventKind::DistributorReset).with_consumers(records.len()),
        );
        drop(watches);
        drop(records);
        self.run_bridge_ops();
    }
}

/// Shared magnetometer stream with fan-out to one-shot reads and watches.
///
/// Built with [`Distributor::builder`]. Dropping the distributor cancels every
/// watch and stops the native stream.
///
/// ## Example
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use magnetovisor::{Distributor, Handlers, NativeBridge, ReadOptions, Reading, ReadingSink, WatchOptions};
///
/// struct Fixed;
///
/// impl NativeBridge for Fixed {
///     fn start(&self, sink: ReadingSink) {
///         sink.reading(Reading::new(1.0, 2.0, 3.0, 100));
///     }
///     fn stop(&self) {}
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let dist = Distributor::builder(Arc::new(Fixed)).build()?;
///
///     dist.get_current_reading(Handlers::new(|r| println!("once: {r:?}")), ReadOptions::default());
///
///     let id = dist.watch_readings(
///         Handlers::new(|r| println!("tick: {r:?}")),
///         WatchOptions::with_interval(Duration::from_millis(50)),
///     )?;
///     tokio::time::sleep(Duration::from_millis(120)).await;
///     dist.clear_watch(&id);
///     Ok(())
/// }
/// ```
pub struct Distributor {
    shared: Arc<Shared>,
}

impl Distributor {
    /// Starts building a distributor on top of `bridge`.
    pub fn builder(bridge: Arc<dyn NativeBridge>) -> DistributorBuilder {
        DistributorBuilder::new(bridge)
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Requests a single reading.
    ///
    /// `on_success` fires at most once, with the first reading delivered after
    /// registration; the request is fully detached before it runs. `on_error`
    /// (if set) fires at most once instead, on the first native error.
    ///
    /// Starts the native stream if it is idle; never stops a running one.
    pub fn get_current_reading(&self, handlers: Handlers, _options: ReadOptions) {
        self.shared.get_current_reading(handlers);
    }

    /// Starts a recurring watch delivering the last known reading every interval.
    ///
    /// - Ticks before the first reading are skipped; readings between ticks are dropped.
    /// - If the stream is already running and a reading exists, it is delivered once
    ///   synchronously before this returns.
    /// - A native error cancels the watch and is forwarded to `on_error` once.
    ///
    /// ### Errors
    /// [`DistributorError::InvalidInterval`] for a zero interval; nothing is registered.
    pub fn watch_readings(
        &self,
        handlers: Handlers,
        options: WatchOptions,
    ) -> Result<WatchId, DistributorError> {
        self.shared.watch_readings(handlers, options)
    }

    /// Cancels a watch. Unknown or already-cleared ids are ignored.
    ///
    /// Returns true if a live watch was cleared.
    pub fn clear_watch(&self, id: &WatchId) -> bool {
        self.shared.clear_watch(id)
    }

    /// Cancels every watch, drops every pending read and stops the native stream.
    pub fn reset(&self) {
        self.shared.reset();
    }

    /// Returns true while the native stream is active.
    pub fn is_streaming(&self) -> bool {
        self.shared.lock().stream.is_active()
    }

    /// Number of registered consumers (pending one-shot reads plus live watches).
    pub fn consumer_count(&self) -> usize {
        self.shared.lock().consumers.len()
    }

    /// Number of live watches.
    pub fn watch_count(&self) -> usize {
        self.shared.lock().watches.len()
    }

    /// Delivery interval of a live watch.
    pub fn watch_interval(&self, id: &WatchId) -> Option<Duration> {
        self.shared.lock().watches.get(id).map(|h| h.interval)
    }

    /// Number of pending one-shot reads.
    pub fn pending_reads(&self) -> usize {
        self.shared
            .lock()
            .consumers
            .snapshot()
            .iter()
            .filter(|r| *r.kind() == ConsumerKind::OneShot)
            .count()
    }

    /// Last known reading of the active stream.
    pub fn last_reading(&self) -> Option<Reading> {
        self.shared.last_reading()
    }

    /// Creates a receiver for subsequent distributor events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }
}

impl Drop for Distributor {
    fn drop(&mut self) {
        self.shared.reset();
        self.shared.runtime_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Bridge driven by the test: records start/stop and exposes the last sink.
    #[derive(Default)]
    struct ManualBridge {
        starts: AtomicUsize,
        stops: AtomicUsize,
        sink: Mutex<Option<ReadingSink>>,
    }

    impl ManualBridge {
        fn emit(&self, reading: Reading) {
            let sink = self.sink.lock().unwrap().clone();
            if let Some(sink) = sink {
                sink.reading(reading);
            }
        }

        fn fail(&self, err: SensorError) {
            let sink = self.sink.lock().unwrap().clone();
            if let Some(sink) = sink {
                sink.error(err);
            }
        }

        fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }

        fn stops(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    impl NativeBridge for ManualBridge {
        fn start(&self, sink: ReadingSink) {
            self.starts.fetch_add(1, Ordering::SeqCst);
            *self.sink.lock().unwrap() = Some(sink);
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "manual"
        }
    }

    fn setup() -> (Arc<ManualBridge>, Distributor) {
        let bridge = Arc::new(ManualBridge::default());
        let dist = Distributor::builder(bridge.clone())
            .build()
            .expect("inside runtime");
        (bridge, dist)
    }

    fn collector() -> (Arc<Mutex<Vec<Reading>>>, Handlers) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        (seen, Handlers::new(move |r| s.lock().unwrap().push(r)))
    }

    fn reading(n: f64) -> Reading {
        Reading::new(n, n * 2.0, n * 3.0, n as i64 * 100)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_fan_out_empties_set() {
        let (bridge, dist) = setup();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let h = hits.clone();
            dist.get_current_reading(
                Handlers::new(move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                }),
                ReadOptions::default(),
            );
        }
        assert_eq!(bridge.starts(), 1, "start must be idempotent");
        assert_eq!(dist.pending_reads(), 5);

        bridge.emit(reading(1.0));
        bridge.emit(reading(2.0));

        assert_eq!(hits.load(Ordering::SeqCst), 5);
        assert_eq!(dist.consumer_count(), 0);
        assert!(!dist.is_streaming());
        assert_eq!(bridge.stops(), 1);
        assert_eq!(dist.last_reading(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_error_only_reaches_error_callback() {
        let (bridge, dist) = setup();
        let (seen, handlers) = collector();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = errors.clone();

        dist.get_current_reading(
            handlers.on_error(move |err| e.lock().unwrap().push(err)),
            ReadOptions::default(),
        );
        bridge.fail(SensorError::from_code("PERMISSION_DENIED"));
        bridge.emit(reading(1.0));

        assert!(seen.lock().unwrap().is_empty());
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "PERMISSION_DENIED");
        assert_eq!(bridge.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_without_callback_is_dropped() {
        let (bridge, dist) = setup();
        let (seen, handlers) = collector();
        dist.get_current_reading(handlers, ReadOptions::default());

        bridge.fail(SensorError::from_code("HARDWARE_UNAVAILABLE"));

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(dist.consumer_count(), 0);
        assert!(!dist.is_streaming());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentrant_read_from_callback_sees_clean_state() {
        let (bridge, dist) = setup();
        let dist = Arc::new(dist);
        let observed = Arc::new(Mutex::new(None));
        let second = Arc::new(AtomicUsize::new(0));

        let (d, o, s) = (Arc::downgrade(&dist), observed.clone(), second.clone());
        dist.get_current_reading(
            Handlers::new(move |_| {
                let Some(d) = d.upgrade() else { return };
                *o.lock().unwrap() = Some((d.consumer_count(), d.is_streaming()));
                let s = s.clone();
                d.get_current_reading(
                    Handlers::new(move |_| {
                        s.fetch_add(1, Ordering::SeqCst);
                    }),
                    ReadOptions::default(),
                );
            }),
            ReadOptions::default(),
        );

        bridge.emit(reading(1.0));
        assert_eq!(*observed.lock().unwrap(), Some((0, false)));
        assert_eq!(second.load(Ordering::SeqCst), 0, "new consumer misses the current reading");
        assert_eq!(bridge.starts(), 2);

        bridge.emit(reading(2.0));
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.stops(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_delivers_last_value_per_tick() {
        let (bridge, dist) = setup();
        let (seen, handlers) = collector();
        let id = dist
            .watch_readings(handlers, WatchOptions::with_interval(Duration::from_millis(10)))
            .unwrap();
        assert_eq!(bridge.starts(), 1);
        assert_eq!(dist.watch_interval(&id), Some(Duration::from_millis(10)));

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(seen.lock().unwrap().is_empty(), "no reading yet, tick skipped");

        bridge.emit(reading(1.0));
        bridge.emit(reading(2.0));
        bridge.emit(reading(3.0));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec![reading(3.0)]);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.lock().unwrap().len(), 3, "last value repeats once per tick");

        assert!(dist.clear_watch(&id));
        assert!(!dist.clear_watch(&id), "second clear is a no-op");
        assert_eq!(bridge.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_watch_gets_nothing_more() {
        let (bridge, dist) = setup();
        let (seen, handlers) = collector();
        let id = dist
            .watch_readings(handlers, WatchOptions::with_interval(Duration::from_millis(10)))
            .unwrap();

        bridge.emit(reading(1.0));
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(*seen.lock().unwrap(), vec![reading(1.0)]);

        dist.clear_watch(&id);
        bridge.emit(reading(2.0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(dist.watch_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_on_running_stream_delivers_synchronously() {
        let (bridge, dist) = setup();
        let (_first, handlers) = collector();
        let keep = dist.watch_readings(handlers, WatchOptions::default()).unwrap();
        bridge.emit(reading(7.0));

        let (seen, handlers) = collector();
        let id = dist.watch_readings(handlers, WatchOptions::default()).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![reading(7.0)]);
        assert_eq!(bridge.starts(), 1);

        dist.clear_watch(&id);
        assert_eq!(bridge.stops(), 0, "other watch keeps the stream alive");
        dist.clear_watch(&keep);
        assert_eq!(bridge.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_on_running_stream_without_reading_does_not_restart() {
        let (bridge, dist) = setup();
        dist.get_current_reading(Handlers::new(|_| {}), ReadOptions::default());
        let (seen, handlers) = collector();
        dist.watch_readings(handlers, WatchOptions::default()).unwrap();

        assert_eq!(bridge.starts(), 1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_error_cancels_watch() {
        let (bridge, dist) = setup();
        let (seen, handlers) = collector();
        let errors = Arc::new(AtomicUsize::new(0));
        let e = errors.clone();
        let id = dist
            .watch_readings(
                handlers.on_error(move |_| {
                    e.fetch_add(1, Ordering::SeqCst);
                }),
                WatchOptions::with_interval(Duration::from_millis(10)),
            )
            .unwrap();

        bridge.emit(reading(1.0));
        bridge.fail(SensorError::from_code("SENSOR_LOST"));
        bridge.fail(SensorError::from_code("SENSOR_LOST"));

        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(dist.watch_count(), 0);
        assert!(!dist.is_streaming());
        assert!(!dist.clear_watch(&id));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(seen.lock().unwrap().is_empty(), "no stale re-delivery after error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_called_once_when_last_consumer_leaves() {
        let (bridge, dist) = setup();
        let a = dist.watch_readings(Handlers::new(|_| {}), WatchOptions::default()).unwrap();
        let b = dist.watch_readings(Handlers::new(|_| {}), WatchOptions::default()).unwrap();
        dist.get_current_reading(Handlers::new(|_| {}), ReadOptions::default());

        bridge.emit(reading(1.0));
        assert_eq!(bridge.stops(), 0);
        dist.clear_watch(&a);
        assert_eq!(bridge.stops(), 0);
        dist.clear_watch(&b);
        assert_eq!(bridge.stops(), 1);

        dist.clear_watch(&a);
        dist.reset();
        assert_eq!(bridge.stops(), 1, "idle distributor never stops again");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_sink_is_ignored() {
        let (bridge, dist) = setup();
        dist.get_current_reading(Handlers::new(|_| {}), ReadOptions::default());
        let old_sink = bridge.sink.lock().unwrap().clone().unwrap();
        bridge.emit(reading(1.0));
        assert!(old_sink.is_closed());

        let (seen, handlers) = collector();
        dist.get_current_reading(handlers, ReadOptions::default());
        old_sink.reading(reading(9.0));
        assert!(seen.lock().unwrap().is_empty());

        bridge.emit(reading(2.0));
        assert_eq!(*seen.lock().unwrap(), vec![reading(2.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_rejected_before_registration() {
        let (bridge, dist) = setup();
        let err = dist
            .watch_readings(Handlers::new(|_| {}), WatchOptions::with_interval(Duration::ZERO))
            .unwrap_err();
        assert_eq!(err, DistributorError::InvalidInterval { interval: Duration::ZERO });
        assert_eq!(dist.consumer_count(), 0);
        assert_eq!(bridge.starts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_interval_rejected_before_registration() {
        let (bridge, dist) = setup();
        let err = dist
            .watch_readings(Handlers::new(|_| {}), WatchOptions::with_interval(Duration::MAX))
            .unwrap_err();
        assert_eq!(err, DistributorError::InvalidInterval { interval: Duration::MAX });
        assert_eq!(dist.consumer_count(), 0);
        assert_eq!(dist.watch_count(), 0);
        assert!(!dist.is_streaming());
        assert_eq!(bridge.starts(), 0);

        let long = Duration::from_secs(60 * 60 * 24 * 365);
        let id = dist
            .watch_readings(Handlers::new(|_| {}), WatchOptions::with_interval(long))
            .unwrap();
        assert_eq!(dist.watch_interval(&id), Some(long));
        assert_eq!(bridge.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_ticks_are_skipped_not_bursted() {
        let (bridge, dist) = setup();
        let (seen, handlers) = collector();
        dist.watch_readings(handlers, WatchOptions::with_interval(Duration::from_millis(10)))
            .unwrap();
        bridge.emit(reading(1.0));

        // Jump past five deadlines without letting the ticker run.
        tokio::time::advance(Duration::from_millis(55)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(seen.lock().unwrap().len(), 1, "one late tick, no burst");

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_callback_is_contained() {
        let (bridge, dist) = setup();
        let mut rx = dist.subscribe();
        let (seen, handlers) = collector();
        dist.get_current_reading(Handlers::new(|_| panic!("consumer bug")), ReadOptions::default());
        dist.get_current_reading(handlers, ReadOptions::default());

        bridge.emit(reading(1.0));

        assert_eq!(seen.lock().unwrap().len(), 1, "other consumers still served");
        let mut panicked = false;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::CallbackPanicked {
                assert_eq!(ev.reason.as_deref(), Some("consumer bug"));
                panicked = true;
            }
        }
        assert!(panicked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_and_drop_stop_stream() {
        let (bridge, dist) = setup();
        let (seen, handlers) = collector();
        dist.watch_readings(handlers, WatchOptions::with_interval(Duration::from_millis(10)))
            .unwrap();
        bridge.emit(reading(1.0));

        dist.reset();
        assert_eq!(bridge.stops(), 1);
        assert_eq!(dist.watch_count(), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(seen.lock().unwrap().is_empty());

        dist.get_current_reading(Handlers::new(|_| {}), ReadOptions::default());
        drop(dist);
        assert_eq!(bridge.stops(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_events_published() {
        let (bridge, dist) = setup();
        let mut rx = dist.subscribe();
        let id = dist.watch_readings(Handlers::new(|_| {}), WatchOptions::default()).unwrap();
        bridge.emit(reading(1.0));
        dist.clear_watch(&id);

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::WatchStarted,
                EventKind::ConsumerAdded,
                EventKind::StreamStarted,
                EventKind::ReadingReceived,
                EventKind::WatchCleared,
                EventKind::ConsumerRemoved,
                EventKind::StreamStopped,
            ]
        );
    }

    /// Bridge whose `stop` takes a while, recording the order calls complete in.
    #[derive(Default)]
    struct SlowStopBridge {
        calls: Mutex<Vec<&'static str>>,
        running: Mutex<bool>,
        sink: Mutex<Option<ReadingSink>>,
    }

    impl NativeBridge for SlowStopBridge {
        fn start(&self, sink: ReadingSink) {
            *self.sink.lock().unwrap() = Some(sink);
            *self.running.lock().unwrap() = true;
            self.calls.lock().unwrap().push("start");
        }

        fn stop(&self) {
            std::thread::sleep(Duration::from_millis(200));
            *self.running.lock().unwrap() = false;
            self.calls.lock().unwrap().push("stop");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_racing_transitions_reach_bridge_in_order() {
        let bridge = Arc::new(SlowStopBridge::default());
        let dist = Distributor::builder(bridge.clone()).build().unwrap();
        dist.get_current_reading(Handlers::new(|_| {}), ReadOptions::default());

        // The reading resolves the only read on another thread, which then sits in `stop`.
        let sink = bridge.sink.lock().unwrap().clone().unwrap();
        let emitter = std::thread::spawn(move || sink.reading(reading(1.0)));
        std::thread::sleep(Duration::from_millis(50));

        dist.get_current_reading(Handlers::new(|_| {}), ReadOptions::default());
        emitter.join().unwrap();

        assert_eq!(*bridge.calls.lock().unwrap(), vec!["start", "stop", "start"]);
        assert!(*bridge.running.lock().unwrap());
        assert!(dist.is_streaming());
        assert_eq!(dist.pending_reads(), 1);
    }
}
