//! # PolledBridge: reference native bridge over an async sensor port.
//!
//! [`PolledBridge`] turns any [`MagneticSensor`] into a [`NativeBridge`]. It drives
//! one polling task per native stream and reproduces the platform plugin semantics:
//!
//! ## Status machine
//! ```text
//! Stopped ──start()──► Starting ──first field sample──► Running
//!    ▲                    │                               │
//!    │                    └──open() failed──► FailedToStart
//!    └───────────────────────stop()───────────────────────┘
//! ```
//!
//! ## Rules
//! - `start()` while `Starting`/`Running` only swaps the sink and re-arms the startup timeout.
//! - Field samples are delivered only while accuracy ≥ `min_accuracy`; timestamps are wall-clock ms.
//! - Accuracy changes are ignored while stopped.
//! - Startup timeout: still `Starting` with enough accuracy when it elapses → the stored
//!   field values are delivered once, so pending one-shot reads resolve.
//! - Polling tasks are serialized: a restarted stream waits until the previous task closed the sensor.
//! - The sensor going away (`next_event()` → `None`) stops the bridge and reports
//!   `SENSOR_LOST` through the sink, so every consumer is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::error::{DistributorError, SensorError};
use crate::sensor::{NativeBridge, Reading, ReadingSink};

/// Sensor accuracy as reported by the platform, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Accuracy {
    Unreliable,
    Low,
    Medium,
    High,
}

/// Event produced by a [`MagneticSensor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    /// Raw field sample.
    Field { x: f64, y: f64, z: f64 },
    /// Accuracy change.
    Accuracy(Accuracy),
}

/// Async port to the physical magnetometer.
#[async_trait]
pub trait MagneticSensor: Send + Sync + 'static {
    /// Registers for sensor events. An error means the stream cannot start.
    async fn open(&self) -> Result<(), SensorError>;

    /// Waits for the next event. `None` means the sensor went away.
    async fn next_event(&self) -> Option<SensorEvent>;

    /// Unregisters from sensor events.
    async fn close(&self);

    /// Returns the sensor name used in events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Bridge status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Stopped,
    Starting,
    Running,
    FailedToStart,
}

/// Configuration for [`PolledBridge`].
#[derive(Clone, Debug)]
pub struct PolledBridgeConfig {
    /// Delay after which a still-starting stream emits its stored field values.
    ///
    /// `Duration::ZERO` disables the timeout.
    pub startup_timeout: Duration,
    /// Minimum accuracy for a sample to be delivered.
    pub min_accuracy: Accuracy,
}

impl Default for PolledBridgeConfig {
    /// - `startup_timeout = 2s`
    /// - `min_accuracy = Accuracy::Medium`
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(2),
            min_accuracy: Accuracy::Medium,
        }
    }
}

struct PollState {
    status: BridgeStatus,
    accuracy: Accuracy,
    field: (f64, f64, f64),
    sink: Option<ReadingSink>,
    cancel: Option<CancellationToken>,
    timeout_epoch: u64,
}

impl PollState {
    fn lock(state: &Mutex<PollState>) -> MutexGuard<'_, PollState> {
        state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one sensor event; returns the delivery it triggers, if any.
    fn apply(&mut self, ev: SensorEvent, min: Accuracy) -> Option<(ReadingSink, Reading)> {
        if self.status == BridgeStatus::Stopped {
            return None;
        }
        match ev {
            SensorEvent::Accuracy(a) => {
                self.accuracy = a;
                None
            }
            SensorEvent::Field { x, y, z } => {
                self.status = BridgeStatus::Running;
                if self.accuracy < min {
                    return None;
                }
                self.field = (x, y, z);
                let sink = self.sink.clone()?;
                Some((sink, Reading::captured_now(x, y, z)))
            }
        }
    }
}

/// [`NativeBridge`] polling a [`MagneticSensor`] on a tokio runtime.
pub struct PolledBridge<S> {
    sensor: Arc<S>,
    cfg: PolledBridgeConfig,
    runtime: Handle,
    state: Arc<Mutex<PollState>>,
    lifecycle: Arc<tokio::sync::Mutex<()>>,
}

impl<S: MagneticSensor> PolledBridge<S> {
    /// Creates a bridge on the current tokio runtime.
    ///
    /// ### Errors
    /// [`DistributorError::NoRuntime`] outside a runtime.
    pub fn new(sensor: S, cfg: PolledBridgeConfig) -> Result<Self, DistributorError> {
        let runtime = Handle::try_current().map_err(|_| DistributorError::NoRuntime)?;
        Ok(Self::with_runtime(sensor, cfg, runtime))
    }

    /// Creates a bridge on an explicit runtime.
    pub fn with_runtime(sensor: S, cfg: PolledBridgeConfig, runtime: Handle) -> Self {
        Self {
            sensor: Arc::new(sensor),
            cfg,
            runtime,
            state: Arc::new(Mutex::new(PollState {
                status: BridgeStatus::Stopped,
                accuracy: Accuracy::Unreliable,
                field: (0.0, 0.0, 0.0),
                sink: None,
                cancel: None,
                timeout_epoch: 0,
            })),
            lifecycle: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Current status.
    pub fn status(&self) -> BridgeStatus {
        PollState::lock(&self.state).status
    }

    /// Current accuracy.
    pub fn accuracy(&self) -> Accuracy {
        PollState::lock(&self.state).accuracy
    }

    fn arm_timeout(&self, st: &mut PollState) {
        st.timeout_epoch += 1;
        let timeout = self.cfg.startup_timeout;
        let Some(token) = st.cancel.clone() else {
            return;
        };
        if timeout.is_zero() {
            return;
        }

        let epoch = st.timeout_epoch;
        let min = self.cfg.min_accuracy;
        let state = Arc::clone(&self.state);
        self.runtime.spawn(async move {
            select! {
                _ = token.cancelled() => return,
                _ = time::sleep(timeout) => {}
            }
            let delivery = {
                let st = PollState::lock(&state);
                let due = st.timeout_epoch == epoch
                    && st.status == BridgeStatus::Starting
                    && st.accuracy >= min;
                if due {
                    let (x, y, z) = st.field;
                    st.sink.clone().map(|s| (s, Reading::captured_now(x, y, z)))
                } else {
                    None
                }
            };
            if let Some((sink, reading)) = delivery {
                sink.reading(reading);
            }
        });
    }
}

async fn poll_sensor<S: MagneticSensor>(
    sensor: Arc<S>,
    state: Arc<Mutex<PollState>>,
    lifecycle: Arc<tokio::sync::Mutex<()>>,
    min: Accuracy,
    token: CancellationToken,
) {
    let _serial = lifecycle.lock().await;
    if token.is_cancelled() {
        return;
    }

    if let Err(err) = sensor.open().await {
        let sink = {
            let mut st = PollState::lock(&state);
            if token.is_cancelled() {
                return;
            }
            st.status = BridgeStatus::FailedToStart;
            st.cancel = None;
            st.sink.clone()
        };
        if let Some(sink) = sink {
            sink.error(err);
        }
        return;
    }

    let mut lost = false;
    loop {
        let ev = select! {
            biased;
            _ = token.cancelled() => break,
            ev = sensor.next_event() => ev,
        };
        let Some(ev) = ev else {
            lost = true;
            break;
        };

        let delivery = PollState::lock(&state).apply(ev, min);
        if let Some((sink, reading)) = delivery {
            sink.reading(reading);
        }
    }

    sensor.close().await;
    if !lost {
        return;
    }

    let sink = {
        let mut st = PollState::lock(&state);
        if token.is_cancelled() {
            return;
        }
        st.status = BridgeStatus::Stopped;
        st.accuracy = Accuracy::Unreliable;
        st.timeout_epoch += 1;
        if let Some(t) = st.cancel.take() {
            t.cancel();
        }
        st.sink.clone()
    };
    if let Some(sink) = sink {
        sink.error(SensorError::sensor_lost("Sensor stopped producing events."));
    }
}

impl<S: MagneticSensor> NativeBridge for PolledBridge<S> {
    fn start(&self, sink: ReadingSink) {
        let mut st = PollState::lock(&self.state);
        st.sink = Some(sink);

        if matches!(st.status, BridgeStatus::Starting | BridgeStatus::Running) {
            self.arm_timeout(&mut st);
            return;
        }

        let token = CancellationToken::new();
        st.status = BridgeStatus::Starting;
        st.accuracy = self.cfg.min_accuracy;
        st.cancel = Some(token.clone());
        self.arm_timeout(&mut st);
        drop(st);

        self.runtime.spawn(poll_sensor(
            Arc::clone(&self.sensor),
            Arc::clone(&self.state),
            Arc::clone(&self.lifecycle),
            self.cfg.min_accuracy,
            token,
        ));
    }

    fn stop(&self) {
        let mut st = PollState::lock(&self.state);
        if let Some(token) = st.cancel.take() {
            token.cancel();
        }
        st.status = BridgeStatus::Stopped;
        st.accuracy = Accuracy::Unreliable;
        st.sink = None;
        st.timeout_epoch += 1;
    }

    fn name(&self) -> &'static str {
        self.sensor.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Distributor, Handlers, ReadOptions, WatchOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Sensor fed from a channel by the test.
    struct ScriptedSensor {
        events: tokio::sync::Mutex<mpsc::UnboundedReceiver<SensorEvent>>,
        open_error: Option<SensorError>,
        opens: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MagneticSensor for ScriptedSensor {
        async fn open(&self) -> Result<(), SensorError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            match &self.open_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        async fn next_event(&self) -> Option<SensorEvent> {
            self.events.lock().await.recv().await
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct Rig {
        tx: mpsc::UnboundedSender<SensorEvent>,
        bridge: Arc<PolledBridge<ScriptedSensor>>,
        dist: Distributor,
        opens: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    fn rig(open_error: Option<SensorError>, cfg: PolledBridgeConfig) -> Rig {
        let (tx, rx) = mpsc::unbounded_channel();
        let opens = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        let sensor = ScriptedSensor {
            events: tokio::sync::Mutex::new(rx),
            open_error,
            opens: opens.clone(),
            closes: closes.clone(),
        };
        let bridge = Arc::new(PolledBridge::new(sensor, cfg).unwrap());
        let dist = Distributor::builder(bridge.clone()).build().unwrap();
        Rig {
            tx,
            bridge,
            dist,
            opens,
            closes,
        }
    }

    fn field(x: f64) -> SensorEvent {
        SensorEvent::Field { x, y: 0.5, z: -1.0 }
    }

    async fn settle() {
        time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_through_polled_bridge() {
        let rig = rig(None, PolledBridgeConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        rig.dist.get_current_reading(
            Handlers::new(move |r| s.lock().unwrap().push(r)),
            ReadOptions::default(),
        );
        assert_eq!(rig.bridge.status(), BridgeStatus::Starting);

        rig.tx.send(field(4.0)).unwrap();
        settle().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!((seen[0].x, seen[0].y, seen[0].z), (4.0, 0.5, -1.0));
        assert_eq!(rig.bridge.status(), BridgeStatus::Stopped);
        assert_eq!(rig.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_accuracy_samples_dropped() {
        let rig = rig(None, PolledBridgeConfig::default());
        let id = rig
            .dist
            .watch_readings(Handlers::new(|_| {}), WatchOptions::default())
            .unwrap();

        rig.tx.send(SensorEvent::Accuracy(Accuracy::Low)).unwrap();
        rig.tx.send(field(1.0)).unwrap();
        settle().await;
        assert_eq!(rig.bridge.status(), BridgeStatus::Running);
        assert_eq!(rig.dist.last_reading(), None);

        rig.tx.send(SensorEvent::Accuracy(Accuracy::High)).unwrap();
        rig.tx.send(field(2.0)).unwrap();
        settle().await;
        assert_eq!(rig.dist.last_reading().map(|r| r.x), Some(2.0));
        assert_eq!(rig.bridge.accuracy(), Accuracy::High);

        rig.dist.clear_watch(&id);
        assert_eq!(rig.bridge.accuracy(), Accuracy::Unreliable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_reported_as_failed_to_start() {
        let rig = rig(
            Some(SensorError::failed_to_start("No sensors found to register to.")),
            PolledBridgeConfig::default(),
        );
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = errors.clone();
        rig.dist.get_current_reading(
            Handlers::new(|_| {}).on_error(move |err| e.lock().unwrap().push(err)),
            ReadOptions::default(),
        );
        settle().await;

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_failed_to_start());
        assert_eq!(rig.dist.consumer_count(), 0);
        assert_eq!(rig.bridge.status(), BridgeStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_timeout_resolves_pending_read() {
        let rig = rig(None, PolledBridgeConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        rig.dist.get_current_reading(
            Handlers::new(move |r| s.lock().unwrap().push(r)),
            ReadOptions::default(),
        );

        time::sleep(Duration::from_millis(1999)).await;
        assert!(seen.lock().unwrap().is_empty());
        time::sleep(Duration::from_millis(2)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!((seen[0].x, seen[0].y, seen[0].z), (0.0, 0.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_timeout_disabled() {
        let cfg = PolledBridgeConfig {
            startup_timeout: Duration::ZERO,
            ..PolledBridgeConfig::default()
        };
        let rig = rig(None, cfg);
        rig.dist
            .get_current_reading(Handlers::new(|_| {}), ReadOptions::default());

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rig.dist.pending_reads(), 1);
        assert_eq!(rig.bridge.status(), BridgeStatus::Starting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_serializes_open_after_close() {
        let rig = rig(None, PolledBridgeConfig::default());
        rig.dist
            .get_current_reading(Handlers::new(|_| {}), ReadOptions::default());
        rig.tx.send(field(1.0)).unwrap();
        settle().await;
        rig.dist
            .get_current_reading(Handlers::new(|_| {}), ReadOptions::default());
        rig.tx.send(field(2.0)).unwrap();
        settle().await;

        assert_eq!(rig.opens.load(Ordering::SeqCst), 2);
        assert_eq!(rig.closes.load(Ordering::SeqCst), 2);
        assert_eq!(rig.dist.consumer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_sensor_releases_consumers() {
        let cfg = PolledBridgeConfig {
            startup_timeout: Duration::ZERO,
            ..PolledBridgeConfig::default()
        };
        let Rig {
            tx,
            bridge,
            dist,
            closes,
            ..
        } = rig(None, cfg);

        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = errors.clone();
        dist.get_current_reading(
            Handlers::new(|_| {}).on_error(move |err| e.lock().unwrap().push(err)),
            ReadOptions::default(),
        );
        let watch_errors = Arc::new(AtomicUsize::new(0));
        let w = watch_errors.clone();
        let id = dist
            .watch_readings(
                Handlers::new(|_| {}).on_error(move |_| {
                    w.fetch_add(1, Ordering::SeqCst);
                }),
                WatchOptions::default(),
            )
            .unwrap();

        drop(tx);
        time::sleep(Duration::from_secs(60)).await;

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), SensorError::SENSOR_LOST);
        assert_eq!(watch_errors.load(Ordering::SeqCst), 1);
        assert!(!dist.clear_watch(&id));
        assert_eq!(dist.consumer_count(), 0);
        assert!(!dist.is_streaming());
        assert_eq!(bridge.status(), BridgeStatus::Stopped);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_accuracy_ordering() {
        assert!(Accuracy::Unreliable < Accuracy::Low);
        assert!(Accuracy::Medium >= PolledBridgeConfig::default().min_accuracy);
        assert!(Accuracy::High > Accuracy::Medium);
    }
}
