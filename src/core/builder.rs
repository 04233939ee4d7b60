use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::distributor::{Distributor, Shared};
use crate::{
    core::Config,
    error::DistributorError,
    events::Bus,
    sensor::NativeBridge,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Distributor`] with optional features.
pub struct DistributorBuilder {
    cfg: Config,
    bridge: Arc<dyn NativeBridge>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    runtime: Option<Handle>,
}

impl DistributorBuilder {
    /// Creates a new builder around the native bridge.
    pub fn new(bridge: Arc<dyn NativeBridge>) -> Self {
        Self {
            cfg: Config::default(),
            bridge,
            subscribers: Vec::new(),
            runtime: None,
        }
    }

    /// Replaces the default configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive distributor events (stream lifecycle, readings, watches)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Runtime used for watch tickers and subscriber workers.
    ///
    /// Defaults to the runtime `build()` is called from.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the distributor.
    ///
    /// This consumes the builder and initializes:
    /// - Event bus for broadcasting
    /// - Subscriber workers and the bus listener (only if subscribers were given)
    /// - The runtime token every watch ticker derives from
    ///
    /// ### Errors
    /// [`DistributorError::NoRuntime`] if no handle was given and `build` runs
    /// outside a tokio runtime.
    pub fn build(self) -> Result<Distributor, DistributorError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| DistributorError::NoRuntime)?,
        };
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();

        if !self.subscribers.is_empty() {
            let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone(), &runtime));
            subs.spawn_listener(&runtime, runtime_token.clone());
        }

        let shared = Shared::new(self.cfg, self.bridge, bus, runtime, runtime_token);
        Ok(Distributor::from_shared(shared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::ReadingSink;

    struct Idle;

    impl NativeBridge for Idle {
        fn start(&self, _sink: ReadingSink) {}
        fn stop(&self) {}
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let err = DistributorBuilder::new(Arc::new(Idle)).build().err();
        assert_eq!(err, Some(DistributorError::NoRuntime));
    }

    #[test]
    fn test_build_with_explicit_handle() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let dist = DistributorBuilder::new(Arc::new(Idle))
            .with_runtime(rt.handle().clone())
            .build()
            .unwrap();
        assert!(!dist.is_streaming());
    }
}
