use std::sync::Arc;

use crate::{
    core::SupervisorConfig,
    events::Bus,
    schedule::{Clock, SystemClock},
    subscribers::{Subscribe, SubscriberSet},
};

use super::supervisor::Supervisor;

/// Builder for constructing a [`Supervisor`] with optional features.
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            clock: None,
        }
    }

    /// Sets event subscribers (logging, metrics, tests).
    ///
    /// Subscribers receive every runtime event through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the wall clock used for cron schedules (default: [`SystemClock`]).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the supervisor and starts its subscriber fan-out.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let sup = Arc::new(Supervisor::new_internal(self.cfg, bus, subs, clock));
        sup.subscriber_listener();
        sup
    }
}
