//! Observes every message of every payload type through an any-type filter.

use parking_lot::Mutex;
use pixsim_bus::Bindings;
use pixsim_telemetry::MESSAGES_OBSERVED;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::error::RuntimeError;
use crate::module::{EventContext, Module, ModuleSetup};

/// Message counts per payload name, shared by every monitor instance.
#[derive(Debug, Clone, Default)]
pub struct MonitorTally {
    counts: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl MonitorTally {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, payload: &str) {
        *self.counts.lock().entry(payload.to_string()).or_default() += 1;
    }

    pub fn counts(&self) -> BTreeMap<String, u64> {
        self.counts.lock().clone()
    }

    pub fn count(&self, payload: &str) -> u64 {
        self.counts.lock().get(payload).copied().unwrap_or(0)
    }
}

pub struct MessageMonitor {
    bindings: Bindings,
    tally: MonitorTally,
}

impl MessageMonitor {
    pub const NAME: &'static str = "MessageMonitor";

    pub fn new(setup: &ModuleSetup<'_>, tally: MonitorTally) -> Result<Self, RuntimeError> {
        let mut bindings = setup.bindings(setup.identity(Self::NAME));
        let shared = tally.clone();
        let filter = bindings.register_any_filter(move |message, name| {
            let payload = message.payload_type().name();
            trace!(payload, name, records = message.len(), "Observed message");
            MESSAGES_OBSERVED.with_label_values(&[payload]).inc();
            shared.record(payload);
            true
        })?;
        debug!(module = %bindings.identity(), delegate = filter.unique_name(), "Watching every message");
        Ok(Self { bindings, tally })
    }
}

impl Module for MessageMonitor {
    fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    fn run(&mut self, _event: &mut EventContext) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), RuntimeError> {
        info!(module = %self.bindings.identity(), counts = ?self.tally.counts(), "Monitoring finished");
        Ok(())
    }
}
