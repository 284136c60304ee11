//! # Simulation Driver
//!
//! Owns the messenger and drives units of work through the module chain.
//!
//! ## Lanes
//!
//! One replica of the module chain is built per worker. Lane `i` of `W`
//! processes events `i, i + W, i + 2W, ...` on its own thread of a rayon
//! pool, so a lane only ever has one event in flight and the messenger's lane
//! scoping keeps concurrent events apart.
//!
//! ## Per event
//!
//! 1. run every module of the lane, in registration order
//! 2. fail on the first `REQUIRED` binding that received nothing
//! 3. reset every binding and clear the lane's dispatch log
//!
//! ## After the last event
//!
//! `finalize` and `teardown` every module, then verify that the messenger is
//! consistent and empty.

use pixsim_bus::Messenger;
use pixsim_telemetry::{
    log_event_progress, log_module_event, metric_inc, publish_bus_totals, time_histogram, BusTotals,
    EVENTS_PROCESSED, EVENT_DURATION, MODULE_ERRORS,
};
use pixsim_types::{Detector, LaneId};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace};

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, Stage};
use crate::module::{EventContext, Module, ModuleFactory, ModuleSetup};

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub events: u64,
    pub lanes: usize,
    pub modules_per_lane: usize,
    pub messages_dispatched: u64,
    pub deliveries: u64,
    pub unreceived_messages: u64,
    pub duration_ms: u64,
}

/// A configured simulation, ready to run.
pub struct Simulation {
    config: RuntimeConfig,
    detectors: Vec<Arc<Detector>>,
    messenger: Arc<Messenger>,
    factories: Vec<ModuleFactory>,
}

struct Lane {
    id: LaneId,
    modules: Vec<Box<dyn Module>>,
}

impl Simulation {
    /// Validate `config` and build the shared detector descriptions.
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let detectors = config.build_detectors()?;
        Ok(Self {
            config,
            detectors,
            messenger: Arc::new(Messenger::new()),
            factories: Vec::new(),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn detectors(&self) -> &[Arc<Detector>] {
        &self.detectors
    }

    pub fn messenger(&self) -> &Arc<Messenger> {
        &self.messenger
    }

    /// Append a module with one instance per lane.
    pub fn add_module<M, F>(&mut self, build: F) -> &mut Self
    where
        M: Module + 'static,
        F: Fn(&ModuleSetup<'_>) -> Result<M, RuntimeError> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(move |setup| {
            let module: Box<dyn Module> = Box::new(build(setup)?);
            Ok(vec![module])
        }));
        self
    }

    /// Append a module with one instance per detector per lane.
    pub fn add_detector_module<M, F>(&mut self, build: F) -> &mut Self
    where
        M: Module + 'static,
        F: Fn(&ModuleSetup<'_>, &Arc<Detector>) -> Result<M, RuntimeError> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(move |setup| {
            setup
                .detectors
                .iter()
                .map(|detector| build(setup, detector).map(|m| Box::new(m) as Box<dyn Module>))
                .collect()
        }));
        self
    }

    /// Run every event, then tear the chain down.
    ///
    /// Any module error, dispatch error or unmet requirement aborts the run.
    /// Modules are torn down on failure as well.
    pub fn run(self) -> Result<RunSummary, RuntimeError> {
        let start = Instant::now();
        info!(
            events = self.config.events,
            lanes = self.config.workers,
            detectors = self.detectors.len(),
            modules = self.factories.len(),
            "Starting simulation"
        );

        let mut lanes = self.build_lanes()?;
        let modules_per_lane = lanes.first().map_or(0, |lane| lane.modules.len());

        let outcome = Self::initialize(&mut lanes)
            .and_then(|()| self.process_events(&mut lanes))
            .and_then(|()| Self::finalize(&mut lanes));
        let teardown = Self::teardown(&self.messenger, &mut lanes);
        drop(lanes);

        if let Err(err) = &outcome {
            error!(
                error = %err,
                kind = err.kind(),
                configuration = err.is_configuration_error(),
                "Simulation aborted"
            );
        }
        outcome?;
        teardown?;

        self.messenger.verify_consistency()?;
        let remaining = self.messenger.delegate_count();
        if remaining > 0 {
            error!(count = remaining, "Delegates left registered after teardown");
            return Err(RuntimeError::LeakedDelegates { count: remaining });
        }

        let stats = self.messenger.stats();
        publish_bus_totals(BusTotals {
            dispatched: stats.messages_dispatched,
            deliveries: stats.deliveries,
            failed: stats.failed_dispatches,
            unreceived: stats.unreceived_messages,
            active_delegates: stats.active_delegates(),
        });

        let summary = RunSummary {
            events: self.config.events,
            lanes: self.config.workers,
            modules_per_lane,
            messages_dispatched: stats.messages_dispatched,
            deliveries: stats.deliveries,
            unreceived_messages: stats.unreceived_messages,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            events = summary.events,
            dispatched = summary.messages_dispatched,
            deliveries = summary.deliveries,
            duration_ms = summary.duration_ms,
            "Simulation finished"
        );
        Ok(summary)
    }

    fn build_lanes(&self) -> Result<Vec<Lane>, RuntimeError> {
        let mut lanes = Vec::with_capacity(self.config.workers);
        for index in 0..self.config.workers {
            let id = LaneId(u16::try_from(index).map_err(|_| {
                RuntimeError::Config(crate::config::ConfigError::TooManyWorkers(self.config.workers))
            })?);
            let setup = ModuleSetup {
                messenger: &self.messenger,
                lane: id,
                detectors: &self.detectors,
                config: &self.config,
            };

            let mut modules = Vec::new();
            for factory in &self.factories {
                modules.extend(factory(&setup)?);
            }
            debug!(lane = %id, modules = modules.len(), "Lane constructed");
            lanes.push(Lane { id, modules });
        }
        Ok(lanes)
    }

    fn initialize(lanes: &mut [Lane]) -> Result<(), RuntimeError> {
        for lane in lanes {
            for module in &mut lane.modules {
                module.initialize().map_err(|e| record_error(&**module, Stage::Initialize, e))?;
            }
        }
        Ok(())
    }

    fn process_events(&self, lanes: &mut [Lane]) -> Result<(), RuntimeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(lanes.len())
            .thread_name(|index| format!("pixsim-lane-{index}"))
            .build()
            .map_err(|e| RuntimeError::ThreadPool(e.to_string()))?;

        let abort = AtomicBool::new(false);
        let stride = lanes.len() as u64;
        let results: Vec<Result<u64, RuntimeError>> = pool.install(|| {
            lanes
                .par_iter_mut()
                .map(|lane| lane.run_events(&self.messenger, self.config.events, stride, self.config.seed, &abort))
                .collect()
        });

        let mut aborted = None;
        for result in results {
            match result {
                Ok(processed) => trace!(processed, "Lane finished"),
                Err(err @ RuntimeError::Aborted { .. }) => {
                    aborted.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        aborted.map_or(Ok(()), Err)
    }

    fn finalize(lanes: &mut [Lane]) -> Result<(), RuntimeError> {
        for lane in lanes {
            for module in &mut lane.modules {
                module.finalize().map_err(|e| record_error(&**module, Stage::Finalize, e))?;
            }
        }
        Ok(())
    }

    /// Tear down every module; all are attempted and the first error wins.
    /// A module whose teardown leaves delegates registered fails as well.
    fn teardown(messenger: &Messenger, lanes: &mut [Lane]) -> Result<(), RuntimeError> {
        let mut first_error = None;
        for lane in lanes {
            for module in &mut lane.modules {
                let result = module.teardown().and_then(|()| {
                    let leftover = messenger.delegates_of(module.identity());
                    if leftover.is_empty() {
                        Ok(())
                    } else {
                        Err(RuntimeError::module(
                            module.identity().unique_name(),
                            Stage::Teardown,
                            format!("{} delegates still registered", leftover.len()),
                        ))
                    }
                });
                if let Err(err) = result {
                    let err = record_error(&**module, Stage::Teardown, err);
                    log_module_event!(warn, module.identity(), "Teardown failed", error = %err);
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Lane {
    fn run_events(
        &mut self,
        messenger: &Messenger,
        total: u64,
        stride: u64,
        seed: u64,
        abort: &AtomicBool,
    ) -> Result<u64, RuntimeError> {
        let mut processed = 0;
        let mut event = u64::from(self.id.0);
        while event < total {
            if abort.load(Ordering::Acquire) {
                return Err(RuntimeError::Aborted { lane: self.id });
            }
            if let Err(err) = self.run_event(messenger, event, seed) {
                abort.store(true, Ordering::Release);
                error!(lane = %self.id, event, error = %err, "Event failed");
                return Err(err);
            }
            processed += 1;
            event += stride;
        }
        Ok(processed)
    }

    fn run_event(&mut self, messenger: &Messenger, event: u64, seed: u64) -> Result<(), RuntimeError> {
        let _timer = time_histogram!(EVENT_DURATION);
        let mut context = EventContext::new(event, self.id, seed);

        for module in &mut self.modules {
            log_event_progress!(trace, self.id, event, "Running module", module = %module.identity());
            module.run(&mut context).map_err(|e| record_error(&**module, Stage::Run, e))?;
        }

        for module in &self.modules {
            if let Some(unmet) = module.bindings().unmet_requirements().into_iter().next() {
                return Err(record_error(&**module, Stage::Run, unmet.into()));
            }
        }

        for module in &self.modules {
            module.bindings().reset();
        }
        let dispatched = messenger.clear_sent_messages(self.id);

        let lane = self.id.to_string();
        metric_inc!(EVENTS_PROCESSED, &[lane.as_str()]);
        log_event_progress!(debug, self.id, event, "Event processed", messages = dispatched);
        Ok(())
    }
}

fn record_error(module: &dyn Module, stage: Stage, err: RuntimeError) -> RuntimeError {
    let name = module.identity().unique_name();
    metric_inc!(MODULE_ERRORS, &[name.as_str(), err.kind()]);
    match err {
        RuntimeError::Module { .. } | RuntimeError::Messenger(_) | RuntimeError::Aborted { .. } => err,
        other => RuntimeError::module(name, stage, other.to_string()),
    }
}
