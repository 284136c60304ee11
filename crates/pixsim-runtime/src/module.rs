//! # Module Contract
//!
//! A module is one processing step of the simulation chain. It registers its
//! bindings when constructed, reads what it received and dispatches what it
//! produced in `run`, and releases its bindings in `teardown`.
//!
//! ## Lifecycle
//!
//! ```text
//! construct ──→ initialize ──→ run (per event) ──→ finalize ──→ teardown
//!  (bind)                        │  dispatch                     (release)
//!                                ↓
//!                   driver: check REQUIRED, reset slots
//! ```

use pixsim_bus::{Bindings, Messenger};
use pixsim_types::{Detector, LaneId, ModuleIdentity};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;

/// Per-event state handed to every module of a lane.
pub struct EventContext {
    event: u64,
    lane: LaneId,
    rng: StdRng,
}

impl EventContext {
    /// Context for `event`; its random stream only depends on `base_seed` and
    /// the event number, never on the lane that runs it.
    pub fn new(event: u64, lane: LaneId, base_seed: u64) -> Self {
        Self {
            event,
            lane,
            rng: StdRng::seed_from_u64(event_seed(base_seed, event)),
        }
    }

    pub fn event(&self) -> u64 {
        self.event
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

/// Seed of the random stream of one event.
pub fn event_seed(base_seed: u64, event: u64) -> u64 {
    base_seed ^ event.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// A processing step of the simulation chain.
pub trait Module: Send {
    fn bindings(&self) -> &Bindings;

    fn bindings_mut(&mut self) -> &mut Bindings;

    fn identity(&self) -> &ModuleIdentity {
        self.bindings().identity()
    }

    /// Called once per instance before the first event.
    fn initialize(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Process one event.
    fn run(&mut self, event: &mut EventContext) -> Result<(), RuntimeError>;

    /// Called once per instance after the last event.
    fn finalize(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Remove every delegate this module registered.
    fn teardown(&mut self) -> Result<(), RuntimeError> {
        self.bindings_mut().release()?;
        Ok(())
    }
}

/// Everything a factory needs to build the modules of one lane.
pub struct ModuleSetup<'a> {
    pub messenger: &'a Arc<Messenger>,
    pub lane: LaneId,
    pub detectors: &'a [Arc<Detector>],
    pub config: &'a RuntimeConfig,
}

impl ModuleSetup<'_> {
    /// Identity of a new module instance in this lane.
    pub fn identity(&self, name: &str) -> ModuleIdentity {
        ModuleIdentity::new(name).in_lane(self.lane)
    }

    /// Identity of a new per-detector module instance in this lane.
    pub fn detector_identity(&self, name: &str, detector: &Arc<Detector>) -> ModuleIdentity {
        self.identity(name).with_detector(Arc::clone(detector))
    }

    /// Empty bindings on this lane's messenger.
    pub fn bindings(&self, identity: ModuleIdentity) -> Bindings {
        Bindings::new(Arc::clone(self.messenger), identity)
    }
}

/// Builds the instances of one module type for a lane.
pub type ModuleFactory =
    Box<dyn Fn(&ModuleSetup<'_>) -> Result<Vec<Box<dyn Module>>, RuntimeError> + Send + Sync>;
