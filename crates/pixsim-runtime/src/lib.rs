//! # PixSim Runtime Library
//!
//! The unit-of-work driver and the demo module chain. The `pixsim` binary in
//! `main.rs` wires both together.
//!
//! ## Flow
//!
//! ```text
//! RuntimeConfig ──→ Simulation::new ──→ add_module / add_detector_module
//!                                              │
//!                                              ↓
//!                       Simulation::run ──→ lanes (rayon) ──→ RunSummary
//! ```

#![cfg_attr(not(test), warn(clippy::unwrap_used))]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod module;
pub mod modules;
pub mod simulation;

pub use config::{ConfigError, DetectorConfig, PipelineConfig, RuntimeConfig};
pub use error::{RuntimeError, Stage};
pub use module::{event_seed, EventContext, Module, ModuleFactory, ModuleSetup};
pub use modules::{install_demo_pipeline, MonitorTally};
pub use simulation::{RunSummary, Simulation};
