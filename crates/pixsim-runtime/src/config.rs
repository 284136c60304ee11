//! # Runtime Configuration
//!
//! Defaults for every parameter, overridable from the environment.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PIXSIM_EVENTS` | `100` | Number of events to simulate |
//! | `PIXSIM_WORKERS` | CPU count | Number of lanes / worker threads |
//! | `PIXSIM_SEED` | `42` | Base seed for per-event random streams |
//! | `PIXSIM_DETECTORS` | `telescope0,dut,telescope1` | Comma separated detector names |
//! | `PIXSIM_PARTICLES` | `2` | Particles generated per event |
//! | `PIXSIM_THRESHOLD` | `600` | Digitizer threshold in electrons |

use pixsim_types::{Detector, GeometryError, Position3D};
use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Spacing between consecutive detector planes along the beam, in mm.
pub const PLANE_SPACING_MM: f64 = 20.0;

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of events (units of work).
    pub events: u64,
    /// Number of lanes, each on its own worker thread.
    pub workers: usize,
    /// Base seed; event `n` always draws from the same stream.
    pub seed: u64,
    /// Detector planes, in beam order.
    pub detectors: Vec<DetectorConfig>,
    /// Demo pipeline parameters.
    pub pipeline: PipelineConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            events: 100,
            workers: num_cpus::get().max(1),
            seed: 42,
            detectors: ["telescope0", "dut", "telescope1"]
                .iter()
                .enumerate()
                .map(|(index, name)| DetectorConfig::plane(*name, index))
                .collect(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Geometry of one detector plane.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub name: String,
    pub model: String,
    pub pixels: (u32, u32),
    /// Pixel pitch in mm.
    pub pitch: (f64, f64),
    /// Sensor thickness in mm.
    pub thickness: f64,
    /// Position of the sensor centre along the beam, in mm.
    pub z: f64,
}

impl DetectorConfig {
    /// A 256x256 hybrid pixel plane, the `index`-th along the beam.
    pub fn plane(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            model: "timepix".to_string(),
            pixels: (256, 256),
            pitch: (0.055, 0.055),
            thickness: 0.3,
            z: index as f64 * PLANE_SPACING_MM,
        }
    }

    pub fn build(&self) -> Result<Detector, GeometryError> {
        Detector::new(
            self.name.clone(),
            self.model.clone(),
            Position3D::new(0.0, 0.0, self.z),
            self.pixels,
            self.pitch,
            self.thickness,
        )
    }
}

/// Parameters of the demo modules.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Particles crossing the setup per event.
    pub particles_per_event: usize,
    /// Deposit points along each particle path through a sensor.
    pub deposits_per_particle: usize,
    /// Mean electron-hole pairs per micrometre of path (silicon).
    pub pairs_per_um: f64,
    /// Charge below which a pixel is not read out, in electrons.
    pub threshold_electrons: f64,
    /// Electrons per ADC count.
    pub adc_gain: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            particles_per_event: 2,
            deposits_per_particle: 10,
            pairs_per_um: 80.0,
            threshold_electrons: 600.0,
            adc_gain: 10.0,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("At least one worker is required")]
    NoWorkers,

    #[error("{0} workers requested, at most {max} lanes are supported", max = u16::MAX)]
    TooManyWorkers(usize),

    #[error("At least one detector is required")]
    NoDetectors,

    #[error("Invalid pipeline parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl RuntimeConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(events) = parse(&lookup, "PIXSIM_EVENTS")? {
            config.events = events;
        }
        if let Some(workers) = parse(&lookup, "PIXSIM_WORKERS")? {
            config.workers = workers;
        }
        if let Some(seed) = parse(&lookup, "PIXSIM_SEED")? {
            config.seed = seed;
        }
        if let Some(particles) = parse(&lookup, "PIXSIM_PARTICLES")? {
            config.pipeline.particles_per_event = particles;
        }
        if let Some(threshold) = parse(&lookup, "PIXSIM_THRESHOLD")? {
            config.pipeline.threshold_electrons = threshold;
        }
        if let Some(names) = lookup("PIXSIM_DETECTORS") {
            config.detectors = names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .enumerate()
                .map(|(index, name)| DetectorConfig::plane(name, index))
                .collect();
        }

        Ok(config)
    }

    /// Check the configuration before anything is built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.workers > usize::from(u16::MAX) {
            return Err(ConfigError::TooManyWorkers(self.workers));
        }
        if self.detectors.is_empty() {
            return Err(ConfigError::NoDetectors);
        }

        let mut names = HashSet::new();
        for detector in &self.detectors {
            if !names.insert(detector.name.as_str()) {
                return Err(GeometryError::DuplicateDetector(detector.name.clone()).into());
            }
        }

        let pipeline = &self.pipeline;
        if pipeline.deposits_per_particle == 0 {
            return Err(ConfigError::InvalidParameter(
                "deposits_per_particle must be positive".to_string(),
            ));
        }
        if !(pipeline.pairs_per_um > 0.0) {
            return Err(ConfigError::InvalidParameter(
                "pairs_per_um must be positive".to_string(),
            ));
        }
        if !(pipeline.threshold_electrons >= 0.0) {
            return Err(ConfigError::InvalidParameter(
                "threshold_electrons must not be negative".to_string(),
            ));
        }
        if !(pipeline.adc_gain > 0.0) {
            return Err(ConfigError::InvalidParameter(
                "adc_gain must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and build the detector descriptions shared by all lanes.
    pub fn build_detectors(&self) -> Result<Vec<Arc<Detector>>, ConfigError> {
        self.validate()?;
        self.detectors
            .iter()
            .map(|config| config.build().map(Arc::new).map_err(ConfigError::from))
            .collect()
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
    }
}
