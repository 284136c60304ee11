//! # Core Domain Entities
//!
//! Defines the records produced and consumed by the simulation modules.
//!
//! ## Clusters
//!
//! - **Geometry**: `Position3D`, `PixelIndex`
//! - **Monte-Carlo truth**: `MCTrack`, `MCParticle`
//! - **Charge**: `DepositedCharge`, `CarrierType`
//! - **Pixels**: `PixelCharge`, `PixelHit`
//!
//! Records never hold references into other messages. Where a record points
//! at another record (a deposit at its particle, a particle at its parent) it
//! stores the index of that record inside the message of the same detector.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::payload::Payload;

// =============================================================================
// CLUSTER A: GEOMETRY
// =============================================================================

/// A point in space, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position3D {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for Position3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}mm,{:.5}mm,{:.5}mm)", self.x, self.y, self.z)
    }
}

/// Column/row index of a pixel in a detector matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct PixelIndex {
    pub x: u32,
    pub y: u32,
}

impl PixelIndex {
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

// =============================================================================
// CLUSTER B: MONTE-CARLO TRUTH
// =============================================================================

/// A primary or secondary track as seen by the particle generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCTrack {
    /// PDG particle code.
    pub particle_id: i32,
    /// Production vertex in global coordinates.
    pub origin: Position3D,
    /// Kinetic energy at production, in keV.
    pub initial_kinetic_energy_kev: f64,
    /// Index of the parent track in the same message, if any.
    pub parent: Option<usize>,
}

/// The passage of a particle through one detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCParticle {
    pub local_begin_point: Position3D,
    pub global_begin_point: Position3D,
    pub local_end_point: Position3D,
    pub global_end_point: Position3D,
    /// PDG particle code.
    pub particle_id: i32,
    /// Index of the parent particle in the same message, if any.
    pub parent: Option<usize>,
}

impl MCParticle {
    /// Path length through the sensor.
    #[must_use]
    pub fn path_length(&self) -> f64 {
        self.local_begin_point.distance(&self.local_end_point)
    }
}

// =============================================================================
// CLUSTER C: CHARGE
// =============================================================================

/// Type of charge carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarrierType {
    Electron,
    Hole,
}

impl fmt::Display for CarrierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Electron => write!(f, "electron"),
            Self::Hole => write!(f, "hole"),
        }
    }
}

/// A set of charge carriers deposited at one point of a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositedCharge {
    pub local_position: Position3D,
    pub global_position: Position3D,
    pub carrier: CarrierType,
    /// Number of carriers.
    pub charge: u32,
    /// Time of the deposit relative to the event start, in ns.
    pub event_time_ns: f64,
    /// Index of the originating particle in the `MCParticle` message of the
    /// same detector.
    pub mc_particle: Option<usize>,
}

// =============================================================================
// CLUSTER D: PIXELS
// =============================================================================

/// Total charge collected at one pixel implant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelCharge {
    pub pixel: PixelIndex,
    /// Collected carriers.
    pub charge: f64,
}

/// A digitized pixel above threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelHit {
    pub pixel: PixelIndex,
    /// Time of arrival, in ns.
    pub time_ns: f64,
    /// Digitized signal in ADC counts.
    pub signal: u32,
}

// =============================================================================
// PAYLOAD REGISTRATION
// =============================================================================

impl Payload for MCTrack {
    const NAME: &'static str = "MCTrack";
}

impl Payload for MCParticle {
    const NAME: &'static str = "MCParticle";
}

impl Payload for DepositedCharge {
    const NAME: &'static str = "DepositedCharge";
}

impl Payload for PixelCharge {
    const NAME: &'static str = "PixelCharge";
}

impl Payload for PixelHit {
    const NAME: &'static str = "PixelHit";
}
