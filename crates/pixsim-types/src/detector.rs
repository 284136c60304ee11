//! # Detectors
//!
//! A detector is the origin context a message may refer back to. Modules that
//! are instantiated per detector only see messages of their own detector.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::{PixelIndex, Position3D};
use crate::errors::GeometryError;

/// A pixel sensor placed in the setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    /// Unique name in the setup.
    name: String,
    /// Model the detector was built from.
    model: String,
    /// Centre of the sensor in global coordinates.
    position: Position3D,
    /// Number of pixel columns and rows.
    pixels: (u32, u32),
    /// Pixel pitch in mm.
    pitch: (f64, f64),
    /// Sensor thickness in mm.
    thickness: f64,
}

impl Detector {
    /// Create a detector, rejecting degenerate geometries.
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        position: Position3D,
        pixels: (u32, u32),
        pitch: (f64, f64),
        thickness: f64,
    ) -> Result<Self, GeometryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(GeometryError::EmptyName);
        }
        if pixels.0 == 0 || pixels.1 == 0 {
            return Err(GeometryError::EmptyMatrix { detector: name });
        }
        if pitch.0 <= 0.0 || pitch.1 <= 0.0 || thickness <= 0.0 {
            return Err(GeometryError::NonPositiveDimension { detector: name });
        }
        Ok(Self {
            name,
            model: model.into(),
            position,
            pixels,
            pitch,
            thickness,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn position(&self) -> Position3D {
        self.position
    }

    #[must_use]
    pub fn pixels(&self) -> (u32, u32) {
        self.pixels
    }

    #[must_use]
    pub fn pitch(&self) -> (f64, f64) {
        self.pitch
    }

    #[must_use]
    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    /// Half extent of the sensor in local coordinates.
    #[must_use]
    pub fn half_size(&self) -> Position3D {
        Position3D::new(
            f64::from(self.pixels.0) * self.pitch.0 / 2.0,
            f64::from(self.pixels.1) * self.pitch.1 / 2.0,
            self.thickness / 2.0,
        )
    }

    /// Convert a local position to global coordinates.
    #[must_use]
    pub fn to_global(&self, local: Position3D) -> Position3D {
        Position3D::new(
            local.x + self.position.x,
            local.y + self.position.y,
            local.z + self.position.z,
        )
    }

    /// Whether a local position lies inside the sensor volume.
    #[must_use]
    pub fn contains(&self, local: Position3D) -> bool {
        let half = self.half_size();
        local.x.abs() <= half.x && local.y.abs() <= half.y && local.z.abs() <= half.z
    }

    /// Pixel containing a local position, `None` outside the matrix.
    #[must_use]
    pub fn pixel_at(&self, local: Position3D) -> Option<PixelIndex> {
        if !self.contains(local) {
            return None;
        }
        let half = self.half_size();
        let column = ((local.x + half.x) / self.pitch.0).floor() as u32;
        let row = ((local.y + half.y) / self.pitch.1).floor() as u32;
        // The upper sensor edge belongs to the last pixel.
        Some(PixelIndex::new(
            column.min(self.pixels.0 - 1),
            row.min(self.pixels.1 - 1),
        ))
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.model)
    }
}
