//! # Error Types
//!
//! Defines error types shared by the modules of a simulation.

use thiserror::Error;

/// Errors raised while describing the detector setup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeometryError {
    /// Every detector needs a name to be addressed by.
    #[error("Detector name must not be empty")]
    EmptyName,

    /// The pixel matrix has no columns or no rows.
    #[error("Detector {detector} has an empty pixel matrix")]
    EmptyMatrix { detector: String },

    /// Pitch or thickness is zero or negative.
    #[error("Detector {detector} has a non-positive pitch or thickness")]
    NonPositiveDimension { detector: String },

    /// Two detectors share a name.
    #[error("Duplicate detector name: {0}")]
    DuplicateDetector(String),
}
