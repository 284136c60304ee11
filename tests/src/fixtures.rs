//! Payloads and identities used across the suite.

use pixsim_types::{Detector, LaneId, ModuleIdentity, Payload, Position3D};
use serde::Serialize;
use std::sync::Arc;

/// A counted batch of charge, the smallest payload that still carries data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeBatch {
    pub count: u32,
}

impl Payload for ChargeBatch {
    const NAME: &'static str = "ChargeBatch";
}

/// A second payload type, for checking that routing never crosses types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Calibration {
    pub run: u32,
}

impl Payload for Calibration {
    const NAME: &'static str = "Calibration";
}

/// Receiver or producer in lane 0.
pub fn module(name: &str) -> ModuleIdentity {
    ModuleIdentity::new(name)
}

/// Receiver or producer in `lane`.
pub fn module_in(name: &str, lane: u16) -> ModuleIdentity {
    ModuleIdentity::new(name).in_lane(LaneId(lane))
}

/// A small detector plane at the origin.
pub fn detector(name: &str) -> Arc<Detector> {
    let detector = Detector::new(name, "test", Position3D::default(), (16, 16), (0.055, 0.055), 0.3);
    match detector {
        Ok(detector) => Arc::new(detector),
        Err(err) => panic!("fixture geometry is valid: {err}"),
    }
}
