//! # Module Identity
//!
//! Every producer and receiver on the messenger is identified by a
//! [`ModuleIdentity`]. The identity carries everything the messenger needs to
//! route a message: the lane the module runs in, its detector (if it is a
//! per-detector instance) and the names it reads from and writes to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::detector::Detector;

/// Index of a lane: one replica of the module chain, processing one unit of
/// work at a time on a single worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct LaneId(pub u16);

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lane-{}", self.0)
    }
}

/// Identity of one module instance.
///
/// Two identities are equal only if they describe the same instance, even if
/// name, detector and lane coincide.
#[derive(Debug, Clone)]
pub struct ModuleIdentity {
    uid: Uuid,
    name: String,
    detector: Option<Arc<Detector>>,
    lane: LaneId,
    input: String,
    output: String,
}

impl ModuleIdentity {
    /// New identity in lane 0, without detector and with empty input/output
    /// names.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uid: Uuid::new_v4(),
            name: name.into(),
            detector: None,
            lane: LaneId::default(),
            input: String::new(),
            output: String::new(),
        }
    }

    #[must_use]
    pub fn with_detector(mut self, detector: Arc<Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    #[must_use]
    pub fn in_lane(mut self, lane: LaneId) -> Self {
        self.lane = lane;
        self
    }

    /// Name that bindings without `IGNORE_NAME` listen to.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    /// Name attached to messages dispatched without an explicit name.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    #[must_use]
    pub fn uid(&self) -> Uuid {
        self.uid
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn detector(&self) -> Option<&Arc<Detector>> {
        self.detector.as_ref()
    }

    #[must_use]
    pub fn lane(&self) -> LaneId {
        self.lane
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// `name:detector` for per-detector instances, `name` otherwise.
    #[must_use]
    pub fn unique_name(&self) -> String {
        match &self.detector {
            Some(detector) => format!("{}:{}", self.name, detector.name()),
            None => self.name.clone(),
        }
    }
}

impl PartialEq for ModuleIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for ModuleIdentity {}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.unique_name(), self.lane)
    }
}
