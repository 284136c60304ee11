//! Applies a threshold and an ADC conversion to the pixel charges of one
//! detector.
//!
//! The pixel-charge binding is `REQUIRED`: an event in which no charge message
//! reached this detector is a configuration error.

use pixsim_bus::{Bindings, Message, MsgFlags, SingleSlot};
use pixsim_types::{Detector, PixelCharge, PixelHit};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::RuntimeError;
use crate::module::{EventContext, Module, ModuleSetup};

/// Readout clock period, in ns.
const CLOCK_NS: f64 = 25.0;

pub struct PixelDigitizer {
    bindings: Bindings,
    detector: Arc<Detector>,
    charges: SingleSlot<PixelCharge>,
    threshold: f64,
    gain: f64,
    hits: u64,
    below_threshold: u64,
}

impl PixelDigitizer {
    pub const NAME: &'static str = "PixelDigitizer";

    pub fn new(setup: &ModuleSetup<'_>, detector: &Arc<Detector>) -> Result<Self, RuntimeError> {
        let mut bindings = setup.bindings(setup.detector_identity(Self::NAME, detector));
        let charges = bindings.bind_single(MsgFlags::REQUIRED)?;
        let PipelineConfig {
            threshold_electrons,
            adc_gain,
            ..
        } = setup.config.pipeline;
        Ok(Self {
            bindings,
            detector: Arc::clone(detector),
            charges,
            threshold: threshold_electrons,
            gain: adc_gain,
            hits: 0,
            below_threshold: 0,
        })
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

impl Module for PixelDigitizer {
    fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    fn run(&mut self, event: &mut EventContext) -> Result<(), RuntimeError> {
        // Unmet requirement is reported by the driver after the event.
        let Some(message) = self.charges.get() else {
            return Ok(());
        };

        let mut hits = Vec::new();
        for charge in message.data() {
            if charge.charge < self.threshold {
                self.below_threshold += 1;
                continue;
            }
            hits.push(PixelHit {
                pixel: charge.pixel,
                time_ns: event.rng().gen_range(0.0..CLOCK_NS),
                signal: (charge.charge / self.gain).round() as u32,
            });
        }

        debug!(
            event = event.event(),
            detector = self.detector.name(),
            hits = hits.len(),
            "Digitized pixels"
        );
        self.hits += hits.len() as u64;
        self.bindings
            .dispatch(Message::new(hits, Arc::clone(&self.detector)))?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), RuntimeError> {
        info!(
            module = %self.bindings.identity(),
            hits = self.hits,
            below_threshold = self.below_threshold,
            "Digitization finished"
        );
        Ok(())
    }
}
