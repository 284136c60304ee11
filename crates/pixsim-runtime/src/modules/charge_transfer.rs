//! Projects deposited charge onto the pixel implants of one detector.
//!
//! Binds every `DepositedCharge` message of its detector and sends exactly one
//! `PixelCharge` message per event, empty if nothing was deposited.

use pixsim_bus::{Bindings, Message, MsgFlags, MultiSlot};
use pixsim_types::{DepositedCharge, Detector, PixelCharge, PixelIndex};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::RuntimeError;
use crate::module::{EventContext, Module, ModuleSetup};

pub struct ChargeTransfer {
    bindings: Bindings,
    detector: Arc<Detector>,
    deposits: MultiSlot<DepositedCharge>,
    lost_charge: u64,
}

impl ChargeTransfer {
    pub const NAME: &'static str = "ChargeTransfer";

    pub fn new(setup: &ModuleSetup<'_>, detector: &Arc<Detector>) -> Result<Self, RuntimeError> {
        let mut bindings = setup.bindings(setup.detector_identity(Self::NAME, detector));
        let deposits = bindings.bind_multi(MsgFlags::NONE)?;
        Ok(Self {
            bindings,
            detector: Arc::clone(detector),
            deposits,
            lost_charge: 0,
        })
    }

    /// Charge deposited outside the pixel matrix so far.
    pub fn lost_charge(&self) -> u64 {
        self.lost_charge
    }
}

impl Module for ChargeTransfer {
    fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    fn run(&mut self, event: &mut EventContext) -> Result<(), RuntimeError> {
        let mut pixels: BTreeMap<PixelIndex, f64> = BTreeMap::new();
        for message in self.deposits.snapshot() {
            for deposit in message.data() {
                match self.detector.pixel_at(deposit.local_position) {
                    Some(pixel) => *pixels.entry(pixel).or_default() += f64::from(deposit.charge),
                    None => {
                        trace!(position = %deposit.local_position, "Deposit outside pixel matrix");
                        self.lost_charge += u64::from(deposit.charge);
                    }
                }
            }
        }

        debug!(
            event = event.event(),
            detector = self.detector.name(),
            pixels = pixels.len(),
            "Transferred charge"
        );

        let charges = pixels
            .into_iter()
            .map(|(pixel, charge)| PixelCharge { pixel, charge })
            .collect();
        self.bindings
            .dispatch(Message::new(charges, Arc::clone(&self.detector)))?;
        Ok(())
    }
}
