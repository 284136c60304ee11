//! Logs every deposit and particle it receives.

use pixsim_bus::{Bindings, MsgFlags, MultiSlot};
use pixsim_types::{DepositedCharge, MCParticle};
use tracing::{debug, info, trace};

use crate::error::RuntimeError;
use crate::module::{EventContext, Module, ModuleSetup};

pub struct DepositReader {
    bindings: Bindings,
    deposits: MultiSlot<DepositedCharge>,
    particles: MultiSlot<MCParticle>,
    total_deposits: u64,
    total_charge: u64,
}

impl DepositReader {
    pub const NAME: &'static str = "DepositReader";

    pub fn new(setup: &ModuleSetup<'_>) -> Result<Self, RuntimeError> {
        let mut bindings = setup.bindings(setup.identity(Self::NAME));
        let deposits = bindings.bind_multi(MsgFlags::NONE)?;
        let particles = bindings.bind_multi(MsgFlags::NONE)?;
        Ok(Self {
            bindings,
            deposits,
            particles,
            total_deposits: 0,
            total_charge: 0,
        })
    }

    pub fn total_deposits(&self) -> u64 {
        self.total_deposits
    }
}

impl Module for DepositReader {
    fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    fn run(&mut self, event: &mut EventContext) -> Result<(), RuntimeError> {
        for message in self.deposits.snapshot() {
            let detector = message.detector().map_or("<global>", |d| d.name());
            debug!(
                event = event.event(),
                detector,
                deposits = message.data().len(),
                "Received deposits"
            );
            for deposit in message.data() {
                trace!(
                    detector,
                    charge = deposit.charge,
                    carrier = %deposit.carrier,
                    local = %deposit.local_position,
                    global = %deposit.global_position,
                    "Deposit"
                );
                self.total_charge += u64::from(deposit.charge);
            }
            self.total_deposits += message.data().len() as u64;
        }

        for message in self.particles.snapshot() {
            for particle in message.data() {
                trace!(
                    particle = particle.particle_id,
                    path_mm = particle.path_length(),
                    begin = %particle.global_begin_point,
                    "Particle"
                );
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), RuntimeError> {
        info!(
            module = %self.bindings.identity(),
            deposits = self.total_deposits,
            charge = self.total_charge,
            "Deposit reading finished"
        );
        Ok(())
    }
}
