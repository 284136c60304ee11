//! Straight-line particle gun depositing charge in every detector plane.
//!
//! Per event it sends one global `MCTrack` message, then for each detector
//! one `MCParticle` and one `DepositedCharge` message. Every message is only
//! built into a dispatch if someone would receive it.

use pixsim_bus::{Bindings, Message};
use pixsim_types::{CarrierType, DepositedCharge, Detector, MCParticle, MCTrack, Position3D};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::RuntimeError;
use crate::module::{EventContext, Module, ModuleSetup};

/// Speed of light in mm/ns.
const SPEED_OF_LIGHT: f64 = 299.792_458;

/// PDG code of a negative pion.
const PION: i32 = -211;

/// Half width of the beam spot, in mm.
const BEAM_SPOT_MM: f64 = 2.0;

/// Maximum slope of a track with respect to the beam axis.
const MAX_SLOPE: f64 = 0.002;

/// Beam energy, in keV.
const BEAM_ENERGY_KEV: f64 = 120.0e6;

pub struct DepositionGenerator {
    bindings: Bindings,
    detectors: Vec<Arc<Detector>>,
    pipeline: PipelineConfig,
    deposits_sent: u64,
}

/// One straight track: `position(z) = origin + slope * (z - origin.z)`.
#[derive(Debug, Clone, Copy)]
struct Trajectory {
    origin: Position3D,
    slope: (f64, f64),
}

impl Trajectory {
    fn at(&self, z: f64) -> Position3D {
        let dz = z - self.origin.z;
        Position3D::new(
            self.origin.x + self.slope.0 * dz,
            self.origin.y + self.slope.1 * dz,
            z,
        )
    }
}

impl DepositionGenerator {
    pub const NAME: &'static str = "DepositionGenerator";

    pub fn new(setup: &ModuleSetup<'_>) -> Result<Self, RuntimeError> {
        Ok(Self {
            bindings: setup.bindings(setup.identity(Self::NAME)),
            detectors: setup.detectors.to_vec(),
            pipeline: setup.config.pipeline.clone(),
            deposits_sent: 0,
        })
    }

    fn trajectories(&self, event: &mut EventContext) -> Vec<Trajectory> {
        let first_z = self
            .detectors
            .iter()
            .map(|d| d.position().z)
            .fold(f64::INFINITY, f64::min);
        let rng = event.rng();
        (0..self.pipeline.particles_per_event)
            .map(|_| Trajectory {
                origin: Position3D::new(
                    rng.gen_range(-BEAM_SPOT_MM..=BEAM_SPOT_MM),
                    rng.gen_range(-BEAM_SPOT_MM..=BEAM_SPOT_MM),
                    first_z - 10.0,
                ),
                slope: (
                    rng.gen_range(-MAX_SLOPE..=MAX_SLOPE),
                    rng.gen_range(-MAX_SLOPE..=MAX_SLOPE),
                ),
            })
            .collect()
    }

    /// Particles and deposits of all trajectories crossing `detector`.
    fn deposit(
        &self,
        detector: &Detector,
        trajectories: &[Trajectory],
        event: &mut EventContext,
    ) -> (Vec<MCParticle>, Vec<DepositedCharge>) {
        let half_thickness = detector.thickness() / 2.0;
        let centre = detector.position();
        let steps = self.pipeline.deposits_per_particle;

        let mut particles = Vec::new();
        let mut deposits = Vec::new();
        for trajectory in trajectories {
            let global_begin = trajectory.at(centre.z - half_thickness);
            let global_end = trajectory.at(centre.z + half_thickness);
            let local_begin = to_local(detector, global_begin, -half_thickness);
            let local_end = to_local(detector, global_end, half_thickness);
            if !detector.contains(local_begin) || !detector.contains(local_end) {
                continue;
            }

            let index = particles.len();
            particles.push(MCParticle {
                local_begin_point: local_begin,
                global_begin_point: global_begin,
                local_end_point: local_end,
                global_end_point: global_end,
                particle_id: PION,
                parent: None,
            });

            let step_um = local_begin.distance(&local_end) * 1000.0 / steps as f64;
            for step in 0..steps {
                let fraction = (step as f64 + 0.5) / steps as f64;
                let local = interpolate(local_begin, local_end, fraction);
                let fluctuation: f64 = event.rng().gen_range(0.7..1.6);
                let charge = (self.pipeline.pairs_per_um * step_um * fluctuation).round() as u32;
                let global = detector.to_global(local);
                deposits.push(DepositedCharge {
                    local_position: local,
                    global_position: global,
                    carrier: CarrierType::Electron,
                    charge,
                    event_time_ns: (global.z - trajectory.origin.z) / SPEED_OF_LIGHT,
                    mc_particle: Some(index),
                });
            }
        }
        (particles, deposits)
    }
}

/// Local coordinates of a point on a sensor surface; `depth` is the exact
/// local z of that surface.
fn to_local(detector: &Detector, global: Position3D, depth: f64) -> Position3D {
    let origin = detector.position();
    Position3D::new(global.x - origin.x, global.y - origin.y, depth)
}

fn interpolate(a: Position3D, b: Position3D, fraction: f64) -> Position3D {
    Position3D::new(
        a.x + (b.x - a.x) * fraction,
        a.y + (b.y - a.y) * fraction,
        a.z + (b.z - a.z) * fraction,
    )
}

impl Module for DepositionGenerator {
    fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    fn run(&mut self, event: &mut EventContext) -> Result<(), RuntimeError> {
        let trajectories = self.trajectories(event);

        let tracks = Message::global(
            trajectories
                .iter()
                .map(|t| MCTrack {
                    particle_id: PION,
                    origin: t.origin,
                    initial_kinetic_energy_kev: BEAM_ENERGY_KEV,
                    parent: None,
                })
                .collect(),
        );
        if self.bindings.has_receiver(&tracks) {
            self.bindings.dispatch(tracks)?;
        }

        for detector in self.detectors.clone() {
            let (particles, deposits) = self.deposit(&detector, &trajectories, event);
            debug!(
                event = event.event(),
                detector = detector.name(),
                particles = particles.len(),
                deposits = deposits.len(),
                "Generated deposits"
            );

            let particles = Message::new(particles, Arc::clone(&detector));
            if self.bindings.has_receiver(&particles) {
                self.bindings.dispatch(particles)?;
            }

            let deposits = Message::new(deposits, detector);
            if self.bindings.has_receiver(&deposits) {
                self.deposits_sent += deposits.data().len() as u64;
                self.bindings.dispatch(deposits)?;
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), RuntimeError> {
        info!(
            module = %self.bindings.identity(),
            deposits = self.deposits_sent,
            "Deposition finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use pixsim_bus::{Messenger, MsgFlags};
    use pixsim_types::LaneId;

    #[test]
    fn test_deposits_inside_sensor_and_linked_to_particles() {
        let messenger = Arc::new(Messenger::new());
        let config = RuntimeConfig::default();
        let detectors = config.build_detectors().expect("valid defaults");
        let setup = ModuleSetup {
            messenger: &messenger,
            lane: LaneId(0),
            detectors: &detectors,
            config: &config,
        };

        let mut generator = DepositionGenerator::new(&setup).expect("construct");
        let mut reader = setup.bindings(setup.identity("Reader"));
        let deposits = reader.bind_multi::<DepositedCharge>(MsgFlags::NONE).expect("bind");
        let particles = reader.bind_multi::<MCParticle>(MsgFlags::NONE).expect("bind");

        let mut event = EventContext::new(0, LaneId(0), config.seed);
        generator.run(&mut event).expect("run");

        assert_eq!(deposits.len(), detectors.len());
        assert_eq!(particles.len(), detectors.len());
        for (message, particle_message) in deposits.snapshot().iter().zip(particles.snapshot().iter()) {
            let detector = message.detector().expect("per-detector message");
            assert_eq!(
                message.data().len(),
                particle_message.data().len() * config.pipeline.deposits_per_particle
            );
            for deposit in message.data() {
                assert!(detector.contains(deposit.local_position));
                let index = deposit.mc_particle.expect("linked");
                assert!(index < particle_message.data().len());
                assert!(deposit.charge > 0);
            }
        }

        reader.release().expect("release");
        generator.teardown().expect("teardown");
    }

    #[test]
    fn test_nothing_dispatched_without_receivers() {
        let messenger = Arc::new(Messenger::new());
        let config = RuntimeConfig::default();
        let detectors = config.build_detectors().expect("valid defaults");
        let setup = ModuleSetup {
            messenger: &messenger,
            lane: LaneId(0),
            detectors: &detectors,
            config: &config,
        };

        let mut generator = DepositionGenerator::new(&setup).expect("construct");
        let mut event = EventContext::new(0, LaneId(0), config.seed);
        generator.run(&mut event).expect("run");

        assert!(messenger.sent_messages(LaneId(0)).is_empty());
        assert_eq!(messenger.stats().messages_dispatched, 0);
    }
}
