//! # Demo Pipeline
//!
//! ```text
//! DepositionGenerator ──DepositedCharge──→ ChargeTransfer:<det> ──PixelCharge──→ PixelDigitizer:<det> ──PixelHit
//!          │                                                                              (REQUIRED)
//!          └─────────DepositedCharge, MCParticle──→ DepositReader
//!
//! MessageMonitor: any-type filter on everything above
//! ```

pub mod charge_transfer;
pub mod deposit_reader;
pub mod deposition_generator;
pub mod message_monitor;
pub mod pixel_digitizer;

pub use charge_transfer::ChargeTransfer;
pub use deposit_reader::DepositReader;
pub use deposition_generator::DepositionGenerator;
pub use message_monitor::{MessageMonitor, MonitorTally};
pub use pixel_digitizer::PixelDigitizer;

use crate::simulation::Simulation;

/// Append the demo chain to `simulation`. Every lane's monitor reports into
/// `tally`.
pub fn install_demo_pipeline(simulation: &mut Simulation, tally: &MonitorTally) {
    let tally = tally.clone();
    simulation
        .add_module(DepositionGenerator::new)
        .add_detector_module(ChargeTransfer::new)
        .add_detector_module(PixelDigitizer::new)
        .add_module(DepositReader::new)
        .add_module(move |setup| MessageMonitor::new(setup, tally.clone()));
}
