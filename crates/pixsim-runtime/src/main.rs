//! # PixSim
//!
//! Runs the demo pixel-detector chain over a configurable number of events.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging and metrics (`PIXSIM_LOG_LEVEL`, `PIXSIM_JSON_LOGS`, ...)
//! 2. Load the run configuration (`PIXSIM_EVENTS`, `PIXSIM_WORKERS`, ...)
//! 3. Install the demo pipeline
//! 4. Run every event and print the summary as JSON; the Prometheus text
//!    exposition is logged at debug level

use anyhow::{Context, Result};
use pixsim_runtime::{install_demo_pipeline, MonitorTally, RuntimeConfig, Simulation};
use pixsim_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use serde_json::json;
use tracing::{debug, info};

fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = RuntimeConfig::from_env().context("Invalid run configuration")?;
    info!(
        events = config.events,
        workers = config.workers,
        seed = config.seed,
        detectors = config.detectors.len(),
        "Configuration loaded"
    );

    let tally = MonitorTally::new();
    let mut simulation = Simulation::new(config).context("Failed to set up simulation")?;
    install_demo_pipeline(&mut simulation, &tally);

    let summary = simulation.run().context("Simulation failed")?;
    debug!(metrics = %encode_metrics()?, "Prometheus metrics after run");

    let report = json!({
        "summary": summary,
        "messages_by_payload": tally.counts(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
