//! # PixSim Telemetry
//!
//! Logging and metrics for the simulation runtime.
//!
//! ## Components
//!
//! - **Logging**: `tracing` subscriber with `EnvFilter`, plain or JSON output
//! - **Metrics**: Prometheus counters, gauges and histograms in a global registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pixsim_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("Failed to init telemetry");
//!     // Simulation runs here
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PIXSIM_LOG_LEVEL` | `info` | Log filter (falls back to `RUST_LOG`) |
//! | `PIXSIM_JSON_LOGS` | `false` | JSON formatted logs |
//! | `PIXSIM_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `PIXSIM_THREAD_IDS` | `false` | Include thread ids in log lines |
//! | `PIXSIM_SERVICE_NAME` | `pixsim` | Service name in the startup line |

#![allow(missing_docs)]

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingHandle};
pub use metrics::{
    encode_metrics, publish_bus_totals, register_metrics, BusTotals, HistogramTimer,
    MetricsHandle, DELEGATES_REGISTERED, EVENTS_PROCESSED, EVENT_DURATION, FAILED_DISPATCHES,
    MESSAGES_DISPATCHED, MESSAGES_OBSERVED, MESSAGE_DELIVERIES, MODULE_ERRORS,
    UNRECEIVED_MESSAGES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and register metrics.
///
/// Returns a guard to hold for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    let logging = init_logging(&config)?;

    Ok(TelemetryGuard {
        _logging: logging,
        _metrics: metrics,
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingHandle,
    _metrics: MetricsHandle,
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Convenience macro for recording a metric with a value.
#[macro_export]
macro_rules! metric_observe {
    ($metric:expr, $value:expr) => {
        $metric.observe($value)
    };
    ($metric:expr, $labels:expr, $value:expr) => {
        $metric.with_label_values($labels).observe($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_inc_macro() {
        let before = MODULE_ERRORS.with_label_values(&["Test", "config"]).get();
        metric_inc!(MODULE_ERRORS, &["Test", "config"]);
        assert_eq!(
            MODULE_ERRORS.with_label_values(&["Test", "config"]).get(),
            before + 1.0
        );
    }

    #[test]
    fn test_metric_observe_macro() {
        let before = EVENT_DURATION.get_sample_count();
        metric_observe!(EVENT_DURATION, 0.001);
        assert!(EVENT_DURATION.get_sample_count() > before);
    }
}
