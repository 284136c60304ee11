//! Prometheus metrics for the simulation runtime.
//!
//! All metrics follow the naming convention: `pixsim_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., messages_dispatched_total)
//! - **Gauge**: Value that can go up or down (e.g., delegates_registered)
//! - **Histogram**: Distribution of values (e.g., event_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // MESSENGER METRICS
    // =========================================================================

    /// Dispatches that completed
    pub static ref MESSAGES_DISPATCHED: Counter = Counter::new(
        "pixsim_bus_messages_dispatched_total",
        "Total number of messages dispatched without error"
    ).expect("metric creation failed");

    /// Deliveries accepted by delegates
    pub static ref MESSAGE_DELIVERIES: Counter = Counter::new(
        "pixsim_bus_deliveries_total",
        "Total number of messages stored or accepted by delegates"
    ).expect("metric creation failed");

    /// Dispatches aborted by a delegate error
    pub static ref FAILED_DISPATCHES: Counter = Counter::new(
        "pixsim_bus_failed_dispatches_total",
        "Total number of dispatches aborted by a delegate error"
    ).expect("metric creation failed");

    /// Dispatches no delegate accepted
    pub static ref UNRECEIVED_MESSAGES: Counter = Counter::new(
        "pixsim_bus_unreceived_messages_total",
        "Total number of dispatched messages no delegate accepted"
    ).expect("metric creation failed");

    /// Delegates currently registered
    pub static ref DELEGATES_REGISTERED: Gauge = Gauge::new(
        "pixsim_bus_delegates_registered",
        "Number of delegates currently registered"
    ).expect("metric creation failed");

    /// Messages seen by monitoring filters, by payload type
    pub static ref MESSAGES_OBSERVED: CounterVec = CounterVec::new(
        Opts::new("pixsim_bus_messages_observed_total", "Messages observed by monitors"),
        &["payload"]
    ).expect("metric creation failed");

    // =========================================================================
    // RUNTIME METRICS
    // =========================================================================

    /// Units of work completed, by lane
    pub static ref EVENTS_PROCESSED: CounterVec = CounterVec::new(
        Opts::new("pixsim_runtime_events_processed_total", "Events processed"),
        &["lane"]
    ).expect("metric creation failed");

    /// Wall time of one unit of work
    pub static ref EVENT_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "pixsim_runtime_event_duration_seconds",
            "Time spent running all modules for one event"
        ).buckets(exponential_buckets(0.00001, 2.0, 18).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Module errors by module and type
    pub static ref MODULE_ERRORS: CounterVec = CounterVec::new(
        Opts::new("pixsim_runtime_module_errors_total", "Errors by module and type"),
        &["module", "error_type"]
    ).expect("metric creation failed");
}

/// Handle proving the metrics were registered.
#[derive(Debug)]
pub struct MetricsHandle {
    pub registered: usize,
}

/// Register all metrics with the global registry.
///
/// Metrics already registered by an earlier call are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Messenger
        Box::new(MESSAGES_DISPATCHED.clone()),
        Box::new(MESSAGE_DELIVERIES.clone()),
        Box::new(FAILED_DISPATCHES.clone()),
        Box::new(UNRECEIVED_MESSAGES.clone()),
        Box::new(DELEGATES_REGISTERED.clone()),
        Box::new(MESSAGES_OBSERVED.clone()),
        // Runtime
        Box::new(EVENTS_PROCESSED.clone()),
        Box::new(EVENT_DURATION.clone()),
        Box::new(MODULE_ERRORS.clone()),
    ];

    let mut registered = 0;
    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) => registered += 1,
            Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { registered })
}

/// Totals read from a messenger at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusTotals {
    pub dispatched: u64,
    pub deliveries: u64,
    pub failed: u64,
    pub unreceived: u64,
    pub active_delegates: u64,
}

/// Add a messenger's totals to the global counters.
pub fn publish_bus_totals(totals: BusTotals) {
    MESSAGES_DISPATCHED.inc_by(totals.dispatched as f64);
    MESSAGE_DELIVERIES.inc_by(totals.deliveries as f64);
    FAILED_DISPATCHES.inc_by(totals.failed as f64);
    UNRECEIVED_MESSAGES.inc_by(totals.unreceived as f64);
    DELEGATES_REGISTERED.set(totals.active_delegates as f64);
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
