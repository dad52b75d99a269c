// codeatlas-core/src/infrastructure/adapters/metrics_tracing.rs
//
// A `Metrics` implementation that emits `tracing` events rather than
// talking to a metrics backend, per spec.md §9's ambient-concerns
// guidance: logging/metrics ride on the same instrumentation the rest of
// the pipeline already uses.

use tracing::info;

use crate::ports::metrics::Metrics;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl Metrics for TracingMetrics {
    fn incr_counter(&self, name: &str, value: u64) {
        info!(metric = name, delta = value, kind = "counter", "metric");
    }

    fn set_gauge(&self, name: &str, value: f64) {
        info!(metric = name, value, kind = "gauge", "metric");
    }
}
