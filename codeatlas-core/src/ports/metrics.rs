// codeatlas-core/src/ports/metrics.rs
//
// A minimal metrics port threaded through `PipelineContext` (spec.md §9),
// satisfied by a `tracing`-backed implementation so the ambient stack
// does not require a separate metrics backend dependency.

pub trait Metrics: Send + Sync {
    fn incr_counter(&self, name: &str, value: u64);
    fn set_gauge(&self, name: &str, value: f64);
}
