//! Benchmark harness crate for the kestrel scheduler runtime.
//!
//! Individual benchmarks live under `benches/`. Import this crate when
//! constructing composite scenarios (e.g., multi-scheduler pipelines).

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
