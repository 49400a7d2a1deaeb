//! bpk-runtime
//!
//! Async orchestration around the pure reconciler:
//! - engine-wide mutation lock
//! - simulation-thread dispatch (dedicated thread or host pump)
//! - the public engine surface and map lifecycle hooks
//! - tracing and process bootstrap

pub mod bootstrap;
mod engine;
mod lock;
mod sim;
pub mod telemetry;

pub use engine::{PassSummary, ReconciliationEngine};
pub use lock::{MutationGuard, MutationLock};
pub use sim::{SimPump, SimThread};
