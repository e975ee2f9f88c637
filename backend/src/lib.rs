//! Tandem Queue Simulator Core - Rust Engine
//!
//! Discrete-event simulation of N single-server stages in series, fed by a
//! Poisson stream at stage 0, estimating steady-state occupancy
//! distributions per stage and for the whole network.
//!
//! # Architecture
//!
//! - **core**: Simulated clock
//! - **rng**: Uniform sources and exponential variates
//! - **models**: Events, waiting queues, stages, network state
//! - **events**: Event priority queue (min-heap)
//! - **stats**: Time-weighted occupancy distributions
//! - **orchestrator**: Simulation context, driver loop, checkpoints
//!
//! # Critical Invariants
//!
//! 1. At most one job is in service per stage
//! 2. Events are processed in non-decreasing time order
//! 3. All randomness comes from the caller's uniform source
//!
//! # Example
//!
//! ```rust
//! use tandem_simulator_core_rs::{run, RngManager, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     arrival_rate: 2.0,
//!     service_rates: vec![3.0],
//!     duration_horizon: 200.0,
//!     record_trace: false,
//! };
//!
//! let report = run(config, RngManager::new(42)).unwrap();
//! assert!(report.per_stage[0].probability(0) > 0.0);
//! ```

// Module declarations
pub mod core;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod rng;
pub mod stats;

// Re-exports for convenience
pub use crate::core::time::SimClock;
pub use events::EventQueue;
pub use models::{Event, EventKind, EventLog, JobId, QueueError, TraceRecord, WaitingQueue};
pub use orchestrator::{
    run, RunReport, Simulation, SimulationConfig, SimulationError, StateSnapshot, StepResult,
};
pub use rng::{RngManager, UniformSource};
pub use stats::{DistributionError, OccupancyDistribution};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn tandem_simulator_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::simulation::PyTandemSimulation>()?;
    Ok(())
}
