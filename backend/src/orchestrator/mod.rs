//! Orchestrator - simulation context and driver loop
//!
//! See `engine.rs` for the state machine and `checkpoint.rs` for save/load.

pub mod checkpoint;
pub mod engine;

// Re-export main types for convenience
pub use engine::{run, RunReport, Simulation, SimulationConfig, SimulationError, StepResult};

// Re-export checkpoint types
pub use checkpoint::{compute_config_hash, StageSnapshot, StateSnapshot};
