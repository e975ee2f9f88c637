//! PyO3 wrapper for Simulation
//!
//! # Example (from Python)
//!
//! ```python
//! from tandem_simulator_core_rs import TandemSimulation
//!
//! sim = TandemSimulation(
//!     {"arrival_rate": 2.0, "service_rates": [3.0, 5.0], "duration_horizon": 1e4},
//!     seed=12345,
//! )
//! report = sim.run()
//! print(report["per_stage"][0][:5])
//! ```

use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::types::{parse_simulation_config, report_to_py, step_result_to_py};
use crate::orchestrator::{Simulation, SimulationError};

fn runtime_error(context: &str, e: SimulationError) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}: {}", context, e))
}

/// Python wrapper for a seeded tandem simulation
#[pyclass(name = "TandemSimulation")]
pub struct PyTandemSimulation {
    inner: Simulation,
}

#[pymethods]
impl PyTandemSimulation {
    /// Create a simulation from a config dict and a seed
    ///
    /// Raises ValueError if the configuration is invalid.
    #[new]
    fn new(config: &Bound<'_, PyDict>, seed: u64) -> PyResult<Self> {
        let rust_config = parse_simulation_config(config)?;
        let inner = Simulation::with_seed(rust_config, seed)
            .map_err(|e| runtime_error("Failed to create simulation", e))?;
        Ok(Self { inner })
    }

    /// Process one event; returns None once the run is complete
    fn step(&mut self, py: Python<'_>) -> PyResult<Option<Py<PyDict>>> {
        let result = self
            .inner
            .step()
            .map_err(|e| runtime_error("Step failed", e))?;
        result.map(|r| step_result_to_py(py, &r)).transpose()
    }

    /// Run to completion and return the normalized distributions
    fn run(&mut self, py: Python<'_>) -> PyResult<Py<PyDict>> {
        let report = self.inner.run().map_err(|e| runtime_error("Run failed", e))?;
        report_to_py(py, &report)
    }

    /// Current simulated time
    fn clock(&self) -> f64 {
        self.inner.clock()
    }

    fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    /// Serialize the simulation state to a JSON string
    fn save_state(&self) -> PyResult<String> {
        self.inner
            .save_state()
            .map_err(|e| runtime_error("Failed to save state", e))
    }

    /// Restore a simulation from `save_state` output
    #[staticmethod]
    fn load_state(config: &Bound<'_, PyDict>, state_json: &str) -> PyResult<Self> {
        let rust_config = parse_simulation_config(config)?;
        let inner = Simulation::load_state(rust_config, state_json)
            .map_err(|e| runtime_error("Failed to load state", e))?;
        Ok(Self { inner })
    }
}
