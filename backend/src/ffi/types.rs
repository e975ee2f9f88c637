//! Type conversion utilities for FFI boundary
//!
//! Converts between Rust types and PyO3-compatible types (PyDict, PyList).

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::orchestrator::{RunReport, SimulationConfig, StepResult};

/// Extract a required field from a Python dict with clear error messages.
fn extract_required<'py, T>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<T>
where
    T: FromPyObject<'py>,
{
    dict.get_item(key)?
        .ok_or_else(|| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "Missing required field '{}'",
                key
            ))
        })?
        .extract()
}

/// Extract a field with a default value if missing.
fn extract_with_default<'py, T>(dict: &Bound<'py, PyDict>, key: &str, default: T) -> PyResult<T>
where
    T: FromPyObject<'py>,
{
    match dict.get_item(key)? {
        Some(value) => value.extract(),
        None => Ok(default),
    }
}

/// Build a [`SimulationConfig`] from a Python dict
///
/// Expected keys: `arrival_rate`, `service_rates`, `duration_horizon`,
/// optional `record_trace`.
pub fn parse_simulation_config(dict: &Bound<'_, PyDict>) -> PyResult<SimulationConfig> {
    let config = SimulationConfig {
        arrival_rate: extract_required(dict, "arrival_rate")?,
        service_rates: extract_required(dict, "service_rates")?,
        duration_horizon: extract_required(dict, "duration_horizon")?,
        record_trace: extract_with_default(dict, "record_trace", false)?,
    };

    config
        .validate()
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))?;

    Ok(config)
}

/// Convert a step result to a Python dict
pub fn step_result_to_py(py: Python<'_>, result: &StepResult) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("time", result.event.time())?;
    dict.set_item("job_id", result.event.job_id())?;
    dict.set_item("event_type", result.event.event_type())?;
    dict.set_item("stage", result.event.stage())?;
    dict.set_item("elapsed", result.elapsed)?;
    dict.set_item("admitted", result.admitted)?;
    Ok(dict.unbind())
}

/// Convert a run report to a Python dict of plain lists and numbers
pub fn report_to_py(py: Python<'_>, report: &RunReport) -> PyResult<Py<PyDict>> {
    let per_stage = PyList::empty_bound(py);
    for dist in &report.per_stage {
        per_stage.append(dist.slots().to_vec())?;
    }

    let dict = PyDict::new_bound(py);
    dict.set_item("per_stage", per_stage)?;
    dict.set_item("aggregate", report.aggregate.slots().to_vec())?;
    dict.set_item("total_jobs", report.total_jobs)?;
    dict.set_item("departed_jobs", report.departed_jobs)?;
    dict.set_item("events_processed", report.events_processed)?;
    dict.set_item("final_clock", report.final_clock)?;
    Ok(dict.unbind())
}
