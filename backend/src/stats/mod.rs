//! Occupancy statistics
//!
//! Time-weighted occupancy histograms and the reference laws they are
//! compared against.

pub mod distribution;

pub use distribution::{DistributionError, OccupancyDistribution};

/// M/M/1 stationary occupancy law: `P(n) = (1 - rho) * rho^n`
///
/// In a tandem of exponential servers fed by a Poisson stream, each stage
/// behaves as an independent M/M/1 queue with `rho = arrival_rate /
/// service_rate`, so this also predicts every stage of the network.
///
/// # Example
/// ```
/// use tandem_simulator_core_rs::stats::geometric_pmf;
///
/// assert!((geometric_pmf(0.5, 0) - 0.5).abs() < 1e-12);
/// assert!((geometric_pmf(0.5, 2) - 0.125).abs() < 1e-12);
/// ```
pub fn geometric_pmf(rho: f64, n: usize) -> f64 {
    (1.0 - rho) * rho.powi(n as i32)
}
