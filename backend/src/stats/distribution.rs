//! Occupancy distribution accumulator
//!
//! Maps an occupancy level `n` to the simulated time spent with exactly `n`
//! jobs present. Storage grows on demand to `max(16, 2 * index)` slots.
//! After [`OccupancyDistribution::normalize`] the slots form a probability
//! mass function.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest non-zero slot count reached by growth
const MIN_SLOTS: usize = 16;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("Cannot normalize a distribution with zero accumulated time")]
    ZeroTotal,

    #[error("Invalid amount {amount} for occupancy level {index}")]
    InvalidAmount { index: usize, amount: f64 },

    #[error("Failed to allocate {requested} distribution slots")]
    AllocationFailed { requested: usize },
}

/// Time-weighted occupancy histogram
///
/// # Example
/// ```
/// use tandem_simulator_core_rs::stats::OccupancyDistribution;
///
/// let mut dist = OccupancyDistribution::new();
/// dist.add(0, 3.0).unwrap();
/// dist.add(1, 1.0).unwrap();
///
/// dist.normalize().unwrap();
/// assert_eq!(dist.probability(0), 0.75);
/// assert_eq!(dist.probability(1), 0.25);
/// assert_eq!(dist.probability(9), 0.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupancyDistribution {
    slots: Vec<f64>,
}

impl OccupancyDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `amount` at occupancy level `index`
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount` is negative or not finite
    /// - `AllocationFailed` if the slots could not grow
    pub fn add(&mut self, index: usize, amount: f64) -> Result<(), DistributionError> {
        if !(amount.is_finite() && amount >= 0.0) {
            return Err(DistributionError::InvalidAmount { index, amount });
        }

        if index >= self.slots.len() {
            let target = MIN_SLOTS.max(2 * index);
            self.slots
                .try_reserve_exact(target - self.slots.len())
                .map_err(|_| DistributionError::AllocationFailed { requested: target })?;
            self.slots.resize(target, 0.0);
        }

        self.slots[index] += amount;
        Ok(())
    }

    /// Sum of all slots
    pub fn total(&self) -> f64 {
        self.slots.iter().sum()
    }

    /// Divide every slot by the total, turning accumulated time into a PMF
    ///
    /// # Errors
    /// `ZeroTotal` if nothing has been accumulated.
    pub fn normalize(&mut self) -> Result<(), DistributionError> {
        let total = self.total();
        if total <= 0.0 {
            return Err(DistributionError::ZeroTotal);
        }

        for slot in &mut self.slots {
            *slot /= total;
        }
        Ok(())
    }

    /// Normalized copy, leaving `self` untouched
    pub fn normalized(&self) -> Result<Self, DistributionError> {
        let mut copy = self.clone();
        copy.normalize()?;
        Ok(copy)
    }

    /// Value at level `n` (zero beyond the allocated slots)
    pub fn probability(&self, n: usize) -> f64 {
        self.slots.get(n).copied().unwrap_or(0.0)
    }

    pub fn slots(&self) -> &[f64] {
        &self.slots
    }

    /// Allocated slot count
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Highest level with a non-zero value
    pub fn max_level(&self) -> Option<usize> {
        self.slots.iter().rposition(|&v| v > 0.0)
    }

    /// Time-weighted mean occupancy; `None` when nothing was accumulated
    pub fn mean(&self) -> Option<f64> {
        let total = self.total();
        if total <= 0.0 {
            return None;
        }
        let weighted: f64 = self
            .slots
            .iter()
            .enumerate()
            .map(|(n, &v)| n as f64 * v)
            .sum();
        Some(weighted / total)
    }

    /// Largest absolute gap to `expected` over levels `0..levels`
    pub fn max_deviation(&self, expected: impl Fn(usize) -> f64, levels: usize) -> f64 {
        (0..levels)
            .map(|n| (self.probability(n) - expected(n)).abs())
            .fold(0.0, f64::max)
    }
}
