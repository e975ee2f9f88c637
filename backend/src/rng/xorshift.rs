//! xorshift64* random number generator
//!
//! This is a fast, high-quality PRNG that is deterministic and suitable
//! for simulation purposes.
//!
//! # Algorithm
//!
//! xorshift64* is a variant of xorshift that passes TestU01's BigCrush
//! statistical tests. It uses 64-bit state and produces 64-bit output.
//!
//! # Determinism
//!
//! Same seed → same sequence of uniform draws → same event sequence and
//! same occupancy distributions.

use serde::{Deserialize, Serialize};

use super::UniformSource;

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use tandem_simulator_core_rs::RngManager;
/// use tandem_simulator_core_rs::rng::UniformSource;
///
/// let mut rng = RngManager::new(12345);
/// let u = rng.next_uniform();
/// assert!((0.0..1.0).contains(&u));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngManager {
    /// Internal state (64-bit)
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    ///
    /// A zero seed is replaced by 1 because xorshift never leaves the
    /// all-zero state.
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Get current RNG state (for checkpointing/replay)
    ///
    /// # Example
    /// ```
    /// use tandem_simulator_core_rs::RngManager;
    ///
    /// let mut rng = RngManager::new(12345);
    /// rng.next();
    ///
    /// let mut resumed = RngManager::new(rng.get_state());
    /// assert_eq!(rng.next(), resumed.next());
    /// ```
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Generate random f64 in range [0.0, 1.0)
    ///
    /// Keeps the top 53 bits of the draw, so the largest possible result is
    /// `1 - 2^-53`, strictly below 1.
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }
}

impl UniformSource for RngManager {
    fn next_uniform(&mut self) -> f64 {
        self.next_f64()
    }
}
