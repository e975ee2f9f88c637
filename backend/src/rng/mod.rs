//! Deterministic random number generation
//!
//! Uses xorshift64* algorithm for fast, deterministic random number generation.
//! The simulation core only depends on the [`UniformSource`] capability, so
//! callers may plug in any generator (or a scripted sequence in tests).

mod exponential;
mod xorshift;

pub use exponential::exponential;
pub use xorshift::RngManager;

/// A source of uniform draws in `[0, 1)`
///
/// Implementations must never return 1.0; the simulation aborts with
/// `SimulationError::UniformOutOfRange` on a draw outside `[0, 1)`.
/// Seeding policy belongs to the caller that constructs the source.
pub trait UniformSource {
    /// Draw the next value in `[0, 1)`
    fn next_uniform(&mut self) -> f64;
}

impl<R: UniformSource + ?Sized> UniformSource for &mut R {
    fn next_uniform(&mut self) -> f64 {
        (**self).next_uniform()
    }
}

impl<R: UniformSource + ?Sized> UniformSource for Box<R> {
    fn next_uniform(&mut self) -> f64 {
        (**self).next_uniform()
    }
}
