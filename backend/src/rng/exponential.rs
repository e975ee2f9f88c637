//! Exponential variate generation by inversion

/// Convert a uniform draw `u` in `[0, 1)` into an exponential duration
///
/// Returns `-ln(1 - u) / rate`, so the mean duration is `1 / rate`. Using
/// `1 - u` keeps the logarithm argument in `(0, 1]`.
///
/// # Panics
/// Panics if `u` is outside `[0, 1)` or `rate` is not strictly positive.
///
/// # Example
/// ```
/// use tandem_simulator_core_rs::rng::exponential;
///
/// assert_eq!(exponential(2.0, 0.0), 0.0);
///
/// let median = exponential(2.0, 0.5);
/// assert!((median - std::f64::consts::LN_2 / 2.0).abs() < 1e-12);
/// ```
pub fn exponential(rate: f64, u: f64) -> f64 {
    assert!(rate > 0.0, "rate must be positive");
    assert!((0.0..1.0).contains(&u), "uniform draw must lie in [0, 1)");

    -(1.0 - u).ln() / rate
}
