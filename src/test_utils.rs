//! Seeded random vectors and tolerance assertions shared by the unit tests.

use crate::fft::Real;
use approx::assert_abs_diff_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Uniform samples in `[-1, 1)` from a seeded generator.
pub fn random_vec<T: Real>(len: usize, seed: u64) -> Vec<T> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| T::from_f64_lossy(rng.random_range(-1.0..1.0)))
        .collect()
}

/// Uniform samples in `[low, high)` from a seeded generator.
pub fn random_range_vec<T: Real>(len: usize, low: f64, high: f64, seed: u64) -> Vec<T> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| T::from_f64_lossy(rng.random_range(low..high)))
        .collect()
}

pub fn dot<T: Real>(a: &[T], b: &[T]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x.as_f64() * y.as_f64()).sum()
}

pub fn assert_all_close<T: Real>(actual: &[T], expected: &[T], epsilon: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_abs_diff_eq!(a.as_f64(), e.as_f64(), epsilon = epsilon);
    }
}
