//! Injectable randomness for the mock simulator.

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;

    /// Uniform index into a collection of `len` items. `len` must be non-zero.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn pick_index(&mut self, len: usize) -> usize {
        let idx = (self.next_f64() * len as f64) as usize;
        idx.min(len.saturating_sub(1))
    }

    /// Uniform duration in `[min, max)`.
    fn duration_between(&mut self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        min + (max - min).mul_f64(self.next_f64())
    }
}

/// [`RandomSource`] backed by a `rand` generator.
pub struct RngSource<R = StdRng> {
    rng: R,
}

impl RngSource<StdRng> {
    /// Deterministic source for reproducible runs.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    #[must_use]
    pub fn from_os() -> Self {
        Self { rng: StdRng::from_os_rng() }
    }
}

impl<R: Rng + Send> RandomSource for RngSource<R> {
    fn next_f64(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Replays a fixed sequence of draws, then repeats `fallback` forever.
pub struct ScriptedSource {
    values: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedSource {
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self { values: values.into_iter().collect(), fallback }
    }
}

impl RandomSource for ScriptedSource {
    fn next_f64(&mut self) -> f64 {
        self.values.pop_front().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_replays_then_falls_back() {
        let mut src = ScriptedSource::new([0.1, 0.9], 0.5);
        assert!((src.next_f64() - 0.1).abs() < f64::EPSILON);
        assert!((src.next_f64() - 0.9).abs() < f64::EPSILON);
        assert!((src.next_f64() - 0.5).abs() < f64::EPSILON);
        assert!((src.next_f64() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn pick_index_stays_in_bounds() {
        let mut src = ScriptedSource::new([0.0, 0.999_999, 0.5], 0.0);
        assert_eq!(src.pick_index(6), 0);
        assert_eq!(src.pick_index(6), 5);
        assert_eq!(src.pick_index(4), 2);
    }

    #[test]
    fn duration_between_interpolates() {
        let mut src = ScriptedSource::new([0.5], 0.0);
        let d = src.duration_between(Duration::from_secs(1), Duration::from_secs(3));
        assert_eq!(d, Duration::from_secs(2));
        assert_eq!(src.duration_between(Duration::from_secs(2), Duration::from_secs(2)), Duration::from_secs(2));
    }

    #[test]
    fn seeded_rng_is_reproducible_and_in_range() {
        let mut a = RngSource::seeded(42);
        let mut b = RngSource::seeded(42);
        for _ in 0..100 {
            let x = a.next_f64();
            assert!((0.0..1.0).contains(&x));
            assert!((x - b.next_f64()).abs() < f64::EPSILON);
        }
    }
}
