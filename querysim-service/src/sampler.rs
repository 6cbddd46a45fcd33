use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::profile::Bounds;

/// Pseudo-random sampler drawing phase targets from [`Bounds`].
///
/// A sampler is owned by a single call and never shared. Samples follow
/// `min + random() * (max - min)` with `random()` in `[0, 1)`, which degenerates to `min` when
/// both bounds are equal.
#[derive(Clone, Debug)]
pub struct Sampler {
    rng: SmallRng,
}

impl Sampler {
    /// Creates a sampler that produces a reproducible sequence for the given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Creates a sampler from a random seed.
    pub fn from_entropy() -> Self {
        Self::seeded(rand::random())
    }

    /// Samples a duration within `bounds`.
    pub fn duration(&mut self, bounds: Bounds<Duration>) -> Duration {
        let width = bounds.max() - bounds.min();
        bounds.min() + width.mul_f64(self.rng.random::<f64>())
    }

    /// Samples a byte count within `bounds`.
    pub fn bytes(&mut self, bounds: Bounds<u64>) -> u64 {
        let width = bounds.max() - bounds.min();
        bounds.min() + (self.rng.random::<f64>() * width as f64) as u64
    }
}
