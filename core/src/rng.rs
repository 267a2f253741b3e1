//! Random number generation for audit sampling and test populations.
//!
//! RULE: Sampling never calls a platform RNG directly. A `SeededRng` is
//! either seeded from config (reproducible audits) or from OS entropy once
//! per run. Analytics ids are the one exception: they come from v4 UUIDs
//! so that no seed can ever regenerate them.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

pub struct SeededRng {
    inner: Pcg64Mcg,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            inner: Pcg64Mcg::from_entropy(),
        }
    }

    /// Seeded when `seed` is given, entropy-seeded otherwise.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map(Self::new).unwrap_or_else(Self::from_entropy)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// `amount` distinct indices drawn uniformly from `0..len`, in random
    /// order. `amount` is clamped to `len`.
    pub fn pick_indices(&mut self, len: usize, amount: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.inner, len, amount.min(len)).into_vec()
    }
}
