use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::Exp1;
use serde::{Deserialize, Serialize};

/// Random number source shared by the whole world.
///
/// Every draw advances the generator deterministically, so a world is
/// replayable from its seed (or from archived generator state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldRng {
    initial_seed: u64,
    rng: ChaCha20Rng,
}

impl WorldRng {
    pub fn new(seed: u64) -> Self {
        Self {
            initial_seed: seed,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// The seed the generator was last seeded with.
    pub fn initial_seed(&self) -> u64 {
        self.initial_seed
    }

    /// Reset the generator to a fresh stream for `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.initial_seed = seed;
        self.rng = ChaCha20Rng::seed_from_u64(seed);
    }

    /// Uniform integer in `[0, bound)`. `bound` must be non-zero.
    pub fn integer(&mut self, bound: u32) -> u32 {
        self.rng.gen_range(0..bound)
    }

    /// Uniform integer in the inclusive range `[low, high]`.
    pub fn integer_range(&mut self, low: i64, high: i64) -> i64 {
        self.rng.gen_range(low..=high)
    }

    pub fn boolean(&mut self) -> bool {
        self.rng.gen()
    }

    /// Uniform float in `[low, high)`.
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.rng.gen_range(low..high)
    }

    /// Draw an event interval from `Exponential(mean)`, truncated to an
    /// integer count. Draws that truncate to zero or below are rejected and
    /// redrawn, so the returned interval is always at least 1.
    pub fn exponential_interval(&mut self, mean: f64) -> u64 {
        debug_assert!(mean > 0.0, "exponential interval needs a positive mean");
        loop {
            let sample: f64 = self.rng.sample::<f64, _>(Exp1) * mean;
            let delay = sample as i64;
            if delay > 0 {
                return delay as u64;
            }
        }
    }
}
