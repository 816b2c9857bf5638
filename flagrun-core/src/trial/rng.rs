//! Randomness sources for the trial model.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

const USER_KEY_SUFFIX_LEN: usize = 4;
const BASE36_DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of uniformly distributed numbers in `[0, 1)`.
pub trait UniformSource {
    /// Returns the next sample in `[0, 1)`.
    fn next_unit(&mut self) -> f64;
}

/// Seedable random number generator driving a trial run.
///
/// Uses ChaCha8 so that a fixed seed replays the exact same sequence of
/// latencies, errors and user keys.
#[derive(Debug)]
pub struct TrialRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl TrialRng {
    /// Creates a generator from a fixed seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Creates a generator from the given seed, or a random one.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        Self::from_seed(seed.unwrap_or_else(rand::random))
    }

    /// Returns the seed used for this generator.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generates a user key of the form `{prefix}-xxxx` with a base36 suffix.
    pub fn user_key(&mut self, prefix: &str) -> String {
        let suffix: String = (0..USER_KEY_SUFFIX_LEN)
            .map(|_| {
                let index = (self.next_unit() * BASE36_DIGITS.len() as f64) as usize;
                BASE36_DIGITS[index.min(BASE36_DIGITS.len() - 1)] as char
            })
            .collect();
        format!("{prefix}-{suffix}")
    }
}

impl UniformSource for TrialRng {
    fn next_unit(&mut self) -> f64 {
        // 53 random mantissa bits keep the result strictly below 1.0
        (self.rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Replays a fixed list of samples, cycling when exhausted.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub struct FixedUniform {
    samples: Vec<f64>,
    position: usize,
}

#[cfg(any(test, feature = "test-utils"))]
impl FixedUniform {
    /// Creates a source that yields `samples` in order.
    pub fn new(samples: Vec<f64>) -> Self {
        assert!(!samples.is_empty(), "FixedUniform needs at least one sample");
        Self {
            samples,
            position: 0,
        }
    }

    /// Creates a source that always yields `sample`.
    pub fn constant(sample: f64) -> Self {
        Self::new(vec![sample])
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl UniformSource for FixedUniform {
    fn next_unit(&mut self) -> f64 {
        let sample = self.samples[self.position % self.samples.len()];
        self.position += 1;
        sample
    }
}
