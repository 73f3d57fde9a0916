//! Deterministic RNG wrapper, sampler facade and seed-derivation helpers.

use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Beta, Dirichlet, Distribution, Normal};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

use crate::errors::{ErrorInfo, MoireError};
use crate::numeric::log_sum_exp;

/// Deterministic RNG handle owned by exactly one consumer (a chain or the
/// swap coordinator).
///
/// The handle is a thin wrapper around `StdRng` that documents the seeding
/// policy used throughout the project. A master `seed: u64` must be provided by
/// the caller. Substreams are derived by hashing `(master_seed, substream_id)`
/// with SipHash-1-3 configured with fixed zero keys. There is no process-wide
/// generator: every chain receives its own handle at construction, which keeps
/// parallel update rounds reproducible.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

fn sampler_error(code: &str, err: impl ToString) -> MoireError {
    MoireError::Config(ErrorInfo::new(code, err.to_string()))
}

impl RngHandle {
    /// Creates a new RNG handle from a master seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw on `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Natural log of a uniform draw, as used by Metropolis tests.
    pub fn log_uniform(&mut self) -> f64 {
        self.uniform().ln()
    }

    /// Fair coin.
    pub fn coin(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }

    /// Normal draw with the given mean and a positive, finite standard
    /// deviation.
    pub fn normal(&mut self, mean: f64, sd: f64) -> Result<f64, MoireError> {
        if !(sd > 0.0 && sd.is_finite()) {
            return Err(sampler_error(
                "sampler-normal",
                format!("standard deviation must be positive and finite, got {sd}"),
            ));
        }
        let dist = Normal::new(mean, sd).map_err(|err| sampler_error("sampler-normal", err))?;
        Ok(dist.sample(&mut self.rng))
    }

    /// Beta draw.
    pub fn beta(&mut self, alpha: f64, beta: f64) -> Result<f64, MoireError> {
        let dist = Beta::new(alpha, beta).map_err(|err| sampler_error("sampler-beta", err))?;
        Ok(dist.sample(&mut self.rng))
    }

    /// Dirichlet draw over `alpha.len()` categories (at least two).
    pub fn dirichlet(&mut self, alpha: &[f64]) -> Result<Vec<f64>, MoireError> {
        let dist = Dirichlet::new(alpha).map_err(|err| sampler_error("sampler-dirichlet", err))?;
        Ok(dist.sample(&mut self.rng))
    }

    /// Categorical draw with weights given in log space.
    ///
    /// Weights are shifted by their log-sum-exp before exponentiating, so very
    /// small log probabilities do not all underflow to zero. Returns `None`
    /// when no category has positive mass.
    pub fn categorical_from_log_weights(&mut self, log_weights: &[f64]) -> Option<usize> {
        let norm = log_sum_exp(log_weights);
        if !norm.is_finite() {
            return None;
        }
        let weights = log_weights.iter().map(|lw| (lw - norm).exp());
        let dist = WeightedIndex::new(weights).ok()?;
        Some(dist.sample(&mut self.rng))
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Derives the deterministic seed for a specific substream.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}
