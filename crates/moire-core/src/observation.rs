//! Detection model for alleles that are truly present in a sample.

/// Probability that a true allele goes unobserved.
///
/// Implementations must be pure functions of their arguments.
pub trait MissingAlleleModel: Send + Sync + std::fmt::Debug {
    /// Probability that an allele carried by `copies` strains is not
    /// detected, given the sample's false-negative rate.
    fn prob_missing(&self, copies: usize, eps_neg: f64) -> f64;
}

/// Every strain's copy of an allele is missed independently with
/// probability `eps_neg`, so an allele is lost only if all copies are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndependentStrainDetection;

impl MissingAlleleModel for IndependentStrainDetection {
    fn prob_missing(&self, copies: usize, eps_neg: f64) -> f64 {
        prob_any_missing(copies, eps_neg)
    }
}

/// `eps_neg ^ copies`, clamped to `[0, 1]`. Zero copies means the allele is
/// absent, which is reported as certainly missing.
pub fn prob_any_missing(copies: usize, eps_neg: f64) -> f64 {
    if copies == 0 {
        return 1.0;
    }
    eps_neg.clamp(0.0, 1.0).powi(copies.min(i32::MAX as usize) as i32)
}
