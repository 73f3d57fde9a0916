//! Genotype likelihood: transmission of strains into a sample and the
//! observation of their alleles.
//!
//! A latent genotype is a non-decreasing vector of allele indices, one entry
//! per strain. Its probability is the product of a transmission term
//! (how the sample's strains came to carry those alleles) and an
//! observation term (how the presence/absence calls arose from them).

use std::fmt::Debug;
use std::sync::Arc;

use moire_core::numeric::{ln_multinomial_coefficient, ln_one_minus, log_sum_exp};
use moire_core::{allele_copies, IndependentStrainDetection, MissingAlleleModel};

/// Probability of a latent multiset of strain alleles given COI, relatedness
/// and the locus allele frequencies.
pub trait RelatednessPolicy: Send + Sync + Debug {
    /// Log probability of `latent` (length = COI) under `allele_freqs` and
    /// `relatedness`. Must sum to one over every multiset of a given length
    /// and reduce to i.i.d. multinomial draws when `relatedness == 0`.
    fn log_prob(&self, latent: &[usize], allele_freqs: &[f64], relatedness: f64) -> f64;
}

/// Exchangeable urn model for related strains.
///
/// Strains enter the sample one at a time. After `j` strains, the next one
/// carries allele `k` with probability
/// `((1 - r) p_k + r n_k) / ((1 - r) + r j)`, where `n_k` counts earlier
/// strains carrying `k`: with weight `r j` it copies an existing strain, with
/// weight `1 - r` it is a fresh draw from the population. The sequence is
/// exchangeable, so the multiset probability is the multinomial coefficient
/// times any single ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolyaUrnRelatedness;

impl RelatednessPolicy for PolyaUrnRelatedness {
    fn log_prob(&self, latent: &[usize], allele_freqs: &[f64], relatedness: f64) -> f64 {
        let coi = latent.len();
        if coi == 0 {
            return 0.0;
        }
        let r = relatedness.clamp(0.0, 1.0);
        let fresh = 1.0 - r;
        let copies = allele_copies(latent, allele_freqs.len());

        let mut lp = ln_multinomial_coefficient(&copies);
        let mut distinct = 0usize;
        for (allele, &count) in copies.iter().enumerate() {
            if count == 0 {
                continue;
            }
            distinct += 1;
            let freq = allele_freqs[allele];
            // First copy of each allele: a fresh draw.
            lp += freq.ln();
            for j in 1..count {
                lp += (fresh * freq + r * j as f64).ln();
            }
        }
        // Every allele beyond the first was introduced by a fresh strain. The
        // very first strain is always fresh, so its (1 - r) cancels with the
        // denominator's first factor; this keeps r = 1 finite.
        if distinct > 1 {
            lp += (distinct - 1) as f64 * fresh.ln();
        }
        for j in 1..coi {
            lp -= (fresh + r * j as f64).ln();
        }
        lp
    }
}

/// Per-sample parameters entering a genotype likelihood.
#[derive(Debug, Clone, Copy)]
pub struct GenotypeParams<'a> {
    /// False-positive rate.
    pub eps_pos: f64,
    /// False-negative rate.
    pub eps_neg: f64,
    /// Relatedness between the sample's strains.
    pub relatedness: f64,
    /// Allele frequencies of the locus.
    pub allele_freqs: &'a [f64],
}

/// Transmission and observation policies shared by every chain of a run.
#[derive(Debug, Clone)]
pub struct LikelihoodModel {
    relatedness: Arc<dyn RelatednessPolicy>,
    detection: Arc<dyn MissingAlleleModel>,
}

impl Default for LikelihoodModel {
    fn default() -> Self {
        Self::new(
            Arc::new(PolyaUrnRelatedness),
            Arc::new(IndependentStrainDetection),
        )
    }
}

impl LikelihoodModel {
    /// Builds a model from explicit policies.
    pub fn new(
        relatedness: Arc<dyn RelatednessPolicy>,
        detection: Arc<dyn MissingAlleleModel>,
    ) -> Self {
        Self {
            relatedness,
            detection,
        }
    }

    /// Log probability of the latent genotype given COI, relatedness and
    /// allele frequencies.
    pub fn calc_transmission_process(
        &self,
        latent: &[usize],
        allele_freqs: &[f64],
        relatedness: f64,
    ) -> f64 {
        self.relatedness.log_prob(latent, allele_freqs, relatedness)
    }

    /// Log probability of the observed presence/absence calls given the
    /// latent genotype. A missing call (no allele detected) contributes 0.
    pub fn calc_observation_process(
        &self,
        latent: &[usize],
        observed: &[u8],
        eps_neg: f64,
        eps_pos: f64,
    ) -> f64 {
        if observed.iter().all(|&call| call == 0) {
            return 0.0;
        }
        let copies = allele_copies(latent, observed.len());
        let mut lp = 0.0;
        for (&call, &count) in observed.iter().zip(&copies) {
            let p_detect = if count == 0 {
                eps_pos
            } else {
                1.0 - self.detection.prob_missing(count, eps_neg)
            };
            lp += if call == 1 {
                p_detect.ln()
            } else {
                ln_one_minus(p_detect)
            };
        }
        lp
    }

    /// Log probability that `latent` produced `observed`.
    pub fn calc_genotype_log_pmf(
        &self,
        latent: &[usize],
        observed: &[u8],
        params: &GenotypeParams<'_>,
    ) -> f64 {
        self.calc_transmission_process(latent, params.allele_freqs, params.relatedness)
            + self.calc_observation_process(latent, observed, params.eps_neg, params.eps_pos)
    }

    /// Evaluates [`Self::calc_genotype_log_pmf`] for every admissible latent
    /// genotype, in enumeration order.
    pub fn calc_obs_genotype_lliks(
        &self,
        observed: &[u8],
        latent_genotypes: &[Vec<usize>],
        params: &GenotypeParams<'_>,
    ) -> Vec<f64> {
        latent_genotypes
            .iter()
            .map(|latent| self.calc_genotype_log_pmf(latent, observed, params))
            .collect()
    }
}

/// Marginal log-likelihood of one sample at one locus.
pub fn marginal_llik(lliks: &[f64]) -> f64 {
    log_sum_exp(lliks)
}
