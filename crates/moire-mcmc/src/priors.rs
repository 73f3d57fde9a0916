//! Log prior terms, one scalar function per parameter family.

use moire_core::numeric::{beta_ln_pdf, gamma_ln_pdf, poisson_ln_pmf};

use crate::config::PriorConfig;

/// Beta prior on the false-positive rate, truncated at `max_eps_pos`.
pub fn eps_pos_prior(eps_pos: f64, priors: &PriorConfig) -> f64 {
    if eps_pos > priors.max_eps_pos {
        return f64::NEG_INFINITY;
    }
    beta_ln_pdf(eps_pos, priors.eps_pos_alpha, priors.eps_pos_beta)
}

/// Beta prior on the false-negative rate, truncated at `max_eps_neg`.
pub fn eps_neg_prior(eps_neg: f64, priors: &PriorConfig) -> f64 {
    if eps_neg > priors.max_eps_neg {
        return f64::NEG_INFINITY;
    }
    beta_ln_pdf(eps_neg, priors.eps_neg_alpha, priors.eps_neg_beta)
}

/// Beta prior on relatedness; zero when relatedness is not modelled.
pub fn relatedness_prior(relatedness: f64, priors: &PriorConfig, enabled: bool) -> f64 {
    if !enabled {
        return 0.0;
    }
    beta_ln_pdf(relatedness, priors.r_alpha, priors.r_beta)
}

/// Shifted Poisson prior: `coi - 1 ~ Poisson(mean_coi)`.
pub fn coi_prior(coi: usize, mean_coi: f64) -> f64 {
    if coi == 0 {
        return f64::NEG_INFINITY;
    }
    poisson_ln_pmf(coi - 1, mean_coi)
}

/// Gamma hyper-prior on the mean COI.
pub fn mean_coi_hyper_prior(mean_coi: f64, priors: &PriorConfig) -> f64 {
    gamma_ln_pdf(mean_coi, priors.mean_coi_shape, priors.mean_coi_scale)
}
