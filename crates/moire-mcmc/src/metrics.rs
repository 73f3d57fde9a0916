use serde::{Deserialize, Serialize};

use crate::chain::ChainState;

/// Diagnostic traces of the chain at temperature 1.0, one entry per step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Log-likelihood.
    pub llik: Vec<f64>,
    /// Log-prior.
    pub prior: Vec<f64>,
    /// Log-posterior.
    pub posterior: Vec<f64>,
}

impl Trace {
    pub(crate) fn push(&mut self, llik: f64, prior: f64, posterior: f64) {
        self.llik.push(llik);
        self.prior.push(prior);
        self.posterior.push(posterior);
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.llik.len()
    }

    /// True before any step was recorded.
    pub fn is_empty(&self) -> bool {
        self.llik.is_empty()
    }

    /// Mean log-likelihood over the recorded steps, if any.
    pub fn mean_llik(&self) -> Option<f64> {
        mean(&self.llik)
    }
}

/// Burn-in and sampling traces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Traces {
    /// Recorded during burn-in.
    pub burnin: Trace,
    /// Recorded during sampling, regardless of thinning.
    pub sampling: Trace,
}

/// Thinned posterior draws, indexed `[sample or locus][draw]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosteriorDraws {
    /// Allele frequencies per locus; each draw is a full simplex.
    pub allele_freqs: Vec<Vec<Vec<f64>>>,
    /// COI per sample.
    pub coi: Vec<Vec<usize>>,
    /// Relatedness per sample.
    pub relatedness: Vec<Vec<f64>>,
    /// False-positive rate per sample.
    pub eps_pos: Vec<Vec<f64>>,
    /// False-negative rate per sample.
    pub eps_neg: Vec<Vec<f64>>,
    /// Mean COI.
    pub mean_coi: Vec<f64>,
}

impl PosteriorDraws {
    pub(crate) fn new(num_samples: usize, num_loci: usize) -> Self {
        Self {
            allele_freqs: vec![Vec::new(); num_loci],
            coi: vec![Vec::new(); num_samples],
            relatedness: vec![Vec::new(); num_samples],
            eps_pos: vec![Vec::new(); num_samples],
            eps_neg: vec![Vec::new(); num_samples],
            mean_coi: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, state: &ChainState) {
        for (draws, freqs) in self.allele_freqs.iter_mut().zip(&state.allele_freqs) {
            draws.push(freqs.clone());
        }
        for (draws, &coi) in self.coi.iter_mut().zip(&state.coi) {
            draws.push(coi);
        }
        for (draws, &r) in self.relatedness.iter_mut().zip(&state.relatedness) {
            draws.push(r);
        }
        for (draws, &eps) in self.eps_pos.iter_mut().zip(&state.eps_pos) {
            draws.push(eps);
        }
        for (draws, &eps) in self.eps_neg.iter_mut().zip(&state.eps_neg) {
            draws.push(eps);
        }
        self.mean_coi.push(state.mean_coi);
    }

    /// Number of recorded draws.
    pub fn len(&self) -> usize {
        self.mean_coi.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.mean_coi.is_empty()
    }

    /// Posterior mean allele frequencies per locus.
    pub fn mean_allele_freqs(&self) -> Vec<Vec<f64>> {
        self.allele_freqs
            .iter()
            .map(|draws| {
                let Some(first) = draws.first() else {
                    return Vec::new();
                };
                let mut totals = vec![0.0; first.len()];
                for draw in draws {
                    for (total, &freq) in totals.iter_mut().zip(draw) {
                        *total += freq;
                    }
                }
                totals.iter().map(|t| t / draws.len() as f64).collect()
            })
            .collect()
    }

    /// Posterior mean COI per sample; NaN without draws.
    pub fn mean_coi_per_sample(&self) -> Vec<f64> {
        self.coi
            .iter()
            .map(|draws| {
                let values: Vec<f64> = draws.iter().map(|&m| m as f64).collect();
                mean(&values).unwrap_or(f64::NAN)
            })
            .collect()
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
