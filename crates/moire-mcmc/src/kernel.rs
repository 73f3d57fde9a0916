use log::trace;
use moire_core::errors::{ErrorInfo, MoireError};
use moire_core::numeric::dirichlet_ln_pdf;
use serde::{Deserialize, Serialize};

use crate::chain::{Chain, LikelihoodCache};
use crate::likelihood::GenotypeParams;
use crate::priors;

/// Added to every Dirichlet proposal parameter so small frequencies can recover.
const ALPHA_FLOOR: f64 = 1e-2;

/// Parameter family updated by a move, used for acceptance bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// False-positive rate random walk.
    EpsPos,
    /// False-negative rate random walk.
    EpsNeg,
    /// Dirichlet allele-frequency proposal.
    AlleleFreqs,
    /// COI step of plus or minus one.
    Coi,
    /// Relatedness random walk.
    Relatedness,
    /// Joint COI and relatedness move.
    CoiRelatedness,
    /// Gibbs refresh of latent genotypes.
    Latent,
    /// Mean COI random walk.
    MeanCoi,
}

impl BlockKind {
    /// Stable name used in summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::EpsPos => "eps-pos",
            BlockKind::EpsNeg => "eps-neg",
            BlockKind::AlleleFreqs => "allele-freqs",
            BlockKind::Coi => "coi",
            BlockKind::Relatedness => "relatedness",
            BlockKind::CoiRelatedness => "coi-relatedness",
            BlockKind::Latent => "latent",
            BlockKind::MeanCoi => "mean-coi",
        }
    }
}

/// A single Metropolis–Hastings target: one parameter of one sample or locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateBlock {
    /// False-positive rate of a sample.
    EpsPos(usize),
    /// False-negative rate of a sample.
    EpsNeg(usize),
    /// Allele frequencies of a locus.
    AlleleFreqs(usize),
    /// COI of a sample.
    Coi(usize),
    /// Relatedness of a sample.
    Relatedness(usize),
    /// COI and relatedness of a sample together.
    CoiRelatedness(usize),
    /// Mean COI hyperparameter.
    MeanCoi,
}

impl UpdateBlock {
    /// Family of this block.
    pub fn kind(&self) -> BlockKind {
        match self {
            UpdateBlock::EpsPos(_) => BlockKind::EpsPos,
            UpdateBlock::EpsNeg(_) => BlockKind::EpsNeg,
            UpdateBlock::AlleleFreqs(_) => BlockKind::AlleleFreqs,
            UpdateBlock::Coi(_) => BlockKind::Coi,
            UpdateBlock::Relatedness(_) => BlockKind::Relatedness,
            UpdateBlock::CoiRelatedness(_) => BlockKind::CoiRelatedness,
            UpdateBlock::MeanCoi => BlockKind::MeanCoi,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ParameterChange {
    EpsPos { sample: usize, value: f64 },
    EpsNeg { sample: usize, value: f64 },
    AlleleFreqs { locus: usize, freqs: Vec<f64> },
    Coi { sample: usize, coi: usize },
    Relatedness { sample: usize, value: f64 },
    CoiRelatedness { sample: usize, coi: usize, relatedness: f64 },
    MeanCoi { value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PriorSlot {
    EpsPos(usize),
    EpsNeg(usize),
    Coi(usize),
    Relatedness(usize),
    MeanCoiHyper,
}

impl PriorSlot {
    fn read(self, cache: &LikelihoodCache) -> f64 {
        match self {
            PriorSlot::EpsPos(sample) => cache.eps_pos_prior[sample],
            PriorSlot::EpsNeg(sample) => cache.eps_neg_prior[sample],
            PriorSlot::Coi(sample) => cache.coi_prior[sample],
            PriorSlot::Relatedness(sample) => cache.relatedness_prior[sample],
            PriorSlot::MeanCoiHyper => cache.mean_coi_hyper_prior,
        }
    }

    fn write(self, cache: &mut LikelihoodCache, value: f64) {
        match self {
            PriorSlot::EpsPos(sample) => cache.eps_pos_prior[sample] = value,
            PriorSlot::EpsNeg(sample) => cache.eps_neg_prior[sample] = value,
            PriorSlot::Coi(sample) => cache.coi_prior[sample] = value,
            PriorSlot::Relatedness(sample) => cache.relatedness_prior[sample] = value,
            PriorSlot::MeanCoiHyper => cache.mean_coi_hyper_prior = value,
        }
    }
}

/// Candidate update held apart from the accepted state.
///
/// Carries the candidate parameter, the cache slots it would overwrite and
/// the resulting change in log-likelihood and log-prior. [`Chain::commit`]
/// merges it; dropping it leaves the chain untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    block: UpdateBlock,
    generation: u64,
    change: ParameterChange,
    genotype_slots: Vec<(usize, usize, f64)>,
    latent: Vec<(usize, usize, Vec<usize>)>,
    prior_slots: Vec<(PriorSlot, f64)>,
    llik_delta: f64,
    prior_delta: f64,
    log_correction: f64,
    feasible: bool,
}

impl Proposal {
    fn new(block: UpdateBlock, generation: u64, change: ParameterChange) -> Self {
        Self {
            block,
            generation,
            change,
            genotype_slots: Vec::new(),
            latent: Vec::new(),
            prior_slots: Vec::new(),
            llik_delta: 0.0,
            prior_delta: 0.0,
            log_correction: 0.0,
            feasible: true,
        }
    }

    fn set_genotype(&mut self, cache: &LikelihoodCache, sample: usize, locus: usize, llik: f64) {
        self.llik_delta += llik - cache.genotype_llik(sample, locus);
        self.genotype_slots.push((sample, locus, llik));
    }

    fn set_prior(&mut self, cache: &LikelihoodCache, slot: PriorSlot, value: f64) {
        self.prior_delta += value - slot.read(cache);
        self.prior_slots.push((slot, value));
    }

    /// Block this proposal updates.
    pub fn block(&self) -> UpdateBlock {
        self.block
    }

    /// Change in total log-likelihood if committed.
    pub fn llik_delta(&self) -> f64 {
        self.llik_delta
    }

    /// Change in total log-prior if committed.
    pub fn prior_delta(&self) -> f64 {
        self.prior_delta
    }

    /// Hastings correction `ln q(x | x') - ln q(x' | x)`.
    pub fn log_correction(&self) -> f64 {
        self.log_correction
    }

    /// Metropolis–Hastings log acceptance ratio at `temperature`.
    pub fn log_ratio(&self, temperature: f64) -> f64 {
        if !self.feasible {
            return f64::NEG_INFINITY;
        }
        self.llik_delta / temperature + self.prior_delta + self.log_correction
    }
}

/// Metropolis test in log space. Non-finite ratios, NaN included, are rejected.
pub fn metropolis_accept(log_ratio: f64, log_u: f64) -> bool {
    log_ratio.is_finite() && (log_ratio >= 0.0 || log_u < log_ratio)
}

/// Rescales positive weights onto the probability simplex.
///
/// Returns `None` when any weight is non-finite or not strictly positive.
pub fn normalize_simplex(weights: Vec<f64>) -> Option<Vec<f64>> {
    if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }
    Some(weights.into_iter().map(|w| w / total).collect())
}

fn dirichlet_alpha(freqs: &[f64], concentration: f64) -> Vec<f64> {
    freqs
        .iter()
        .map(|&freq| concentration * freq + ALPHA_FLOOR)
        .collect()
}

/// Per-sample parameter overrides applied while rescoring a proposal.
#[derive(Debug, Clone, Copy, Default)]
struct SampleOverride {
    coi: Option<usize>,
    relatedness: Option<f64>,
    eps_pos: Option<f64>,
    eps_neg: Option<f64>,
}

impl Chain {
    fn check_block(&self, block: UpdateBlock) -> Result<(), MoireError> {
        let data = &self.context.data;
        let (index, bound, what) = match block {
            UpdateBlock::EpsPos(s)
            | UpdateBlock::EpsNeg(s)
            | UpdateBlock::Coi(s)
            | UpdateBlock::Relatedness(s)
            | UpdateBlock::CoiRelatedness(s) => (s, data.num_samples(), "sample"),
            UpdateBlock::AlleleFreqs(l) => (l, data.num_loci(), "locus"),
            UpdateBlock::MeanCoi => return Ok(()),
        };
        if index < bound {
            return Ok(());
        }
        Err(MoireError::Config(
            ErrorInfo::new("block-index", format!("{what} index out of range"))
                .with_context("index", index)
                .with_context("bound", bound),
        ))
    }

    /// Draws a candidate for `block` and scores it against the committed cache.
    ///
    /// `Ok(None)` means the candidate fell outside the support and counts as a
    /// rejection.
    pub fn propose(&mut self, block: UpdateBlock) -> Result<Option<Proposal>, MoireError> {
        self.check_block(block)?;
        match block {
            UpdateBlock::EpsPos(sample) => self.propose_eps_pos(sample),
            UpdateBlock::EpsNeg(sample) => self.propose_eps_neg(sample),
            UpdateBlock::AlleleFreqs(locus) => self.propose_allele_freqs(locus),
            UpdateBlock::Coi(sample) => Ok(self.propose_coi(sample)),
            UpdateBlock::Relatedness(sample) => self.propose_relatedness(sample),
            UpdateBlock::CoiRelatedness(sample) => self.propose_coi_relatedness(sample),
            UpdateBlock::MeanCoi => self.propose_mean_coi(),
        }
    }

    /// Merges an accepted proposal into the state and running totals.
    ///
    /// Returns `false` without changes when the proposal is stale (the chain
    /// moved since it was drawn) or infeasible.
    pub fn commit(&mut self, proposal: Proposal) -> bool {
        if proposal.generation != self.generation || !proposal.feasible {
            return false;
        }
        let state = &mut self.state;
        match proposal.change {
            ParameterChange::EpsPos { sample, value } => state.eps_pos[sample] = value,
            ParameterChange::EpsNeg { sample, value } => state.eps_neg[sample] = value,
            ParameterChange::AlleleFreqs { locus, freqs } => state.allele_freqs[locus] = freqs,
            ParameterChange::Coi { sample, coi } => state.coi[sample] = coi,
            ParameterChange::Relatedness { sample, value } => state.relatedness[sample] = value,
            ParameterChange::CoiRelatedness {
                sample,
                coi,
                relatedness,
            } => {
                state.coi[sample] = coi;
                state.relatedness[sample] = relatedness;
            }
            ParameterChange::MeanCoi { value } => state.mean_coi = value,
        }
        for (sample, locus, latent) in proposal.latent {
            state.latent[sample][locus] = latent;
        }
        for (sample, locus, llik) in proposal.genotype_slots {
            *self.cache.genotype_llik_mut(sample, locus) = llik;
        }
        for (slot, value) in proposal.prior_slots {
            slot.write(&mut self.cache, value);
        }
        self.cache.llik += proposal.llik_delta;
        self.cache.prior += proposal.prior_delta;
        self.generation += 1;
        true
    }

    /// Rescores every locus of `sample` under the overrides, optionally
    /// redrawing latent genotypes for the candidate.
    fn rescore_sample(
        &mut self,
        proposal: &mut Proposal,
        sample: usize,
        overrides: SampleOverride,
        draw_latent: bool,
    ) {
        let Chain {
            context,
            state,
            cache,
            multisets,
            rng,
            ..
        } = self;
        let coi = overrides.coi.unwrap_or(state.coi[sample]);
        for locus in 0..context.data.num_loci() {
            let params = GenotypeParams {
                eps_pos: overrides.eps_pos.unwrap_or(state.eps_pos[sample]),
                eps_neg: overrides.eps_neg.unwrap_or(state.eps_neg[sample]),
                relatedness: overrides.relatedness.unwrap_or(state.relatedness[sample]),
                allele_freqs: &state.allele_freqs[locus],
            };
            let draw_rng = if draw_latent { Some(&mut *rng) } else { None };
            let (marginal, latent) =
                context.evaluate_locus(multisets, sample, locus, coi, &params, draw_rng);
            proposal.set_genotype(cache, sample, locus, marginal);
            if draw_latent {
                match latent {
                    Some(latent) => proposal.latent.push((sample, locus, latent)),
                    None => proposal.feasible = false,
                }
            }
        }
    }

    fn propose_eps_pos(&mut self, sample: usize) -> Result<Option<Proposal>, MoireError> {
        let value =
            self.state.eps_pos[sample] + self.rng.normal(0.0, self.tuning.eps_pos_sd[sample])?;
        if !(0.0..=self.context.priors.max_eps_pos).contains(&value) {
            return Ok(None);
        }
        let mut proposal = Proposal::new(
            UpdateBlock::EpsPos(sample),
            self.generation,
            ParameterChange::EpsPos { sample, value },
        );
        let prior = priors::eps_pos_prior(value, &self.context.priors);
        proposal.set_prior(&self.cache, PriorSlot::EpsPos(sample), prior);
        let overrides = SampleOverride {
            eps_pos: Some(value),
            ..SampleOverride::default()
        };
        self.rescore_sample(&mut proposal, sample, overrides, false);
        Ok(Some(proposal))
    }

    fn propose_eps_neg(&mut self, sample: usize) -> Result<Option<Proposal>, MoireError> {
        let value =
            self.state.eps_neg[sample] + self.rng.normal(0.0, self.tuning.eps_neg_sd[sample])?;
        if !(0.0..=self.context.priors.max_eps_neg).contains(&value) {
            return Ok(None);
        }
        let mut proposal = Proposal::new(
            UpdateBlock::EpsNeg(sample),
            self.generation,
            ParameterChange::EpsNeg { sample, value },
        );
        let prior = priors::eps_neg_prior(value, &self.context.priors);
        proposal.set_prior(&self.cache, PriorSlot::EpsNeg(sample), prior);
        let overrides = SampleOverride {
            eps_neg: Some(value),
            ..SampleOverride::default()
        };
        self.rescore_sample(&mut proposal, sample, overrides, false);
        Ok(Some(proposal))
    }

    fn propose_allele_freqs(&mut self, locus: usize) -> Result<Option<Proposal>, MoireError> {
        let current = self.state.allele_freqs[locus].clone();
        if current.len() < 2 {
            return Ok(None);
        }
        let concentration = self.tuning.allele_freq_concentration[locus];
        let forward_alpha = dirichlet_alpha(&current, concentration);
        let Some(candidate) = normalize_simplex(self.rng.dirichlet(&forward_alpha)?) else {
            return Ok(None);
        };
        let reverse_alpha = dirichlet_alpha(&candidate, concentration);
        let log_correction = dirichlet_ln_pdf(&current, &reverse_alpha)
            - dirichlet_ln_pdf(&candidate, &forward_alpha);

        let mut proposal = Proposal::new(
            UpdateBlock::AlleleFreqs(locus),
            self.generation,
            ParameterChange::AlleleFreqs {
                locus,
                freqs: candidate.clone(),
            },
        );
        proposal.log_correction = log_correction;

        let Chain {
            context,
            state,
            cache,
            multisets,
            ..
        } = self;
        for sample in 0..context.data.num_samples() {
            let params = GenotypeParams {
                allele_freqs: &candidate,
                ..state.genotype_params(sample, locus)
            };
            let (marginal, _) =
                context.evaluate_locus(multisets, sample, locus, state.coi[sample], &params, None);
            proposal.set_genotype(cache, sample, locus, marginal);
        }
        Ok(Some(proposal))
    }

    fn propose_coi(&mut self, sample: usize) -> Option<Proposal> {
        let current = self.state.coi[sample];
        let coi = if self.rng.coin() {
            current + 1
        } else {
            current.checked_sub(1)?
        };
        if coi < 1 || coi > self.context.max_coi {
            return None;
        }
        let mut proposal = Proposal::new(
            UpdateBlock::Coi(sample),
            self.generation,
            ParameterChange::Coi { sample, coi },
        );
        let prior = priors::coi_prior(coi, self.state.mean_coi);
        proposal.set_prior(&self.cache, PriorSlot::Coi(sample), prior);
        let overrides = SampleOverride {
            coi: Some(coi),
            ..SampleOverride::default()
        };
        self.rescore_sample(&mut proposal, sample, overrides, true);
        Some(proposal)
    }

    fn propose_relatedness(&mut self, sample: usize) -> Result<Option<Proposal>, MoireError> {
        if !self.context.allow_relatedness {
            return Ok(None);
        }
        let value = self.state.relatedness[sample]
            + self.rng.normal(0.0, self.tuning.relatedness_sd[sample])?;
        if !(0.0..=1.0).contains(&value) {
            return Ok(None);
        }
        let mut proposal = Proposal::new(
            UpdateBlock::Relatedness(sample),
            self.generation,
            ParameterChange::Relatedness { sample, value },
        );
        let prior = priors::relatedness_prior(value, &self.context.priors, true);
        proposal.set_prior(&self.cache, PriorSlot::Relatedness(sample), prior);
        let overrides = SampleOverride {
            relatedness: Some(value),
            ..SampleOverride::default()
        };
        self.rescore_sample(&mut proposal, sample, overrides, false);
        Ok(Some(proposal))
    }

    fn propose_coi_relatedness(&mut self, sample: usize) -> Result<Option<Proposal>, MoireError> {
        if !self.context.allow_relatedness {
            return Ok(None);
        }
        let current = self.state.coi[sample];
        let up = self.rng.coin();
        let relatedness = self.state.relatedness[sample]
            + self.rng.normal(0.0, self.tuning.coi_relatedness_sd[sample])?;
        let coi = if up { current + 1 } else { current.saturating_sub(1) };
        if coi < 1 || coi > self.context.max_coi || !(0.0..=1.0).contains(&relatedness) {
            return Ok(None);
        }
        let mut proposal = Proposal::new(
            UpdateBlock::CoiRelatedness(sample),
            self.generation,
            ParameterChange::CoiRelatedness {
                sample,
                coi,
                relatedness,
            },
        );
        let coi_prior = priors::coi_prior(coi, self.state.mean_coi);
        let r_prior = priors::relatedness_prior(relatedness, &self.context.priors, true);
        proposal.set_prior(&self.cache, PriorSlot::Coi(sample), coi_prior);
        proposal.set_prior(&self.cache, PriorSlot::Relatedness(sample), r_prior);
        let overrides = SampleOverride {
            coi: Some(coi),
            relatedness: Some(relatedness),
            ..SampleOverride::default()
        };
        self.rescore_sample(&mut proposal, sample, overrides, true);
        Ok(Some(proposal))
    }

    fn propose_mean_coi(&mut self) -> Result<Option<Proposal>, MoireError> {
        let value = self.state.mean_coi + self.rng.normal(0.0, self.tuning.mean_coi_sd)?;
        if value <= 0.0 {
            return Ok(None);
        }
        let mut proposal = Proposal::new(
            UpdateBlock::MeanCoi,
            self.generation,
            ParameterChange::MeanCoi { value },
        );
        for (sample, &coi) in self.state.coi.iter().enumerate() {
            proposal.set_prior(&self.cache, PriorSlot::Coi(sample), priors::coi_prior(coi, value));
        }
        let hyper = priors::mean_coi_hyper_prior(value, &self.context.priors);
        proposal.set_prior(&self.cache, PriorSlot::MeanCoiHyper, hyper);
        Ok(Some(proposal))
    }

    /// Proposes, tests and possibly commits one block. Returns acceptance.
    pub fn metropolis_step(&mut self, block: UpdateBlock) -> Result<bool, MoireError> {
        let accepted = match self.propose(block)? {
            Some(proposal) => {
                let log_ratio = proposal.log_ratio(self.temperature);
                let log_u = self.rng.log_uniform();
                metropolis_accept(log_ratio, log_u) && self.commit(proposal)
            }
            None => false,
        };
        self.counters.record(block, accepted);
        Ok(accepted)
    }

    /// Random-walk update of every sample's false-negative rate.
    pub fn update_eps_neg(&mut self) -> Result<(), MoireError> {
        for sample in 0..self.context.data.num_samples() {
            self.metropolis_step(UpdateBlock::EpsNeg(sample))?;
        }
        Ok(())
    }

    /// Random-walk update of every sample's false-positive rate.
    pub fn update_eps_pos(&mut self) -> Result<(), MoireError> {
        for sample in 0..self.context.data.num_samples() {
            self.metropolis_step(UpdateBlock::EpsPos(sample))?;
        }
        Ok(())
    }

    /// Dirichlet update of every locus' allele frequencies.
    pub fn update_p(&mut self) -> Result<(), MoireError> {
        for locus in 0..self.context.data.num_loci() {
            self.metropolis_step(UpdateBlock::AlleleFreqs(locus))?;
        }
        Ok(())
    }

    /// COI step for every sample.
    pub fn update_m(&mut self) -> Result<(), MoireError> {
        for sample in 0..self.context.data.num_samples() {
            self.metropolis_step(UpdateBlock::Coi(sample))?;
        }
        Ok(())
    }

    /// Relatedness random walk for every sample.
    pub fn update_r(&mut self) -> Result<(), MoireError> {
        for sample in 0..self.context.data.num_samples() {
            self.metropolis_step(UpdateBlock::Relatedness(sample))?;
        }
        Ok(())
    }

    /// Joint COI/relatedness move for every sample.
    pub fn update_m_r(&mut self) -> Result<(), MoireError> {
        for sample in 0..self.context.data.num_samples() {
            self.metropolis_step(UpdateBlock::CoiRelatedness(sample))?;
        }
        Ok(())
    }

    /// Mean COI random walk.
    pub fn update_mean_coi(&mut self) -> Result<(), MoireError> {
        self.metropolis_step(UpdateBlock::MeanCoi)?;
        Ok(())
    }

    /// Gibbs refresh of every latent genotype from its full conditional.
    ///
    /// Leaves the likelihood and prior totals unchanged: the cached terms are
    /// marginal over latent genotypes.
    pub fn update_samples(&mut self) {
        let Chain {
            context,
            state,
            multisets,
            rng,
            counters,
            ..
        } = self;
        for sample in 0..context.data.num_samples() {
            let coi = state.coi[sample];
            for locus in 0..context.data.num_loci() {
                let params = state.genotype_params(sample, locus);
                let (_, latent) =
                    context.evaluate_locus(multisets, sample, locus, coi, &params, Some(&mut *rng));
                let refreshed = latent.is_some();
                if let Some(latent) = latent {
                    state.latent[sample][locus] = latent;
                }
                counters.record_latent(sample, refreshed);
            }
        }
        self.generation += 1;
    }

    /// One full update round in fixed block order.
    pub fn update_round(&mut self, iteration: usize) -> Result<(), MoireError> {
        self.reanchor_llik();
        self.update_eps_neg()?;
        self.update_eps_pos()?;
        self.update_p()?;
        self.update_m()?;
        if self.context.allow_relatedness {
            self.update_r()?;
            self.update_m_r()?;
        }
        self.update_samples();
        self.update_mean_coi()?;
        trace!(
            "iteration {iteration} at temperature {}: llik {:.4}, prior {:.4}",
            self.temperature,
            self.cache.llik,
            self.cache.prior
        );
        Ok(())
    }
}
