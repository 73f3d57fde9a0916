use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use moire_core::errors::MoireError;
use moire_core::{GenotypingData, MultisetCache, RngHandle};
use serde::{Deserialize, Serialize};

use crate::config::{PriorConfig, ProposalConfig, RunConfig};
use crate::kernel::{BlockKind, UpdateBlock};
use crate::likelihood::{marginal_llik, GenotypeParams, LikelihoodModel};
use crate::priors;

/// Concentration of the Dirichlet draw used to scatter initial allele frequencies.
const INIT_FREQ_CONCENTRATION: f64 = 100.0;
/// Lower bound for the initial mean COI so its priors stay finite.
const MIN_INIT_MEAN_COI: f64 = 0.1;

/// Immutable inputs shared by every chain of a run.
#[derive(Debug)]
pub struct ChainContext {
    pub(crate) data: GenotypingData,
    pub(crate) model: LikelihoodModel,
    pub(crate) priors: PriorConfig,
    pub(crate) proposals: ProposalConfig,
    pub(crate) max_coi: usize,
    pub(crate) allow_relatedness: bool,
}

impl ChainContext {
    /// Bundles data, model policies and the relevant configuration sections.
    pub fn new(data: GenotypingData, config: &RunConfig, model: LikelihoodModel) -> Self {
        Self {
            data,
            model,
            priors: config.priors.clone(),
            proposals: config.proposals.clone(),
            max_coi: config.max_coi,
            allow_relatedness: config.allow_relatedness,
        }
    }

    /// Observed genotyping data.
    pub fn data(&self) -> &GenotypingData {
        &self.data
    }

    /// Likelihood policies.
    pub fn model(&self) -> &LikelihoodModel {
        &self.model
    }

    /// Whether relatedness is modelled.
    pub fn allow_relatedness(&self) -> bool {
        self.allow_relatedness
    }

    /// Marginal log-likelihood of one sample at one locus for the given COI,
    /// optionally drawing a latent genotype from its full conditional.
    ///
    /// Missing calls have marginal exactly 0; their latent genotype is drawn
    /// from the transmission process alone.
    pub(crate) fn evaluate_locus(
        &self,
        multisets: &mut MultisetCache,
        sample: usize,
        locus: usize,
        coi: usize,
        params: &GenotypeParams<'_>,
        rng: Option<&mut RngHandle>,
    ) -> (f64, Option<Vec<usize>>) {
        let missing = self.data.is_missing(sample, locus);
        if missing && rng.is_none() {
            return (0.0, None);
        }
        let table = multisets.get(coi, self.data.num_alleles()[locus]);
        let observed = self.data.observed(sample, locus);
        let lliks = self.model.calc_obs_genotype_lliks(observed, &table, params);
        let marginal = if missing { 0.0 } else { marginal_llik(&lliks) };
        let latent = rng
            .and_then(|rng| rng.categorical_from_log_weights(&lliks))
            .map(|idx| table[idx].clone());
        (marginal, latent)
    }
}

/// Full parameter state of one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainState {
    /// COI per sample.
    pub coi: Vec<usize>,
    /// Relatedness per sample (all zero when relatedness is disabled).
    pub relatedness: Vec<f64>,
    /// Allele frequency simplex per locus.
    pub allele_freqs: Vec<Vec<f64>>,
    /// False-positive rate per sample.
    pub eps_pos: Vec<f64>,
    /// False-negative rate per sample.
    pub eps_neg: Vec<f64>,
    /// Mean COI hyperparameter.
    pub mean_coi: f64,
    /// Latent genotype per sample and locus; each has `coi[sample]` entries.
    pub latent: Vec<Vec<Vec<usize>>>,
}

impl ChainState {
    pub(crate) fn genotype_params(&self, sample: usize, locus: usize) -> GenotypeParams<'_> {
        GenotypeParams {
            eps_pos: self.eps_pos[sample],
            eps_neg: self.eps_neg[sample],
            relatedness: self.relatedness[sample],
            allele_freqs: &self.allele_freqs[locus],
        }
    }
}

/// Committed likelihood and prior components of the accepted state.
///
/// Every slot matches the chain's parameters at the start and end of each
/// update; candidate values live in a [`crate::kernel::Proposal`] until
/// committed.
#[derive(Debug, Clone, PartialEq)]
pub struct LikelihoodCache {
    num_loci: usize,
    genotype_llik: Vec<f64>,
    pub(crate) eps_pos_prior: Vec<f64>,
    pub(crate) eps_neg_prior: Vec<f64>,
    pub(crate) coi_prior: Vec<f64>,
    pub(crate) relatedness_prior: Vec<f64>,
    pub(crate) mean_coi_hyper_prior: f64,
    pub(crate) llik: f64,
    pub(crate) prior: f64,
}

impl LikelihoodCache {
    fn empty(num_samples: usize, num_loci: usize) -> Self {
        Self {
            num_loci,
            genotype_llik: vec![0.0; num_samples * num_loci],
            eps_pos_prior: vec![0.0; num_samples],
            eps_neg_prior: vec![0.0; num_samples],
            coi_prior: vec![0.0; num_samples],
            relatedness_prior: vec![0.0; num_samples],
            mean_coi_hyper_prior: 0.0,
            llik: 0.0,
            prior: 0.0,
        }
    }

    /// Marginal log-likelihood of a sample at a locus.
    pub fn genotype_llik(&self, sample: usize, locus: usize) -> f64 {
        self.genotype_llik[sample * self.num_loci + locus]
    }

    pub(crate) fn genotype_llik_mut(&mut self, sample: usize, locus: usize) -> &mut f64 {
        &mut self.genotype_llik[sample * self.num_loci + locus]
    }

    /// Running total log-likelihood.
    pub fn llik(&self) -> f64 {
        self.llik
    }

    /// Running total log-prior.
    pub fn prior(&self) -> f64 {
        self.prior
    }

    fn calculate_llik(&self) -> f64 {
        self.genotype_llik.iter().sum()
    }

    fn calculate_prior(&self) -> f64 {
        self.eps_pos_prior.iter().sum::<f64>()
            + self.eps_neg_prior.iter().sum::<f64>()
            + self.coi_prior.iter().sum::<f64>()
            + self.relatedness_prior.iter().sum::<f64>()
            + self.mean_coi_hyper_prior
    }
}

/// Proposal scales; one entry per sample or locus so a host may tune them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalTuning {
    /// False-positive random-walk sd per sample.
    pub eps_pos_sd: Vec<f64>,
    /// False-negative random-walk sd per sample.
    pub eps_neg_sd: Vec<f64>,
    /// Relatedness random-walk sd per sample.
    pub relatedness_sd: Vec<f64>,
    /// Relatedness sd of the joint COI/relatedness move per sample.
    pub coi_relatedness_sd: Vec<f64>,
    /// Dirichlet concentration of the allele-frequency proposal per locus.
    pub allele_freq_concentration: Vec<f64>,
    /// Mean COI random-walk sd.
    pub mean_coi_sd: f64,
}

impl ProposalTuning {
    fn from_config(config: &ProposalConfig, num_samples: usize, num_loci: usize) -> Self {
        Self {
            eps_pos_sd: vec![config.eps_pos_sd; num_samples],
            eps_neg_sd: vec![config.eps_neg_sd; num_samples],
            relatedness_sd: vec![config.relatedness_sd; num_samples],
            coi_relatedness_sd: vec![config.coi_relatedness_sd; num_samples],
            allele_freq_concentration: vec![config.allele_freq_concentration; num_loci],
            mean_coi_sd: config.mean_coi_sd,
        }
    }
}

/// Acceptance bookkeeping, per sample/locus and per block kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCounters {
    /// Accepted COI moves per sample.
    pub coi: Vec<usize>,
    /// Accepted relatedness moves per sample.
    pub relatedness: Vec<usize>,
    /// Accepted joint COI/relatedness moves per sample.
    pub coi_relatedness: Vec<usize>,
    /// Accepted false-positive moves per sample.
    pub eps_pos: Vec<usize>,
    /// Accepted false-negative moves per sample.
    pub eps_neg: Vec<usize>,
    /// Latent genotype refreshes per sample.
    pub latent: Vec<usize>,
    /// Accepted allele-frequency moves per locus.
    pub allele_freq_accept: Vec<usize>,
    /// Attempted allele-frequency moves per locus.
    pub allele_freq_attempt: Vec<usize>,
    /// Accepted mean COI moves.
    pub mean_coi: usize,
    proposed: BTreeMap<BlockKind, usize>,
    accepted: BTreeMap<BlockKind, usize>,
}

impl AcceptanceCounters {
    fn new(num_samples: usize, num_loci: usize) -> Self {
        Self {
            coi: vec![0; num_samples],
            relatedness: vec![0; num_samples],
            coi_relatedness: vec![0; num_samples],
            eps_pos: vec![0; num_samples],
            eps_neg: vec![0; num_samples],
            latent: vec![0; num_samples],
            allele_freq_accept: vec![0; num_loci],
            allele_freq_attempt: vec![0; num_loci],
            mean_coi: 0,
            proposed: BTreeMap::new(),
            accepted: BTreeMap::new(),
        }
    }

    pub(crate) fn record(&mut self, block: UpdateBlock, accepted: bool) {
        let kind = block.kind();
        *self.proposed.entry(kind).or_insert(0) += 1;
        if let UpdateBlock::AlleleFreqs(locus) = block {
            self.allele_freq_attempt[locus] += 1;
        }
        if !accepted {
            return;
        }
        *self.accepted.entry(kind).or_insert(0) += 1;
        match block {
            UpdateBlock::EpsPos(sample) => self.eps_pos[sample] += 1,
            UpdateBlock::EpsNeg(sample) => self.eps_neg[sample] += 1,
            UpdateBlock::AlleleFreqs(locus) => self.allele_freq_accept[locus] += 1,
            UpdateBlock::Coi(sample) => self.coi[sample] += 1,
            UpdateBlock::Relatedness(sample) => self.relatedness[sample] += 1,
            UpdateBlock::CoiRelatedness(sample) => self.coi_relatedness[sample] += 1,
            UpdateBlock::MeanCoi => self.mean_coi += 1,
        }
    }

    pub(crate) fn record_latent(&mut self, sample: usize, refreshed: bool) {
        *self.proposed.entry(BlockKind::Latent).or_insert(0) += 1;
        if refreshed {
            *self.accepted.entry(BlockKind::Latent).or_insert(0) += 1;
            self.latent[sample] += 1;
        }
    }

    /// Number of proposals made for a block kind.
    pub fn proposed(&self, kind: BlockKind) -> usize {
        self.proposed.get(&kind).copied().unwrap_or(0)
    }

    /// Number of accepted proposals for a block kind.
    pub fn accepted(&self, kind: BlockKind) -> usize {
        self.accepted.get(&kind).copied().unwrap_or(0)
    }

    /// Acceptance rate per block kind, keyed by its stable name.
    pub fn acceptance_rates(&self) -> BTreeMap<String, f64> {
        self.proposed
            .iter()
            .map(|(kind, &proposed)| {
                let accepted = self.accepted(*kind);
                let rate = if proposed == 0 {
                    0.0
                } else {
                    accepted as f64 / proposed as f64
                };
                (kind.as_str().to_string(), rate)
            })
            .collect()
    }
}

/// One Markov chain at a fixed (swappable) temperature.
#[derive(Debug)]
pub struct Chain {
    pub(crate) context: Arc<ChainContext>,
    pub(crate) temperature: f64,
    pub(crate) state: ChainState,
    pub(crate) cache: LikelihoodCache,
    pub(crate) tuning: ProposalTuning,
    pub(crate) counters: AcceptanceCounters,
    pub(crate) multisets: MultisetCache,
    pub(crate) rng: RngHandle,
    pub(crate) generation: u64,
}

impl Chain {
    /// Draws a random initial state and scores it.
    ///
    /// The returned chain may have a non-finite log-likelihood; the ensemble
    /// decides whether to retry.
    pub fn new(
        context: Arc<ChainContext>,
        temperature: f64,
        seed: u64,
    ) -> Result<Self, MoireError> {
        if context.max_coi == 0 {
            return Err(MoireError::config("config-max-coi", "max_coi must be at least 1"));
        }
        let mut rng = RngHandle::from_seed(seed);
        let state = initial_state(&context, &mut rng)?;
        let num_samples = context.data.num_samples();
        let num_loci = context.data.num_loci();
        let mut chain = Self {
            tuning: ProposalTuning::from_config(&context.proposals, num_samples, num_loci),
            counters: AcceptanceCounters::new(num_samples, num_loci),
            cache: LikelihoodCache::empty(num_samples, num_loci),
            multisets: MultisetCache::new(),
            context,
            temperature,
            state,
            rng,
            generation: 0,
        };
        chain.initialize_latent_genotypes();
        chain.cache = chain.compute_cache();
        debug!(
            "initialised chain at temperature {temperature} (llik {:.4}, prior {:.4})",
            chain.cache.llik, chain.cache.prior
        );
        Ok(chain)
    }

    fn initialize_latent_genotypes(&mut self) {
        let Chain {
            context,
            state,
            multisets,
            rng,
            ..
        } = self;
        for sample in 0..context.data.num_samples() {
            let coi = state.coi[sample];
            for locus in 0..context.data.num_loci() {
                let params = state.genotype_params(sample, locus);
                let (_, latent) =
                    context.evaluate_locus(multisets, sample, locus, coi, &params, Some(&mut *rng));
                // An all-zero conditional only happens with a -inf likelihood,
                // which the ensemble rejects.
                state.latent[sample][locus] = latent.unwrap_or_else(|| vec![0; coi]);
            }
        }
    }

    /// Scores the current state from scratch.
    fn compute_cache(&mut self) -> LikelihoodCache {
        let Chain {
            context,
            state,
            multisets,
            ..
        } = self;
        let data = &context.data;
        let mut cache = LikelihoodCache::empty(data.num_samples(), data.num_loci());
        for sample in 0..data.num_samples() {
            for locus in 0..data.num_loci() {
                let params = state.genotype_params(sample, locus);
                let coi = state.coi[sample];
                let (marginal, _) =
                    context.evaluate_locus(multisets, sample, locus, coi, &params, None);
                *cache.genotype_llik_mut(sample, locus) = marginal;
            }
            cache.eps_pos_prior[sample] =
                priors::eps_pos_prior(state.eps_pos[sample], &context.priors);
            cache.eps_neg_prior[sample] =
                priors::eps_neg_prior(state.eps_neg[sample], &context.priors);
            cache.coi_prior[sample] = priors::coi_prior(state.coi[sample], state.mean_coi);
            cache.relatedness_prior[sample] = priors::relatedness_prior(
                state.relatedness[sample],
                &context.priors,
                context.allow_relatedness,
            );
        }
        cache.mean_coi_hyper_prior = priors::mean_coi_hyper_prior(state.mean_coi, &context.priors);
        cache.llik = cache.calculate_llik();
        cache.prior = cache.calculate_prior();
        cache
    }

    /// Recomputes `(llik, prior)` from scratch without touching the running
    /// totals. Used to check the incremental bookkeeping.
    pub fn recompute_totals(&mut self) -> (f64, f64) {
        let cache = self.compute_cache();
        (cache.llik, cache.prior)
    }

    /// Total log-likelihood of the accepted state.
    pub fn llik(&self) -> f64 {
        self.cache.llik
    }

    /// Total log-prior of the accepted state.
    pub fn prior(&self) -> f64 {
        self.cache.prior
    }

    /// Tempered log-posterior: `llik / temperature + prior`.
    pub fn posterior(&self) -> f64 {
        self.cache.llik / self.temperature + self.cache.prior
    }

    /// Current temperature.
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Moves the chain to another rung, carrying the likelihood rescaled for
    /// it. The genotype sum is restored at the start of the next round.
    pub(crate) fn apply_swap(&mut self, temperature: f64, scaled_llik: f64) {
        self.temperature = temperature;
        self.cache.llik = scaled_llik;
    }

    pub(crate) fn reanchor_llik(&mut self) {
        self.cache.llik = self.cache.calculate_llik();
    }

    /// Accepted parameter state.
    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Committed likelihood and prior components.
    pub fn cache(&self) -> &LikelihoodCache {
        &self.cache
    }

    /// Acceptance counters.
    pub fn counters(&self) -> &AcceptanceCounters {
        &self.counters
    }

    /// Proposal scales.
    pub fn tuning(&self) -> &ProposalTuning {
        &self.tuning
    }

    /// Mutable proposal scales, for hosts that adapt them between iterations.
    pub fn tuning_mut(&mut self) -> &mut ProposalTuning {
        &mut self.tuning
    }

    /// Shared run context.
    pub fn context(&self) -> &ChainContext {
        &self.context
    }
}

fn initial_error_rate(
    rng: &mut RngHandle,
    alpha: f64,
    beta: f64,
    max: f64,
) -> Result<f64, MoireError> {
    let draw = rng.beta(alpha, beta)?;
    Ok(if draw <= max { draw } else { max * rng.uniform() })
}

fn initial_state(context: &ChainContext, rng: &mut RngHandle) -> Result<ChainState, MoireError> {
    let data = &context.data;
    let priors = &context.priors;
    let num_samples = data.num_samples();

    let coi: Vec<usize> = (0..num_samples)
        .map(|sample| data.max_observed_count(sample).clamp(1, context.max_coi))
        .collect();

    let mut allele_freqs = Vec::with_capacity(data.num_loci());
    for locus in 0..data.num_loci() {
        let counts = data.allele_counts(locus);
        if counts.len() == 1 {
            allele_freqs.push(vec![1.0]);
            continue;
        }
        let total = (counts.iter().sum::<usize>() + counts.len()) as f64;
        let alpha: Vec<f64> = counts
            .iter()
            .map(|&count| INIT_FREQ_CONCENTRATION * (count as f64 + 1.0) / total)
            .collect();
        let draw = rng.dirichlet(&alpha)?;
        let freqs = crate::kernel::normalize_simplex(draw).unwrap_or_else(|| {
            let uniform = 1.0 / counts.len() as f64;
            vec![uniform; counts.len()]
        });
        allele_freqs.push(freqs);
    }

    let mut eps_pos = Vec::with_capacity(num_samples);
    let mut eps_neg = Vec::with_capacity(num_samples);
    let mut relatedness = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        eps_pos.push(initial_error_rate(
            rng,
            priors.eps_pos_alpha,
            priors.eps_pos_beta,
            priors.max_eps_pos,
        )?);
        eps_neg.push(initial_error_rate(
            rng,
            priors.eps_neg_alpha,
            priors.eps_neg_beta,
            priors.max_eps_neg,
        )?);
        relatedness.push(if context.allow_relatedness {
            rng.beta(priors.r_alpha, priors.r_beta)?
        } else {
            0.0
        });
    }

    let mean_coi = (coi.iter().map(|&m| (m - 1) as f64).sum::<f64>() / num_samples as f64)
        .max(MIN_INIT_MEAN_COI);

    let latent = coi
        .iter()
        .map(|&m| vec![vec![0usize; m]; data.num_loci()])
        .collect();

    Ok(ChainState {
        coi,
        relatedness,
        allele_freqs,
        eps_pos,
        eps_neg,
        mean_coi,
        latent,
    })
}
