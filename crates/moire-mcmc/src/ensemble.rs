use std::sync::Arc;

use log::{debug, info, warn};
use moire_core::errors::{ErrorInfo, MoireError};
use moire_core::{GenotypingData, RngHandle};
use rayon::prelude::*;

use crate::chain::{Chain, ChainContext};
use crate::config::RunConfig;
use crate::determinism;
use crate::likelihood::LikelihoodModel;
use crate::metrics::{PosteriorDraws, Traces};
use crate::summary::RunSummary;
use crate::tempering;

/// Parallel-tempered set of chains.
///
/// Chains never move in storage. `ladder_order[position]` names the chain
/// currently sitting at that rung; position 0 always holds temperature 1.0.
#[derive(Debug)]
pub struct Ensemble {
    config: RunConfig,
    chains: Vec<Chain>,
    ladder_order: Vec<usize>,
    swap_accepts: Vec<usize>,
    num_swaps: usize,
    hot_chain_trace: Vec<usize>,
    traces: Traces,
    draws: PosteriorDraws,
    swap_rng: RngHandle,
    pool: Option<rayon::ThreadPool>,
}

impl Ensemble {
    /// Builds one chain per ladder rung with the default likelihood model.
    pub fn new(data: GenotypingData, config: RunConfig) -> Result<Self, MoireError> {
        Self::with_model(data, config, LikelihoodModel::default())
    }

    /// Builds one chain per ladder rung with explicit likelihood policies.
    pub fn with_model(
        data: GenotypingData,
        config: RunConfig,
        model: LikelihoodModel,
    ) -> Result<Self, MoireError> {
        config.validate()?;
        let ladder = tempering::build_ladder(&config.ladder)?;
        info!(
            "building {} chain(s) for {} sample(s) x {} loci, ladder {:?}",
            ladder.len(),
            data.num_samples(),
            data.num_loci(),
            ladder
        );
        let context = Arc::new(ChainContext::new(data, &config, model));
        let master_seed = config.seed_policy.master_seed;
        let chains = ladder
            .iter()
            .enumerate()
            .map(|(rung, &temperature)| {
                init_chain(&context, rung, temperature, master_seed, config.max_init_attempts)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_chains(chains, config)
    }

    /// Assembles an ensemble from already built chains, in ladder order.
    ///
    /// Chain temperatures must form a valid ladder. Initial likelihoods are not
    /// checked.
    pub fn from_chains(chains: Vec<Chain>, config: RunConfig) -> Result<Self, MoireError> {
        let temperatures: Vec<f64> = chains.iter().map(Chain::temperature).collect();
        tempering::validate_ladder(&temperatures)?;
        let pool = match config.threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|err| {
                        MoireError::Config(
                            ErrorInfo::new("thread-pool", err.to_string())
                                .with_context("threads", threads),
                        )
                    })?,
            ),
            None => None,
        };
        let num_chains = chains.len();
        let data = chains[0].context().data();
        let draws = PosteriorDraws::new(data.num_samples(), data.num_loci());
        Ok(Self {
            swap_rng: RngHandle::from_seed(determinism::swap_seed(config.seed_policy.master_seed)),
            config,
            chains,
            ladder_order: (0..num_chains).collect(),
            swap_accepts: vec![0; num_chains.saturating_sub(1)],
            num_swaps: 0,
            hot_chain_trace: Vec::new(),
            traces: Traces::default(),
            draws,
            pool,
        })
    }

    fn update_all(&mut self, iteration: usize) -> Result<(), MoireError> {
        let chains = &mut self.chains;
        let mut round = move || {
            chains
                .par_iter_mut()
                .try_for_each(|chain| chain.update_round(iteration))
        };
        match &self.pool {
            Some(pool) => pool.install(round),
            None => round(),
        }
    }

    fn hot(&self) -> &Chain {
        &self.chains[self.ladder_order[0]]
    }

    /// One burn-in step: update every chain, trace, then swap.
    pub fn burnin(&mut self, step: usize) -> Result<(), MoireError> {
        self.update_all(step)?;
        let (llik, prior, posterior) = (self.llik(), self.prior(), self.posterior());
        self.traces.burnin.push(llik, prior, posterior);
        self.swap_chains();
        Ok(())
    }

    /// One sampling step: update, trace, record a thinned draw, then swap.
    pub fn sample(&mut self, step: usize) -> Result<(), MoireError> {
        self.update_all(self.config.burnin + step)?;
        let (llik, prior, posterior) = (self.llik(), self.prior(), self.posterior());
        self.traces.sampling.push(llik, prior, posterior);
        let thin = self.config.thin;
        if thin == 0 || step % thin == 0 {
            let hot = &self.chains[self.ladder_order[0]];
            if hot.temperature() == 1.0 {
                self.draws.record(hot.state());
            }
        }
        self.swap_chains();
        Ok(())
    }

    /// Sequential replica-exchange pass over adjacent ladder positions.
    pub fn swap_chains(&mut self) {
        for position in 0..self.ladder_order.len().saturating_sub(1) {
            let a = self.ladder_order[position];
            let b = self.ladder_order[position + 1];
            let (llik_a, temp_a) = (self.chains[a].llik(), self.chains[a].temperature());
            let (llik_b, temp_b) = (self.chains[b].llik(), self.chains[b].temperature());
            let log_u = self.swap_rng.log_uniform();
            if let Some((scaled_a, scaled_b)) =
                tempering::attempt_swap(llik_a, temp_a, llik_b, temp_b, log_u)
            {
                self.chains[a].apply_swap(temp_b, scaled_a);
                self.chains[b].apply_swap(temp_a, scaled_b);
                self.ladder_order.swap(position, position + 1);
                self.swap_accepts[position] += 1;
                debug!("swap {position}<->{}: chains {a} and {b} exchanged", position + 1);
            }
        }
        self.num_swaps += 1;
        self.hot_chain_trace.push(self.ladder_order[0]);
    }

    /// Runs every configured burn-in and sampling step.
    pub fn run_all(&mut self) -> Result<RunSummary, MoireError> {
        info!("burn-in: {} iteration(s)", self.config.burnin);
        for step in 0..self.config.burnin {
            self.burnin(step)?;
        }
        info!(
            "sampling: {} iteration(s), thin {}",
            self.config.samples, self.config.thin
        );
        for step in 0..self.config.samples {
            self.sample(step)?;
        }
        info!(
            "finished with {} draw(s); swap acceptance {:?}",
            self.draws.len(),
            self.swap_acceptance_rates()
        );
        Ok(self.summary())
    }

    /// Log-likelihood of the chain at temperature 1.0.
    pub fn llik(&self) -> f64 {
        self.hot().llik()
    }

    /// Log-prior of the chain at temperature 1.0.
    pub fn prior(&self) -> f64 {
        self.hot().prior()
    }

    /// Log-posterior of the chain at temperature 1.0.
    pub fn posterior(&self) -> f64 {
        self.hot().posterior()
    }

    /// Id of the chain currently at temperature 1.0.
    pub fn hot_chain(&self) -> usize {
        self.ladder_order[0]
    }

    /// Rung position to chain id.
    pub fn ladder_order(&self) -> &[usize] {
        &self.ladder_order
    }

    /// Accepted swaps per adjacent position pair.
    pub fn swap_acceptances(&self) -> &[usize] {
        &self.swap_accepts
    }

    /// Accepted swaps per pair divided by the number of passes.
    pub fn swap_acceptance_rates(&self) -> Vec<f64> {
        self.swap_accepts
            .iter()
            .map(|&accepted| {
                if self.num_swaps == 0 {
                    0.0
                } else {
                    accepted as f64 / self.num_swaps as f64
                }
            })
            .collect()
    }

    /// Swap passes executed.
    pub fn num_swaps(&self) -> usize {
        self.num_swaps
    }

    /// Chain id at temperature 1.0 after each swap pass.
    pub fn hot_chain_trace(&self) -> &[usize] {
        &self.hot_chain_trace
    }

    /// Diagnostic traces.
    pub fn traces(&self) -> &Traces {
        &self.traces
    }

    /// Thinned posterior draws.
    pub fn draws(&self) -> &PosteriorDraws {
        &self.draws
    }

    /// Chains in storage order (indexed by chain id).
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Snapshot of the run so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            config: self.config.clone(),
            master_seed: self.config.seed_policy.master_seed,
            seed_label: self.config.seed_policy.label.clone(),
            acceptance_rates: self.hot().counters().acceptance_rates(),
            swap_acceptance_rates: self.swap_acceptance_rates(),
            hot_chain_trace: self.hot_chain_trace.clone(),
            mean_allele_freqs: self.draws.mean_allele_freqs(),
            mean_coi: self.draws.mean_coi_per_sample(),
            num_draws: self.draws.len(),
            traces: self.traces.clone(),
        }
    }
}

fn init_chain(
    context: &Arc<ChainContext>,
    rung: usize,
    temperature: f64,
    master_seed: u64,
    max_attempts: usize,
) -> Result<Chain, MoireError> {
    for attempt in 0..max_attempts {
        let seed = determinism::chain_seed(master_seed, rung, attempt);
        let chain = Chain::new(Arc::clone(context), temperature, seed)?;
        if chain.llik().is_finite() {
            if attempt > 0 {
                warn!("chain {rung} needed {} initialisation attempt(s)", attempt + 1);
            }
            return Ok(chain);
        }
        debug!(
            "chain {rung} attempt {attempt}: non-finite initial llik {}",
            chain.llik()
        );
    }
    Err(MoireError::DegenerateInit(
        ErrorInfo::new(
            "degenerate-init",
            "no finite initial likelihood within the attempt budget",
        )
        .with_context("chain", rung)
        .with_context("attempts", max_attempts)
        .with_hint("check for observations the error-rate bounds and max_coi cannot explain"),
    ))
}

/// Builds an ensemble and runs it to completion.
pub fn run(data: GenotypingData, config: RunConfig) -> Result<RunSummary, MoireError> {
    let mut ensemble = Ensemble::new(data, config)?;
    ensemble.run_all()
}
