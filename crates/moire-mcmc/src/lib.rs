//! Parallel-tempered MCMC over complexity of infection, relatedness, allele
//! frequencies and genotyping error rates.

#![deny(missing_docs)]

/// A single chain: parameter state, likelihood cache and counters.
pub mod chain;
/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Chain ensemble, swap pass and the `run` entry point.
pub mod ensemble;
/// Proposals, commit/rollback and per-family update kernels.
pub mod kernel;
/// Transmission and observation likelihood.
pub mod likelihood;
/// Diagnostic traces and posterior draw buffers.
pub mod metrics;
/// Log prior terms.
pub mod priors;
/// JSON run summary.
pub mod summary;
/// Temperature ladder helpers.
pub mod tempering;

pub use chain::{
    AcceptanceCounters, Chain, ChainContext, ChainState, LikelihoodCache, ProposalTuning,
};
pub use config::{LadderConfig, LadderPolicy, PriorConfig, ProposalConfig, RunConfig, SeedPolicy};
pub use ensemble::{run, Ensemble};
pub use kernel::{metropolis_accept, BlockKind, Proposal, UpdateBlock};
pub use likelihood::{GenotypeParams, LikelihoodModel, PolyaUrnRelatedness, RelatednessPolicy};
pub use metrics::{PosteriorDraws, Trace, Traces};
pub use summary::RunSummary;
