use std::fs;
use std::path::Path;

use moire_core::errors::{ErrorInfo, MoireError};
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing an ensemble run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of burn-in iterations (not retained as posterior draws).
    #[serde(default = "default_burnin")]
    pub burnin: usize,
    /// Number of sampling iterations after burn-in.
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Record a posterior draw every `thin` sampling steps (0 records every step).
    #[serde(default = "default_thin")]
    pub thin: usize,
    /// Temperature ladder specification.
    #[serde(default)]
    pub ladder: LadderConfig,
    /// Model within-sample relatedness and update it jointly with COI.
    #[serde(default)]
    pub allow_relatedness: bool,
    /// Largest COI a sample may take.
    #[serde(default = "default_max_coi")]
    pub max_coi: usize,
    /// Attempts at drawing a chain with a finite initial likelihood.
    #[serde(default = "default_max_init_attempts")]
    pub max_init_attempts: usize,
    /// Worker threads for the per-chain update round (rayon default when unset).
    #[serde(default)]
    pub threads: Option<usize>,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Prior hyperparameters.
    #[serde(default)]
    pub priors: PriorConfig,
    /// Initial proposal scales.
    #[serde(default)]
    pub proposals: ProposalConfig,
}

fn default_burnin() -> usize {
    100
}

fn default_samples() -> usize {
    1000
}

fn default_thin() -> usize {
    1
}

fn default_max_coi() -> usize {
    8
}

fn default_max_init_attempts() -> usize {
    1000
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            burnin: default_burnin(),
            samples: default_samples(),
            thin: default_thin(),
            ladder: LadderConfig::default(),
            allow_relatedness: false,
            max_coi: default_max_coi(),
            max_init_attempts: default_max_init_attempts(),
            threads: None,
            seed_policy: SeedPolicy::default(),
            priors: PriorConfig::default(),
            proposals: ProposalConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parses a YAML document; missing fields take their defaults.
    pub fn from_yaml_str(input: &str) -> Result<Self, MoireError> {
        let config: RunConfig =
            serde_yaml::from_str(input).map_err(|err| MoireError::serde("config-yaml", err))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, MoireError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            MoireError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Checks bounds and hyperparameters. The ladder is checked separately by
    /// [`crate::tempering::build_ladder`].
    pub fn validate(&self) -> Result<(), MoireError> {
        if self.max_coi == 0 {
            return Err(MoireError::config("config-max-coi", "max_coi must be at least 1"));
        }
        if self.max_init_attempts == 0 {
            return Err(MoireError::config(
                "config-init-attempts",
                "max_init_attempts must be at least 1",
            ));
        }
        if self.threads == Some(0) {
            return Err(MoireError::config("config-threads", "threads must be positive"));
        }
        self.priors.validate()?;
        self.proposals.validate()?;
        crate::tempering::build_ladder(&self.ladder)?;
        Ok(())
    }
}

/// Temperature ladder construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderConfig {
    /// Number of chains in the ladder. A manual ladder infers it from its
    /// length when unset; a geometric ladder defaults to one chain.
    #[serde(default)]
    pub replicas: Option<usize>,
    /// Temperature of the first rung; posterior draws require it to be 1.0.
    #[serde(default = "default_base_temperature")]
    pub base_temperature: f64,
    /// Policy used to generate higher temperatures.
    #[serde(default)]
    pub policy: LadderPolicy,
}

fn default_base_temperature() -> f64 {
    1.0
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            replicas: None,
            base_temperature: default_base_temperature(),
            policy: LadderPolicy::default(),
        }
    }
}

impl LadderConfig {
    /// Explicit ladder with one chain per listed temperature.
    pub fn manual(temperatures: Vec<f64>) -> Self {
        Self {
            replicas: Some(temperatures.len()),
            base_temperature: default_base_temperature(),
            policy: LadderPolicy::Manual { temperatures },
        }
    }

    /// Geometric ladder starting at 1.0.
    pub fn geometric(replicas: usize, ratio: f64) -> Self {
        Self {
            replicas: Some(replicas),
            base_temperature: default_base_temperature(),
            policy: LadderPolicy::Geometric { ratio },
        }
    }
}

/// Supported ladder construction strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LadderPolicy {
    /// Geometric progression with a fixed ratio between neighbouring rungs.
    Geometric {
        /// Multiplicative spacing ratio between adjacent rungs.
        #[serde(default = "default_ratio")]
        ratio: f64,
    },
    /// Explicit list of temperatures; its length must equal `replicas`.
    Manual {
        /// Ordered list of temperatures, coldest first.
        temperatures: Vec<f64>,
    },
}

fn default_ratio() -> f64 {
    1.5
}

impl Default for LadderPolicy {
    fn default() -> Self {
        LadderPolicy::Geometric {
            ratio: default_ratio(),
        }
    }
}

/// Prior hyperparameters and parameter bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorConfig {
    /// Beta prior shape `alpha` for the false-positive rate.
    #[serde(default = "default_eps_alpha")]
    pub eps_pos_alpha: f64,
    /// Beta prior shape `beta` for the false-positive rate.
    #[serde(default = "default_eps_beta")]
    pub eps_pos_beta: f64,
    /// Upper bound for the false-positive rate.
    #[serde(default = "default_max_eps")]
    pub max_eps_pos: f64,
    /// Beta prior shape `alpha` for the false-negative rate.
    #[serde(default = "default_eps_alpha")]
    pub eps_neg_alpha: f64,
    /// Beta prior shape `beta` for the false-negative rate.
    #[serde(default = "default_eps_beta")]
    pub eps_neg_beta: f64,
    /// Upper bound for the false-negative rate.
    #[serde(default = "default_max_eps")]
    pub max_eps_neg: f64,
    /// Beta prior shape `alpha` for relatedness.
    #[serde(default = "default_unit")]
    pub r_alpha: f64,
    /// Beta prior shape `beta` for relatedness.
    #[serde(default = "default_unit")]
    pub r_beta: f64,
    /// Gamma hyper-prior shape for the mean COI.
    #[serde(default = "default_mean_coi_shape")]
    pub mean_coi_shape: f64,
    /// Gamma hyper-prior scale for the mean COI.
    #[serde(default = "default_mean_coi_scale")]
    pub mean_coi_scale: f64,
}

fn default_eps_alpha() -> f64 {
    1.0
}

fn default_eps_beta() -> f64 {
    10.0
}

fn default_max_eps() -> f64 {
    0.5
}

fn default_unit() -> f64 {
    1.0
}

fn default_mean_coi_shape() -> f64 {
    0.1
}

fn default_mean_coi_scale() -> f64 {
    10.0
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            eps_pos_alpha: default_eps_alpha(),
            eps_pos_beta: default_eps_beta(),
            max_eps_pos: default_max_eps(),
            eps_neg_alpha: default_eps_alpha(),
            eps_neg_beta: default_eps_beta(),
            max_eps_neg: default_max_eps(),
            r_alpha: default_unit(),
            r_beta: default_unit(),
            mean_coi_shape: default_mean_coi_shape(),
            mean_coi_scale: default_mean_coi_scale(),
        }
    }
}

fn require_positive(code: &str, name: &str, value: f64) -> Result<(), MoireError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MoireError::Config(
            ErrorInfo::new(code, format!("{name} must be a positive finite number"))
                .with_context(name, value),
        ))
    }
}

fn require_unit_interval(code: &str, name: &str, value: f64) -> Result<(), MoireError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MoireError::Config(
            ErrorInfo::new(code, format!("{name} must lie in [0, 1]")).with_context(name, value),
        ))
    }
}

impl PriorConfig {
    fn validate(&self) -> Result<(), MoireError> {
        require_positive("prior-eps-pos", "eps_pos_alpha", self.eps_pos_alpha)?;
        require_positive("prior-eps-pos", "eps_pos_beta", self.eps_pos_beta)?;
        require_positive("prior-eps-neg", "eps_neg_alpha", self.eps_neg_alpha)?;
        require_positive("prior-eps-neg", "eps_neg_beta", self.eps_neg_beta)?;
        require_positive("prior-relatedness", "r_alpha", self.r_alpha)?;
        require_positive("prior-relatedness", "r_beta", self.r_beta)?;
        require_positive("prior-mean-coi", "mean_coi_shape", self.mean_coi_shape)?;
        require_positive("prior-mean-coi", "mean_coi_scale", self.mean_coi_scale)?;
        require_unit_interval("prior-max-eps", "max_eps_pos", self.max_eps_pos)?;
        require_unit_interval("prior-max-eps", "max_eps_neg", self.max_eps_neg)?;
        Ok(())
    }
}

/// Initial proposal scales for every parameter family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalConfig {
    /// Random-walk standard deviation for the false-positive rate.
    #[serde(default = "default_eps_sd")]
    pub eps_pos_sd: f64,
    /// Random-walk standard deviation for the false-negative rate.
    #[serde(default = "default_eps_sd")]
    pub eps_neg_sd: f64,
    /// Random-walk standard deviation for relatedness.
    #[serde(default = "default_relatedness_sd")]
    pub relatedness_sd: f64,
    /// Relatedness standard deviation used by the joint COI/relatedness move.
    #[serde(default = "default_relatedness_sd")]
    pub coi_relatedness_sd: f64,
    /// Dirichlet concentration of the allele-frequency proposal.
    #[serde(default = "default_allele_freq_concentration")]
    pub allele_freq_concentration: f64,
    /// Random-walk standard deviation for the mean COI.
    #[serde(default = "default_mean_coi_sd")]
    pub mean_coi_sd: f64,
}

fn default_eps_sd() -> f64 {
    0.02
}

fn default_relatedness_sd() -> f64 {
    0.1
}

fn default_allele_freq_concentration() -> f64 {
    200.0
}

fn default_mean_coi_sd() -> f64 {
    0.5
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            eps_pos_sd: default_eps_sd(),
            eps_neg_sd: default_eps_sd(),
            relatedness_sd: default_relatedness_sd(),
            coi_relatedness_sd: default_relatedness_sd(),
            allele_freq_concentration: default_allele_freq_concentration(),
            mean_coi_sd: default_mean_coi_sd(),
        }
    }
}

impl ProposalConfig {
    fn validate(&self) -> Result<(), MoireError> {
        require_positive("proposal-scale", "eps_pos_sd", self.eps_pos_sd)?;
        require_positive("proposal-scale", "eps_neg_sd", self.eps_neg_sd)?;
        require_positive("proposal-scale", "relatedness_sd", self.relatedness_sd)?;
        require_positive("proposal-scale", "coi_relatedness_sd", self.coi_relatedness_sd)?;
        require_positive(
            "proposal-scale",
            "allele_freq_concentration",
            self.allele_freq_concentration,
        )?;
        require_positive("proposal-scale", "mean_coi_sd", self.mean_coi_sd)?;
        Ok(())
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded alongside the seed in summaries.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}
