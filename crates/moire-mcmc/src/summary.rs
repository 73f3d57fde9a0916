use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use moire_core::errors::{ErrorInfo, MoireError};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::metrics::Traces;

/// Compact description of a finished run, serialisable to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Master seed chains and the swap stream were derived from.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Acceptance rate per update block of the chain at temperature 1.0.
    pub acceptance_rates: BTreeMap<String, f64>,
    /// Swap acceptance rate per adjacent ladder pair.
    pub swap_acceptance_rates: Vec<f64>,
    /// Chain id at temperature 1.0 after every swap pass.
    pub hot_chain_trace: Vec<usize>,
    /// Posterior mean allele frequencies per locus.
    pub mean_allele_freqs: Vec<Vec<f64>>,
    /// Posterior mean COI per sample.
    pub mean_coi: Vec<f64>,
    /// Number of recorded posterior draws.
    pub num_draws: usize,
    /// Burn-in and sampling traces.
    pub traces: Traces,
}

impl RunSummary {
    /// Writes the summary as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<(), MoireError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                MoireError::Serde(
                    ErrorInfo::new("summary-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            MoireError::Serde(
                ErrorInfo::new("summary-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            MoireError::Serde(
                ErrorInfo::new("summary-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a summary written by [`RunSummary::write_json`].
    pub fn load(path: &Path) -> Result<Self, MoireError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            MoireError::Serde(
                ErrorInfo::new("summary-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            MoireError::Serde(
                ErrorInfo::new("summary-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
