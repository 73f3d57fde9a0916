//! Observed genotyping data: presence/absence calls per sample and locus.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, MoireError};

/// Immutable container of presence/absence calls.
///
/// `observations[sample][locus]` holds one 0/1 entry per allele of that
/// locus. A vector with no detected allele is treated as missing data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGenotypingData")]
pub struct GenotypingData {
    sample_ids: Vec<String>,
    locus_ids: Vec<String>,
    num_alleles: Vec<usize>,
    observations: Vec<Vec<Vec<u8>>>,
}

/// Raw shape used for deserialization before validation.
#[derive(Debug, Clone, Deserialize)]
struct RawGenotypingData {
    #[serde(default)]
    sample_ids: Vec<String>,
    #[serde(default)]
    locus_ids: Vec<String>,
    num_alleles: Vec<usize>,
    observations: Vec<Vec<Vec<u8>>>,
}

impl TryFrom<RawGenotypingData> for GenotypingData {
    type Error = MoireError;

    fn try_from(raw: RawGenotypingData) -> Result<Self, Self::Error> {
        Self::new(raw.sample_ids, raw.locus_ids, raw.num_alleles, raw.observations)
    }
}

impl GenotypingData {
    /// Validates and builds a data set from nested observation vectors.
    ///
    /// Identifiers are synthesised (`S0`, `L0`, ...) when left empty.
    pub fn new(
        sample_ids: Vec<String>,
        locus_ids: Vec<String>,
        num_alleles: Vec<usize>,
        observations: Vec<Vec<Vec<u8>>>,
    ) -> Result<Self, MoireError> {
        if observations.is_empty() {
            return Err(MoireError::data("data-no-samples", "no samples were provided"));
        }
        if num_alleles.is_empty() {
            return Err(MoireError::data("data-no-loci", "no loci were provided"));
        }
        let sample_ids = if sample_ids.is_empty() {
            (0..observations.len()).map(|i| format!("S{i}")).collect()
        } else {
            sample_ids
        };
        let locus_ids = if locus_ids.is_empty() {
            (0..num_alleles.len()).map(|i| format!("L{i}")).collect()
        } else {
            locus_ids
        };
        if sample_ids.len() != observations.len() {
            return Err(MoireError::Data(
                ErrorInfo::new("data-sample-ids", "sample id count does not match observations")
                    .with_context("ids", sample_ids.len())
                    .with_context("samples", observations.len()),
            ));
        }
        if locus_ids.len() != num_alleles.len() {
            return Err(MoireError::Data(
                ErrorInfo::new("data-locus-ids", "locus id count does not match allele counts")
                    .with_context("ids", locus_ids.len())
                    .with_context("loci", num_alleles.len()),
            ));
        }
        for (locus, &alleles) in num_alleles.iter().enumerate() {
            if alleles == 0 {
                return Err(MoireError::Data(
                    ErrorInfo::new("data-empty-locus", "locus declares zero alleles")
                        .with_context("locus", &locus_ids[locus]),
                ));
            }
        }
        for (sample, per_locus) in observations.iter().enumerate() {
            if per_locus.len() != num_alleles.len() {
                return Err(MoireError::Data(
                    ErrorInfo::new("data-locus-count", "sample has the wrong number of loci")
                        .with_context("sample", &sample_ids[sample])
                        .with_context("expected", num_alleles.len())
                        .with_context("found", per_locus.len()),
                ));
            }
            for (locus, calls) in per_locus.iter().enumerate() {
                if calls.len() != num_alleles[locus] {
                    return Err(MoireError::Data(
                        ErrorInfo::new("data-allele-count", "observation length mismatch")
                            .with_context("sample", &sample_ids[sample])
                            .with_context("locus", &locus_ids[locus])
                            .with_context("expected", num_alleles[locus])
                            .with_context("found", calls.len()),
                    ));
                }
                if calls.iter().any(|&call| call > 1) {
                    return Err(MoireError::Data(
                        ErrorInfo::new("data-non-binary", "calls must be 0 or 1")
                            .with_context("sample", &sample_ids[sample])
                            .with_context("locus", &locus_ids[locus]),
                    ));
                }
            }
        }
        Ok(Self {
            sample_ids,
            locus_ids,
            num_alleles,
            observations,
        })
    }

    /// Builds a data set with synthesised identifiers.
    pub fn from_observations(
        num_alleles: Vec<usize>,
        observations: Vec<Vec<Vec<u8>>>,
    ) -> Result<Self, MoireError> {
        Self::new(Vec::new(), Vec::new(), num_alleles, observations)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self, MoireError> {
        serde_json::from_str(input).map_err(|err| MoireError::serde("data-json", err))
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.observations.len()
    }

    /// Number of loci.
    pub fn num_loci(&self) -> usize {
        self.num_alleles.len()
    }

    /// Allele cardinality of every locus.
    pub fn num_alleles(&self) -> &[usize] {
        &self.num_alleles
    }

    /// Sample identifiers.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Locus identifiers.
    pub fn locus_ids(&self) -> &[String] {
        &self.locus_ids
    }

    /// Presence/absence vector for a sample at a locus.
    pub fn observed(&self, sample: usize, locus: usize) -> &[u8] {
        &self.observations[sample][locus]
    }

    /// True when no allele was detected, i.e. the call is missing.
    pub fn is_missing(&self, sample: usize, locus: usize) -> bool {
        self.observed(sample, locus).iter().all(|&call| call == 0)
    }

    /// Number of detected alleles for a sample at a locus.
    pub fn observed_count(&self, sample: usize, locus: usize) -> usize {
        self.observed(sample, locus)
            .iter()
            .filter(|&&call| call == 1)
            .count()
    }

    /// Largest number of detected alleles across loci for a sample.
    pub fn max_observed_count(&self, sample: usize) -> usize {
        (0..self.num_loci())
            .map(|locus| self.observed_count(sample, locus))
            .max()
            .unwrap_or(0)
    }

    /// Number of samples that detected each allele at `locus`.
    pub fn allele_counts(&self, locus: usize) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_alleles[locus]];
        for sample in 0..self.num_samples() {
            for (allele, &call) in self.observed(sample, locus).iter().enumerate() {
                counts[allele] += call as usize;
            }
        }
        counts
    }
}
