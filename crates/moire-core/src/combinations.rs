//! Enumeration of latent multi-strain genotypes.
//!
//! Strains inside a sample are unordered, so a latent genotype is a multiset
//! of allele indices. It is stored as a non-decreasing vector of length
//! `coi`; each multiset appears exactly once in an enumeration.

use std::collections::HashMap;
use std::sync::Arc;

/// Number of multisets of size `coi` drawn from `num_alleles` alleles,
/// `C(num_alleles + coi - 1, coi)`, saturating at `usize::MAX`.
pub fn multiset_count(coi: usize, num_alleles: usize) -> usize {
    if num_alleles == 0 {
        return usize::from(coi == 0);
    }
    let mut count: u128 = 1;
    for i in 1..=coi as u128 {
        count = count * (num_alleles as u128 + i - 1) / i;
        if count > usize::MAX as u128 {
            return usize::MAX;
        }
    }
    count as usize
}

/// Every non-decreasing allele-index vector of length `coi`, in
/// lexicographic order.
pub fn enumerate_multisets(coi: usize, num_alleles: usize) -> Vec<Vec<usize>> {
    if coi == 0 {
        return vec![Vec::new()];
    }
    if num_alleles == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(multiset_count(coi, num_alleles).min(1 << 20));
    let mut current = vec![0usize; coi];
    loop {
        out.push(current.clone());
        let mut pos = coi;
        while pos > 0 && current[pos - 1] == num_alleles - 1 {
            pos -= 1;
        }
        if pos == 0 {
            break;
        }
        let next = current[pos - 1] + 1;
        for slot in &mut current[pos - 1..] {
            *slot = next;
        }
    }
    out
}

/// Per-allele copy counts of a latent genotype.
pub fn allele_copies(latent: &[usize], num_alleles: usize) -> Vec<usize> {
    let mut copies = vec![0usize; num_alleles];
    for &allele in latent {
        copies[allele] += 1;
    }
    copies
}

/// Lazily filled table of enumerations keyed by `(coi, num_alleles)`.
///
/// Each chain owns one, so lookups during the parallel update round never
/// contend.
#[derive(Debug, Clone, Default)]
pub struct MultisetCache {
    tables: HashMap<(usize, usize), Arc<Vec<Vec<usize>>>>,
}

impl MultisetCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the enumeration for `(coi, num_alleles)`, building it on first use.
    pub fn get(&mut self, coi: usize, num_alleles: usize) -> Arc<Vec<Vec<usize>>> {
        self.tables
            .entry((coi, num_alleles))
            .or_insert_with(|| Arc::new(enumerate_multisets(coi, num_alleles)))
            .clone()
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True when nothing has been enumerated yet.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
