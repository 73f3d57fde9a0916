use std::collections::BTreeSet;

use moire_core::{allele_copies, enumerate_multisets, multiset_count, MultisetCache};
use proptest::prelude::*;

#[test]
fn small_enumeration_is_exact() {
    let sets = enumerate_multisets(2, 3);
    assert_eq!(
        sets,
        vec![
            vec![0, 0],
            vec![0, 1],
            vec![0, 2],
            vec![1, 1],
            vec![1, 2],
            vec![2, 2],
        ]
    );
}

#[test]
fn single_allele_locus_has_one_assignment() {
    assert_eq!(enumerate_multisets(4, 1), vec![vec![0, 0, 0, 0]]);
}

#[test]
fn copies_count_each_allele() {
    assert_eq!(allele_copies(&[0, 0, 2], 3), vec![2, 0, 1]);
}

#[test]
fn cache_reuses_tables() {
    let mut cache = MultisetCache::new();
    let a = cache.get(3, 4);
    let b = cache.get(3, 4);
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(cache.len(), 1);
    assert_eq!(a.len(), multiset_count(3, 4));
}

proptest! {
    #[test]
    fn enumeration_is_exhaustive_and_unique(coi in 1usize..5, alleles in 1usize..6) {
        let sets = enumerate_multisets(coi, alleles);
        prop_assert_eq!(sets.len(), multiset_count(coi, alleles));
        let unique: BTreeSet<_> = sets.iter().cloned().collect();
        prop_assert_eq!(unique.len(), sets.len());
        for set in &sets {
            prop_assert_eq!(set.len(), coi);
            prop_assert!(set.windows(2).all(|w| w[0] <= w[1]));
            prop_assert!(set.iter().all(|&a| a < alleles));
        }
    }
}
