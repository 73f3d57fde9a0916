use approx::assert_relative_eq;
use moire_core::enumerate_multisets;
use moire_mcmc::{GenotypeParams, LikelihoodModel, PolyaUrnRelatedness, RelatednessPolicy};
use proptest::prelude::*;

#[test]
fn unrelated_transmission_is_multinomial() {
    let model = LikelihoodModel::default();
    let freqs = [0.5, 0.3, 0.2];
    let lp = model.calc_transmission_process(&[0, 0, 1], &freqs, 0.0);
    assert_relative_eq!(lp.exp(), 3.0 * 0.25 * 0.3, epsilon = 1e-12);
    let lp = model.calc_transmission_process(&[2], &freqs, 0.0);
    assert_relative_eq!(lp.exp(), 0.2, epsilon = 1e-12);
}

#[test]
fn fully_related_strains_share_one_allele() {
    let freqs = [0.6, 0.4];
    let urn = PolyaUrnRelatedness;
    assert_relative_eq!(urn.log_prob(&[1, 1, 1], &freqs, 1.0).exp(), 0.4, epsilon = 1e-12);
    assert_eq!(urn.log_prob(&[0, 1, 1], &freqs, 1.0), f64::NEG_INFINITY);
}

proptest! {
    #[test]
    fn transmission_sums_to_one(
        coi in 1usize..5,
        raw in prop::collection::vec(0.05f64..1.0, 2..5),
        relatedness in 0.0f64..=1.0,
    ) {
        let total: f64 = raw.iter().sum();
        let freqs: Vec<f64> = raw.iter().map(|w| w / total).collect();
        let model = LikelihoodModel::default();
        let mass: f64 = enumerate_multisets(coi, freqs.len())
            .iter()
            .map(|latent| model.calc_transmission_process(latent, &freqs, relatedness).exp())
            .sum();
        prop_assert!((mass - 1.0).abs() < 1e-9, "mass {}", mass);
    }
}

#[test]
fn observation_process_scores_each_call() {
    let model = LikelihoodModel::default();
    // Allele 0 carried once and seen; allele 1 absent and not seen.
    let lp = model.calc_observation_process(&[0], &[1, 0], 0.2, 0.1);
    assert_relative_eq!(lp, (0.8f64 * 0.9).ln(), epsilon = 1e-12);
    // Two copies of allele 0 missed only if both are missed.
    let lp = model.calc_observation_process(&[0, 0], &[0, 1], 0.2, 0.1);
    assert_relative_eq!(lp, (0.04f64 * 0.1).ln(), epsilon = 1e-12);
}

#[test]
fn missing_call_contributes_nothing() {
    let model = LikelihoodModel::default();
    assert_eq!(model.calc_observation_process(&[0, 1], &[0, 0, 0], 0.3, 0.2), 0.0);
}

#[test]
fn genotype_lliks_follow_enumeration_order() {
    let model = LikelihoodModel::default();
    let freqs = [0.7, 0.3];
    let params = GenotypeParams {
        eps_pos: 0.05,
        eps_neg: 0.1,
        relatedness: 0.0,
        allele_freqs: &freqs,
    };
    let table = enumerate_multisets(2, 2);
    let lliks = model.calc_obs_genotype_lliks(&[1, 1], &table, &params);
    assert_eq!(lliks.len(), table.len());
    for (latent, llik) in table.iter().zip(&lliks) {
        assert_eq!(*llik, model.calc_genotype_log_pmf(latent, &[1, 1], &params));
    }
    // The heterozygous genotype explains both calls best.
    let best = lliks
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(idx, _)| idx)
        .unwrap();
    assert_eq!(table[best], vec![0, 1]);
}
