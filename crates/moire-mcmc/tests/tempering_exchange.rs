use std::sync::Arc;

use approx::assert_relative_eq;
use moire_core::GenotypingData;
use moire_mcmc::tempering::{
    attempt_swap, build_ladder, swap_log_ratio, swapped_lliks, validate_ladder,
};
use moire_mcmc::{
    metropolis_accept, Chain, ChainContext, Ensemble, LadderConfig, LikelihoodModel, RunConfig,
};

fn small_data() -> GenotypingData {
    GenotypingData::from_observations(
        vec![2, 3],
        vec![
            vec![vec![1, 0], vec![0, 1, 0]],
            vec![vec![1, 1], vec![1, 0, 1]],
        ],
    )
    .unwrap()
}

#[test]
fn swap_ratio_rescales_each_likelihood_to_the_other_rung() {
    let (llik_a, temp_a, llik_b, temp_b) = (-10.0, 1.0, -20.0, 2.0);
    let expected = (llik_a / temp_a) * temp_b + (llik_b / temp_b) * temp_a - llik_a - llik_b;
    assert_eq!(swap_log_ratio(llik_a, temp_a, llik_b, temp_b), expected);
    assert_eq!(expected, 0.0);

    // -30/1*2 + -5/2*1 + 30 + 5
    assert_relative_eq!(swap_log_ratio(-30.0, 1.0, -5.0, 2.0), -27.5);
    assert_relative_eq!(swap_log_ratio(-5.0, 1.0, -30.0, 2.0), 10.0);
    assert_eq!(swapped_lliks(-30.0, 1.0, -5.0, 2.0), (-60.0, -2.5));
}

#[test]
fn accepted_swap_carries_rescaled_likelihoods() {
    assert_eq!(attempt_swap(-5.0, 1.0, -30.0, 2.0, -0.1), Some((-10.0, -15.0)));
    assert_eq!(attempt_swap(-30.0, 1.0, -5.0, 2.0, -1.0), None);
    // exp(-27.5) still accepts when the uniform draw is tiny enough.
    assert_eq!(attempt_swap(-30.0, 1.0, -5.0, 2.0, -30.0), Some((-60.0, -2.5)));
    assert_eq!(
        attempt_swap(f64::NEG_INFINITY, 1.0, f64::NEG_INFINITY, 2.0, f64::NEG_INFINITY),
        None
    );
}

#[test]
fn swap_pass_rescales_moved_chains_and_rounds_restore_them() {
    let mut config = RunConfig::default();
    config.ladder = LadderConfig::geometric(3, 1.5);
    config.max_coi = 3;
    config.seed_policy.master_seed = 77;
    let mut ensemble = Ensemble::new(small_data(), config).unwrap();

    for step in 0..40 {
        let hot_before = ensemble.hot_chain();
        ensemble.burnin(step).unwrap();
        let traced = *ensemble.traces().burnin.llik.last().unwrap();
        let (recomputed, _) = ensemble.chains()[hot_before].recompute_totals();
        assert_relative_eq!(traced, recomputed, epsilon = 1e-8, max_relative = 1e-10);

        let before: Vec<(f64, f64)> = ensemble
            .chains()
            .iter()
            .map(|chain| (chain.llik(), chain.temperature()))
            .collect();
        ensemble.swap_chains();
        for (chain, &(llik, temp)) in ensemble.chains().iter().zip(&before) {
            assert_relative_eq!(
                chain.llik() * temp,
                llik * chain.temperature(),
                epsilon = 1e-9,
                max_relative = 1e-12
            );
        }
    }
    assert_eq!(ensemble.num_swaps(), 80);
}

#[test]
fn nan_ratio_never_accepts() {
    let ratio = swap_log_ratio(f64::NEG_INFINITY, 1.0, f64::NEG_INFINITY, 2.0);
    assert!(ratio.is_nan());
    assert!(!metropolis_accept(ratio, f64::NEG_INFINITY));
    assert!(!metropolis_accept(f64::INFINITY, -1.0));
    assert!(metropolis_accept(0.0, -0.1));
    assert!(!metropolis_accept(-1.0, -0.5));
}

#[test]
fn degenerate_chains_keep_their_rungs() {
    // Two observed alleles, one strain allowed and no false positives.
    let data = GenotypingData::from_observations(vec![2], vec![vec![vec![1, 1]]]).unwrap();
    let mut config = RunConfig::default();
    config.max_coi = 1;
    config.priors.max_eps_pos = 0.0;
    config.ladder = LadderConfig::manual(vec![1.0, 2.0]);
    let context = Arc::new(ChainContext::new(data, &config, LikelihoodModel::default()));
    let cold = Chain::new(Arc::clone(&context), 1.0, 1).unwrap();
    let hot = Chain::new(context, 2.0, 2).unwrap();
    assert_eq!(cold.llik(), f64::NEG_INFINITY);
    assert_eq!(hot.llik(), f64::NEG_INFINITY);

    let mut ensemble = Ensemble::from_chains(vec![cold, hot], config).unwrap();
    for _ in 0..50 {
        ensemble.swap_chains();
    }
    assert_eq!(ensemble.ladder_order(), &[0, 1]);
    assert_eq!(ensemble.swap_acceptances(), &[0]);
    assert_eq!(ensemble.chains()[0].temperature(), 1.0);
    assert_eq!(ensemble.chains()[1].temperature(), 2.0);
    assert_eq!(ensemble.num_swaps(), 50);
    assert!(ensemble.hot_chain_trace().iter().all(|&id| id == 0));
}

#[test]
fn swap_counters_are_monotone_and_bounded() {
    let mut config = RunConfig::default();
    config.ladder = LadderConfig::geometric(4, 1.3);
    config.max_coi = 3;
    config.seed_policy.master_seed = 1234;
    let mut ensemble = Ensemble::new(small_data(), config).unwrap();

    let mut previous = ensemble.swap_acceptances().to_vec();
    for step in 0..30 {
        ensemble.burnin(step).unwrap();
        let current = ensemble.swap_acceptances().to_vec();
        assert!(current.iter().zip(&previous).all(|(now, before)| now >= before));
        assert!(current.iter().all(|&count| count <= ensemble.num_swaps()));
        previous = current;

        let hot = ensemble.hot_chain();
        assert_eq!(ensemble.chains()[hot].temperature(), 1.0);
        let mut order = ensemble.ladder_order().to_vec();
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3]);
        let temperatures: Vec<f64> = ensemble
            .ladder_order()
            .iter()
            .map(|&id| ensemble.chains()[id].temperature())
            .collect();
        assert!(temperatures.windows(2).all(|pair| pair[0] < pair[1]));
    }
    assert_eq!(ensemble.num_swaps(), 30);
    assert_eq!(ensemble.hot_chain_trace().len(), 30);
    assert!(ensemble
        .swap_acceptance_rates()
        .iter()
        .all(|&rate| (0.0..=1.0).contains(&rate)));
}

#[test]
fn ladder_validation_rejects_bad_ladders() {
    assert!(validate_ladder(&[1.0, 1.5, 2.0]).is_ok());
    let code = |ladder: &[f64]| validate_ladder(ladder).unwrap_err().info().code.clone();
    assert_eq!(code(&[]), "ladder-empty");
    assert_eq!(code(&[1.0, -2.0]), "ladder-non-positive");
    assert_eq!(code(&[1.0, f64::NAN]), "ladder-non-positive");
    assert_eq!(code(&[0.5, 2.0]), "ladder-missing-one");
    assert_eq!(code(&[0.5, 1.0]), "ladder-first-rung");
    assert_eq!(code(&[1.0, 3.0, 2.0]), "ladder-order");
    assert_eq!(code(&[1.0, 1.0]), "ladder-order");
}

#[test]
fn ladder_builder_checks_policy() {
    let ladder = build_ladder(&LadderConfig::geometric(3, 2.0)).unwrap();
    assert_eq!(ladder, vec![1.0, 2.0, 4.0]);

    let err = build_ladder(&LadderConfig::geometric(3, 1.0)).unwrap_err();
    assert_eq!(err.info().code, "ladder-ratio");

    let mut manual = LadderConfig::manual(vec![1.0, 1.7]);
    manual.replicas = Some(3);
    let err = build_ladder(&manual).unwrap_err();
    assert_eq!(err.info().code, "ladder-length");

    manual.replicas = None;
    assert_eq!(build_ladder(&manual).unwrap(), vec![1.0, 1.7]);
}

#[test]
fn from_chains_requires_a_cold_first_rung() {
    let config = RunConfig::default();
    let context = Arc::new(ChainContext::new(
        small_data(),
        &config,
        LikelihoodModel::default(),
    ));
    let chain = Chain::new(context, 2.0, 9).unwrap();
    let err = Ensemble::from_chains(vec![chain], config).unwrap_err();
    assert_eq!(err.info().code, "ladder-missing-one");
}
