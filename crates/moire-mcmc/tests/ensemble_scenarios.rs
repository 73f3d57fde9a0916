use moire_core::{GenotypingData, MoireError};
use moire_mcmc::{run, Ensemble, LadderConfig, RunConfig, RunSummary};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn monomorphic_pair() -> GenotypingData {
    GenotypingData::from_observations(vec![2], vec![vec![vec![1, 0]], vec![vec![1, 0]]]).unwrap()
}

fn panel() -> GenotypingData {
    GenotypingData::from_observations(
        vec![3, 2, 4],
        vec![
            vec![vec![1, 0, 0], vec![0, 1], vec![1, 0, 0, 1]],
            vec![vec![1, 1, 0], vec![1, 1], vec![0, 0, 0, 0]],
            vec![vec![0, 0, 1], vec![1, 0], vec![0, 1, 0, 0]],
            vec![vec![1, 0, 0], vec![1, 0], vec![0, 1, 1, 0]],
        ],
    )
    .unwrap()
}

#[test]
fn shared_allele_dominates_posterior_frequency() {
    init_logging();
    let mut config = RunConfig::default();
    config.burnin = 200;
    config.samples = 1000;
    config.max_coi = 4;
    config.priors.max_eps_pos = 0.1;
    config.priors.max_eps_neg = 0.1;
    config.seed_policy.master_seed = 2024;

    let summary = run(monomorphic_pair(), config).unwrap();
    assert_eq!(summary.num_draws, 1000);
    let mean_p = summary.mean_allele_freqs[0][0];
    assert!(mean_p > 0.5, "posterior mean {mean_p}");
}

#[test]
fn impossible_data_fails_initialisation() {
    init_logging();
    let data = GenotypingData::from_observations(vec![2], vec![vec![vec![1, 1]]]).unwrap();
    let mut config = RunConfig::default();
    config.ladder = LadderConfig::manual(vec![1.0]);
    config.max_coi = 1;
    config.priors.max_eps_pos = 0.0;
    config.max_init_attempts = 5;

    let err = Ensemble::new(data, config).unwrap_err();
    match err {
        MoireError::DegenerateInit(info) => {
            assert_eq!(info.code, "degenerate-init");
            assert_eq!(info.context.get("attempts").map(String::as_str), Some("5"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn thinning_keeps_every_other_draw() {
    init_logging();
    let mut config = RunConfig::default();
    config.burnin = 5;
    config.samples = 7;
    config.thin = 2;
    config.max_coi = 4;
    config.ladder = LadderConfig::geometric(3, 2.0);

    let mut ensemble = Ensemble::new(panel(), config).unwrap();
    let summary = ensemble.run_all().unwrap();
    let draws = ensemble.draws();
    assert_eq!(draws.len(), 4);
    assert_eq!(summary.num_draws, 4);
    assert!(draws.coi.iter().all(|per_sample| per_sample.len() == 4));
    assert!(draws.eps_pos.iter().all(|per_sample| per_sample.len() == 4));
    assert!(draws.eps_neg.iter().all(|per_sample| per_sample.len() == 4));
    assert!(draws.relatedness.iter().all(|per_sample| per_sample.len() == 4));
    assert!(draws.allele_freqs.iter().all(|per_locus| per_locus.len() == 4));
    assert_eq!(ensemble.traces().burnin.len(), 5);
    assert_eq!(ensemble.traces().sampling.len(), 7);
    assert_eq!(ensemble.num_swaps(), 12);
}

#[test]
fn zero_thin_records_every_step() {
    let mut config = RunConfig::default();
    config.burnin = 2;
    config.samples = 6;
    config.thin = 0;
    let mut ensemble = Ensemble::new(panel(), config).unwrap();
    ensemble.run_all().unwrap();
    assert_eq!(ensemble.draws().len(), 6);
}

#[test]
fn fixed_seed_reproduces_run_across_thread_counts() {
    let mut config = RunConfig::default();
    config.burnin = 10;
    config.samples = 20;
    config.allow_relatedness = true;
    config.ladder = LadderConfig::geometric(3, 1.6);
    config.seed_policy.master_seed = 77;

    let mut single = config.clone();
    single.threads = Some(1);
    let mut parallel = config.clone();
    parallel.threads = Some(3);

    let first = run(panel(), single).unwrap();
    let second = run(panel(), parallel).unwrap();
    assert_eq!(first.traces, second.traces);
    assert_eq!(first.mean_allele_freqs, second.mean_allele_freqs);
    assert_eq!(first.hot_chain_trace, second.hot_chain_trace);
    assert_eq!(first.acceptance_rates, second.acceptance_rates);

    let mut other = config;
    other.seed_policy.master_seed = 78;
    let third = run(panel(), other).unwrap();
    assert_ne!(first.traces, third.traces);
}

#[test]
fn summary_roundtrips_through_json() {
    let mut config = RunConfig::default();
    config.burnin = 3;
    config.samples = 5;
    config.seed_policy.label = Some("smoke".to_string());
    let summary = run(panel(), config).unwrap();
    assert_eq!(summary.seed_label.as_deref(), Some("smoke"));
    assert!(summary.acceptance_rates.contains_key("coi"));
    assert!(summary.acceptance_rates.contains_key("latent"));
    assert!(!summary.acceptance_rates.contains_key("relatedness"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("summary.json");
    summary.write_json(&path).unwrap();
    let loaded = RunSummary::load(&path).unwrap();
    assert_eq!(loaded.num_draws, summary.num_draws);
    assert_eq!(loaded.hot_chain_trace, summary.hot_chain_trace);
    assert_eq!(loaded.config, summary.config);
}

#[test]
fn hot_accessors_follow_ladder_position() {
    let mut config = RunConfig::default();
    config.ladder = LadderConfig::geometric(3, 1.2);
    let mut ensemble = Ensemble::new(panel(), config).unwrap();
    for step in 0..15 {
        ensemble.burnin(step).unwrap();
        let hot = &ensemble.chains()[ensemble.hot_chain()];
        assert_eq!(ensemble.llik(), hot.llik());
        assert_eq!(ensemble.prior(), hot.prior());
        assert_eq!(ensemble.posterior(), hot.llik() + hot.prior());
    }
}
