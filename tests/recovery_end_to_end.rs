use ddm_recovery::{
    recover_mla, recover_pta, task_rng, Choice, ChoiceRts, GridIndex, ModelParameters,
    ParameterGrid, RayonPool, RecoveryConfig, SerialPool, TrialCondition, TrialSimulator,
};

fn left_only_condition() -> TrialCondition {
    TrialCondition::new(1.0, 0.0, 0.0, 0.0, 1.0)
}

fn mirrored_conditions() -> Vec<TrialCondition> {
    vec![
        left_only_condition(),
        TrialCondition::new(0.0, 1.0, 0.0, 0.0, 1.0),
    ]
}

#[test]
fn zero_drift_choices_are_balanced() {
    let params = ModelParameters::standard(0.0, 0.07);
    let simulator = TrialSimulator::default();
    let mut rng = task_rng(2024, 0);
    let trials = simulator
        .simulate_conditions(&params, &[left_only_condition()], 10_000, &mut rng)
        .unwrap();
    let rts: ChoiceRts = trials.iter().collect();
    let left = rts.left_fraction().unwrap();
    assert!((left - 0.5).abs() < 0.03, "left fraction {left}");
}

#[test]
fn positive_drift_favors_left_with_fast_responses() {
    let params = ModelParameters::standard(0.005, 0.07);
    let simulator = TrialSimulator::default();
    let mut rng = task_rng(77, 0);
    let trials = simulator
        .simulate_conditions(&params, &[left_only_condition()], 5_000, &mut rng)
        .unwrap();

    let left = trials.iter().filter(|t| t.choice == Choice::Left).count();
    assert!(left * 2 > trials.len(), "{left} left of {}", trials.len());

    let mut rts: Vec<u32> = trials.iter().map(|t| t.rt_ms).collect();
    rts.sort_unstable();
    let median = rts[rts.len() / 2];
    assert!(median < 3000, "median response time {median} ms");
    assert!(rts.iter().all(|rt| rt % 10 == 0 && *rt >= 10));
}

#[test]
fn posterior_updating_prefers_the_generating_model() {
    let true_model = ModelParameters::standard(0.01, 0.07);
    let grid = ParameterGrid::new(vec![0.001, 0.01], vec![0.07]).unwrap();
    let config = RecoveryConfig {
        trials_per_condition: 50,
        num_workers: 3,
        ..RecoveryConfig::default()
    };

    let serial = recover_pta(&true_model, &grid, &mirrored_conditions(), &config, &SerialPool)
        .unwrap();
    let pool = RayonPool::new(config.num_workers).unwrap();
    let parallel =
        recover_pta(&true_model, &grid, &mirrored_conditions(), &config, &pool).unwrap();

    assert_eq!(serial.posteriors, parallel.posteriors);
    assert_eq!(serial.likelihoods, parallel.likelihoods);

    let total: f64 = serial.posteriors.iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(serial.map_estimate(), GridIndex { d: 1, sigma: 0 });
}

#[test]
fn histogram_matching_prefers_the_generating_model() {
    let true_model = ModelParameters::standard(0.01, 0.07);
    let grid = ParameterGrid::new(vec![0.001, 0.01], vec![0.07]).unwrap();
    let config = RecoveryConfig {
        observed_trials_per_condition: 400,
        simulations_per_condition: 2_000,
        num_workers: 2,
        ..RecoveryConfig::default()
    };
    let pool = config.worker_pool().unwrap();

    let outcome = recover_mla(&true_model, &grid, &mirrored_conditions(), &config, &pool).unwrap();

    assert_eq!(outcome.best_fit(), GridIndex { d: 1, sigma: 0 });
    assert_eq!(outcome.bins.num_bins(), 80);
    for histograms in &outcome.observed_histograms {
        assert!(histograms.total() <= 400);
        assert!(histograms.total() > 350);
    }
}

#[test]
fn histogram_matching_true_model_is_not_beaten_by_its_neighbours() {
    let true_model = ModelParameters::standard(0.01, 0.07);
    let grid = ParameterGrid::new(vec![0.007, 0.01, 0.013], vec![0.06, 0.07, 0.08]).unwrap();
    let config = RecoveryConfig {
        observed_trials_per_condition: 1_000,
        simulations_per_condition: 10_000,
        num_workers: 4,
        seed: 31,
        ..RecoveryConfig::default()
    };
    let pool = config.worker_pool().unwrap();

    let outcome = recover_mla(&true_model, &grid, &mirrored_conditions(), &config, &pool).unwrap();

    // Sampling noise of one grid point's score is a few tens of nats here.
    let tolerance = 20.0;
    let truth = outcome.log_likelihood(GridIndex { d: 1, sigma: 1 });
    for index in grid.indices() {
        let score = outcome.log_likelihood(index);
        assert!(
            truth >= score - tolerance,
            "{:?} scored {score}, true model scored {truth}",
            grid.values(index)
        );
    }
}

#[test]
fn recovery_reads_its_settings_from_toml() {
    let config = RecoveryConfig::from_toml_str(
        r#"
        trials_per_condition = 5
        num_workers = 2
        seed = 99
        "#,
    )
    .unwrap();
    let true_model = ModelParameters::standard(0.005, 0.07);
    let grid = ParameterGrid::new(vec![0.005], vec![0.05, 0.07]).unwrap();
    let first =
        recover_pta(&true_model, &grid, &mirrored_conditions(), &config, &SerialPool).unwrap();
    let second =
        recover_pta(&true_model, &grid, &mirrored_conditions(), &config, &SerialPool).unwrap();
    assert_eq!(first.trials, second.trials);
    assert_eq!(first.trials.len(), 10);
}
