//! Parameter recovery by grid search over (d, sigma).
//!
//! Two strategies share the same inputs: a true model that generates the
//! synthetic "observed" data, a [`ParameterGrid`], the ordered trial
//! conditions, a [`RecoveryConfig`] and a caller-owned [`WorkerPool`].
//!
//! - [`recover_pta`] scores every synthetic trial under every grid model with
//!   the likelihood engine and updates a posterior trial by trial.
//! - [`recover_mla`] compares choice-conditioned response-time histograms of
//!   each grid model's simulations with the observed histograms.
//!
//! Any error aborts the run; results computed for other grid points are
//! dropped.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RecoveryConfig;
use crate::error::{DdmError, DdmResult};
use crate::grid::{GridIndex, ParameterGrid};
use crate::histogram::{self, ConditionHistograms, HistogramBins};
use crate::likelihood::LikelihoodEngine;
use crate::params::ModelParameters;
use crate::pool::{task_rng, WorkerPool};
use crate::sim::TrialSimulator;
use crate::trial::{ChoiceRts, Trial, TrialCondition};

/// RNG stream reserved for the true-model data; grid point `i` uses `i + 1`.
const OBSERVED_STREAM: u64 = 0;

/// One grid point to score.
#[derive(Debug, Clone, Copy)]
pub struct GridJob {
    pub index: GridIndex,
    pub params: ModelParameters,
    pub stream: u64,
}

fn grid_jobs(grid: &ParameterGrid, true_model: &ModelParameters) -> Vec<GridJob> {
    grid.indices()
        .zip(grid.models(true_model))
        .enumerate()
        .map(|(flat, (index, params))| GridJob {
            index,
            params,
            stream: OBSERVED_STREAM + 1 + flat as u64,
        })
        .collect()
}

/// Likelihood of every trial under `params`, in trial order.
pub fn batch_likelihoods<P: WorkerPool>(
    pool: &P,
    engine: &LikelihoodEngine,
    params: &ModelParameters,
    trials: &[Trial],
) -> DdmResult<Vec<f64>> {
    pool.map(trials, |_, trial| engine.likelihood(params, trial))
}

/// Log-likelihood of the observed histograms under `params`, estimated from
/// `num_simulations` simulated trials per condition.
pub fn model_log_likelihood<R: Rng + ?Sized>(
    simulator: &TrialSimulator,
    params: &ModelParameters,
    conditions: &[TrialCondition],
    num_simulations: usize,
    bins: &HistogramBins,
    observed: &[ConditionHistograms],
    rng: &mut R,
) -> DdmResult<f64> {
    let simulated = simulator.simulate_choice_rts(params, conditions, num_simulations, rng)?;
    histogram::log_likelihood(&simulated, observed, bins)
}

/// Bayes update of `posteriors` with one trial's likelihood under each model.
///
/// Returns `Ok(false)` and leaves the posteriors untouched when the evidence
/// `sum(likelihood * posterior)` is exactly zero.
pub fn update_posteriors(posteriors: &mut [f64], likelihoods: &[f64]) -> DdmResult<bool> {
    if likelihoods.len() != posteriors.len() {
        return Err(DdmError::LengthMismatch {
            context: "posterior models",
            expected: posteriors.len(),
            got: likelihoods.len(),
        });
    }
    let denominator: f64 = posteriors
        .iter()
        .zip(likelihoods)
        .map(|(prior, likelihood)| prior * likelihood)
        .sum();
    if denominator == 0.0 {
        return Ok(false);
    }
    for (posterior, likelihood) in posteriors.iter_mut().zip(likelihoods) {
        *posterior = likelihood * *posterior / denominator;
    }
    Ok(true)
}

/// Posterior over models after updating a uniform prior with every trial in
/// order. `likelihoods` is indexed `[model][trial]`.
///
/// Returns the posterior and the number of trials skipped for a zero
/// denominator. Every row must hold exactly `num_trials` values.
pub fn sequential_posteriors(
    likelihoods: &[Vec<f64>],
    num_trials: usize,
) -> DdmResult<(Vec<f64>, usize)> {
    if let Some(row) = likelihoods.iter().find(|row| row.len() != num_trials) {
        return Err(DdmError::LengthMismatch {
            context: "trial likelihoods",
            expected: num_trials,
            got: row.len(),
        });
    }

    let num_models = likelihoods.len();
    let mut posteriors = vec![1.0 / num_models as f64; num_models];
    let mut column = vec![0.0; num_models];
    let mut skipped = 0;
    for trial in 0..num_trials {
        for (value, row) in column.iter_mut().zip(likelihoods) {
            *value = row[trial];
        }
        if !update_posteriors(&mut posteriors, &column)? {
            debug!(trial, "zero evidence, posterior left unchanged");
            skipped += 1;
        }
    }
    Ok((posteriors, skipped))
}

#[derive(Debug, Clone, Serialize)]
pub struct PtaOutcome {
    pub true_model: ModelParameters,
    pub grid: ParameterGrid,
    /// Candidate model per grid point, in enumeration order.
    pub models: Vec<ModelParameters>,
    pub trials: Vec<Trial>,
    /// `[grid point][trial]`
    pub likelihoods: Vec<Vec<f64>>,
    pub posteriors: Vec<f64>,
    pub skipped_trials: usize,
}

impl PtaOutcome {
    pub fn posterior(&self, index: GridIndex) -> f64 {
        self.posteriors[self.grid.flat(index)]
    }

    /// Grid point with the highest posterior; the first one wins ties.
    pub fn map_estimate(&self) -> GridIndex {
        self.grid.index(argmax(&self.posteriors))
    }
}

/// Recover (d, sigma) by trial-by-trial posterior updating.
pub fn recover_pta<P: WorkerPool>(
    true_model: &ModelParameters,
    grid: &ParameterGrid,
    conditions: &[TrialCondition],
    config: &RecoveryConfig,
    pool: &P,
) -> DdmResult<PtaOutcome> {
    config.validate()?;
    let simulator = config.simulator()?;
    let engine = config.likelihood_engine()?;

    let mut rng = task_rng(config.seed, OBSERVED_STREAM);
    let trials = simulator.simulate_conditions(
        true_model,
        conditions,
        config.trials_per_condition,
        &mut rng,
    )?;
    info!(
        model = %true_model.key(),
        trials = trials.len(),
        grid_points = grid.len(),
        workers = pool.workers(),
        "generated artificial data for posterior updating"
    );

    let models = grid.models(true_model);
    let mut likelihoods = Vec::with_capacity(models.len());
    for model in &models {
        debug!(model = %model.key(), "computing likelihoods");
        let values = batch_likelihoods(pool, &engine, model, &trials).map_err(|err| {
            warn!(model = %model.key(), error = %err, "likelihood computation failed");
            err.in_model(model.key())
        })?;
        likelihoods.push(values);
    }

    let (posteriors, skipped_trials) = sequential_posteriors(&likelihoods, trials.len())?;
    info!(
        posterior_sum = posteriors.iter().sum::<f64>(),
        skipped_trials,
        "posterior updating finished"
    );

    Ok(PtaOutcome {
        true_model: *true_model,
        grid: grid.clone(),
        models,
        trials,
        likelihoods,
        posteriors,
        skipped_trials,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct MlaOutcome {
    pub true_model: ModelParameters,
    pub grid: ParameterGrid,
    pub models: Vec<ModelParameters>,
    pub bins: HistogramBins,
    /// Observed response times per condition, split by choice.
    pub observed_rts: Vec<ChoiceRts>,
    pub observed_histograms: Vec<ConditionHistograms>,
    /// One value per grid point, in enumeration order.
    pub log_likelihoods: Vec<f64>,
}

impl MlaOutcome {
    pub fn log_likelihood(&self, index: GridIndex) -> f64 {
        self.log_likelihoods[self.grid.flat(index)]
    }

    /// Grid point with the highest log-likelihood; the first one wins ties.
    pub fn best_fit(&self) -> GridIndex {
        self.grid.index(argmax(&self.log_likelihoods))
    }
}

/// Recover (d, sigma) by maximizing the histogram log-likelihood.
pub fn recover_mla<P: WorkerPool>(
    true_model: &ModelParameters,
    grid: &ParameterGrid,
    conditions: &[TrialCondition],
    config: &RecoveryConfig,
    pool: &P,
) -> DdmResult<MlaOutcome> {
    config.validate()?;
    let simulator = config.simulator()?;
    let bins = config.histogram_bins()?;

    let mut rng = task_rng(config.seed, OBSERVED_STREAM);
    let observed_rts = simulator.simulate_choice_rts(
        true_model,
        conditions,
        config.observed_trials_per_condition,
        &mut rng,
    )?;
    let observed_histograms: Vec<ConditionHistograms> = observed_rts
        .iter()
        .map(|rts| ConditionHistograms::from_rts(&bins, rts))
        .collect();

    info!(
        model = %true_model.key(),
        conditions = conditions.len(),
        grid_points = grid.len(),
        workers = pool.workers(),
        "performing grid search over the model parameters"
    );

    let jobs = grid_jobs(grid, true_model);
    let log_likelihoods = pool.map(&jobs, |_, job| {
        let mut rng = task_rng(config.seed, job.stream);
        let value = model_log_likelihood(
            &simulator,
            &job.params,
            conditions,
            config.simulations_per_condition,
            &bins,
            &observed_histograms,
            &mut rng,
        )
        .map_err(|err| {
            warn!(model = %job.params.key(), error = %err, "log-likelihood computation failed");
            err.in_model(job.params.key())
        })?;
        debug!(model = %job.params.key(), log_likelihood = value, "scored grid point");
        Ok(value)
    })?;

    let outcome = MlaOutcome {
        true_model: *true_model,
        grid: grid.clone(),
        models: jobs.iter().map(|job| job.params).collect(),
        bins,
        observed_rts,
        observed_histograms,
        log_likelihoods,
    };
    let best = outcome.best_fit();
    info!(best_fit = ?grid.values(best), "grid search finished");
    Ok(outcome)
}

/// Index of the largest value; earlier indices win ties.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (idx, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = idx;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SerialPool;
    use crate::trial::Choice;
    use approx::assert_relative_eq;

    fn small_config() -> RecoveryConfig {
        RecoveryConfig {
            trials_per_condition: 20,
            observed_trials_per_condition: 40,
            simulations_per_condition: 40,
            num_workers: 2,
            ..RecoveryConfig::default()
        }
    }

    fn conditions() -> Vec<TrialCondition> {
        vec![
            TrialCondition::new(1.0, 0.0, 0.0, 0.0, 1.0),
            TrialCondition::new(0.0, 2.0, 1.0, 0.0, 0.5),
        ]
    }

    #[test]
    fn bayes_update_normalizes() {
        let mut posteriors = vec![0.25; 4];
        assert!(update_posteriors(&mut posteriors, &[0.1, 0.2, 0.3, 0.4]).unwrap());
        assert_relative_eq!(posteriors.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(posteriors[3], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn zero_evidence_skips_the_update() {
        let mut posteriors = vec![0.5, 0.5];
        assert!(!update_posteriors(&mut posteriors, &[0.0, 0.0]).unwrap());
        assert_eq!(posteriors, vec![0.5, 0.5]);
    }

    #[test]
    fn sequential_posteriors_stay_uniform_without_evidence() {
        let likelihoods = vec![vec![0.0, 0.0], vec![0.0, 0.0], vec![0.0, 0.0]];
        let (posteriors, skipped) = sequential_posteriors(&likelihoods, 2).unwrap();
        assert_eq!(skipped, 2);
        for p in posteriors {
            assert_relative_eq!(p, 1.0 / 3.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn sequential_posteriors_skip_only_empty_trials() {
        let likelihoods = vec![vec![0.2, 0.0, 0.5], vec![0.1, 0.0, 0.5]];
        let (posteriors, skipped) = sequential_posteriors(&likelihoods, 3).unwrap();
        assert_eq!(skipped, 1);
        assert_relative_eq!(posteriors[0], 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(posteriors.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn mismatched_likelihood_shapes_are_reported() {
        let mut posteriors = vec![0.5, 0.5];
        let err = update_posteriors(&mut posteriors, &[0.2, 0.3, 0.4]).unwrap_err();
        assert!(matches!(
            err,
            DdmError::LengthMismatch {
                expected: 2,
                got: 3,
                ..
            }
        ));
        assert_eq!(posteriors, vec![0.5, 0.5]);

        let ragged = vec![vec![0.2, 0.1], vec![0.3]];
        let err = sequential_posteriors(&ragged, 2).unwrap_err();
        assert!(matches!(
            err,
            DdmError::LengthMismatch {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), 1);
        assert_eq!(argmax(&[-5.0]), 0);
    }

    #[test]
    fn batch_likelihoods_match_single_calls() {
        let params = ModelParameters::standard(0.005, 0.07);
        let engine = LikelihoodEngine::default();
        let condition = conditions()[0];
        let trials = vec![
            Trial::new(400, Choice::Left, condition),
            Trial::new(900, Choice::Right, condition),
        ];
        let batch = batch_likelihoods(&SerialPool, &engine, &params, &trials).unwrap();
        for (trial, value) in trials.iter().zip(batch) {
            assert_eq!(value, engine.likelihood(&params, trial).unwrap());
        }
    }

    #[test]
    fn degenerate_trial_aborts_with_model_context() {
        let params = ModelParameters::standard(0.005, 0.07);
        let trials = vec![Trial::new(5, Choice::Left, conditions()[0])];
        let err = batch_likelihoods(&SerialPool, &LikelihoodEngine::default(), &params, &trials)
            .map_err(|err| err.in_model(params.key()))
            .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            DdmError::DegenerateTrial { .. }
        ));
    }

    #[test]
    fn pta_aborts_on_trials_shorter_than_one_step() {
        // Starting below the lower barrier ends every trial at 0 ms.
        let true_model = ModelParameters::new(0.005, 0.07, 1.0, 1.0, 1.0, 0, -1.5).unwrap();
        let grid = ParameterGrid::new(vec![0.005], vec![0.07]).unwrap();
        let err =
            recover_pta(&true_model, &grid, &conditions(), &small_config(), &SerialPool).unwrap_err();
        match err {
            DdmError::ModelContext { model, source } => {
                assert_eq!(model, true_model.key());
                assert!(matches!(
                    *source,
                    DdmError::DegenerateTrial {
                        rt_ms: 0,
                        time_step_ms: 10
                    }
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pta_outcome_is_normalized_and_shaped() {
        let true_model = ModelParameters::standard(0.005, 0.07);
        let grid = ParameterGrid::new(vec![0.003, 0.005], vec![0.07]).unwrap();
        let outcome =
            recover_pta(&true_model, &grid, &conditions(), &small_config(), &SerialPool).unwrap();
        assert_eq!(outcome.trials.len(), 40);
        assert_eq!(outcome.likelihoods.len(), 2);
        assert!(outcome.likelihoods.iter().all(|row| row.len() == 40));
        assert_relative_eq!(outcome.posteriors.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_eq!(outcome.models[1].key(), true_model.key());
    }

    #[test]
    fn mla_is_independent_of_pool_size() {
        let true_model = ModelParameters::standard(0.005, 0.07);
        let grid = ParameterGrid::new(vec![0.003, 0.005, 0.008], vec![0.05, 0.07]).unwrap();
        let config = small_config();
        let serial = recover_mla(&true_model, &grid, &conditions(), &config, &SerialPool).unwrap();
        let parallel = recover_mla(
            &true_model,
            &grid,
            &conditions(),
            &config,
            &config.worker_pool().unwrap(),
        )
        .unwrap();
        assert_eq!(serial.log_likelihoods, parallel.log_likelihoods);
        assert_eq!(serial.log_likelihoods.len(), 6);
        assert_eq!(serial.observed_histograms.len(), 2);
        assert_eq!(serial.observed_rts[0].len(), 40);
        assert!(serial.log_likelihoods.iter().all(|ll| *ll <= 0.0));
    }

    #[test]
    fn mla_propagates_simulation_failures() {
        let true_model = ModelParameters::standard(0.005, 0.07);
        let grid = ParameterGrid::new(vec![0.005], vec![0.07, -0.07]).unwrap();
        let err =
            recover_mla(&true_model, &grid, &conditions(), &small_config(), &SerialPool).unwrap_err();
        match err {
            DdmError::ModelContext { model, source } => {
                assert_eq!(model.sigma, -0.07);
                assert!(matches!(*source, DdmError::TrialContext { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
