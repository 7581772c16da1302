//! Trial simulation
//!
//! Generates synthetic trials by running the relative decision variable (RDV)
//! as a discrete-time Gaussian random walk until it hits one of the barriers.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::warn;

use crate::error::{DdmError, DdmResult};
use crate::params::ModelParameters;
use crate::trial::{Choice, ChoiceRts, Trial, TrialCondition};

pub const DEFAULT_TIME_STEP_MS: u32 = 10;

/// Random-walk trial simulator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialSimulator {
    /// Milliseconds per RDV increment
    time_step_ms: u32,
    /// Optional cap on the number of increments per trial. `None` lets the
    /// walk run until it exits.
    max_steps: Option<u64>,
}

impl Default for TrialSimulator {
    fn default() -> Self {
        Self {
            time_step_ms: DEFAULT_TIME_STEP_MS,
            max_steps: None,
        }
    }
}

impl TrialSimulator {
    pub fn new(time_step_ms: u32) -> DdmResult<Self> {
        if time_step_ms == 0 {
            return Err(DdmError::Configuration(
                "time_step_ms must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            time_step_ms,
            max_steps: None,
        })
    }

    pub fn with_max_steps(self, max_steps: Option<u64>) -> Self {
        Self { max_steps, ..self }
    }

    pub fn time_step_ms(&self) -> u32 {
        self.time_step_ms
    }

    pub fn max_steps(&self) -> Option<u64> {
        self.max_steps
    }

    /// Simulate one trial for `condition` under `params`.
    ///
    /// # Errors
    /// [`DdmError::Simulation`] if the noise is not a valid standard
    /// deviation, the RDV stops being finite, the step cap is reached or the
    /// response time does not fit in `u32` milliseconds.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        params: &ModelParameters,
        condition: &TrialCondition,
        rng: &mut R,
    ) -> DdmResult<Trial> {
        let barrier = params.barrier();
        let sigma = params.sigma();
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(DdmError::simulation(format!(
                "noise sigma must be finite and non-negative, got {sigma}"
            )));
        }

        let mu = params.drift(condition);
        let decision_noise = Normal::new(mu, sigma)
            .map_err(|err| DdmError::simulation(format!("invalid increment distribution: {err}")))?;
        let non_decision_noise = Normal::new(0.0, sigma)
            .map_err(|err| DdmError::simulation(format!("invalid increment distribution: {err}")))?;
        let non_decision_steps = params.non_decision_steps(self.time_step_ms);

        let mut rdv = params.bias();
        let mut steps: u64 = 0;
        let mut elapsed_non_decision = 0u32;

        while rdv < barrier && rdv > -barrier {
            if self.max_steps.is_some_and(|cap| steps >= cap) {
                return Err(DdmError::simulation(format!(
                    "no barrier reached within {steps} steps"
                )));
            }

            let increment = if elapsed_non_decision < non_decision_steps {
                elapsed_non_decision += 1;
                non_decision_noise.sample(rng)
            } else {
                decision_noise.sample(rng)
            };
            rdv += increment;
            steps += 1;

            if !rdv.is_finite() {
                return Err(DdmError::simulation(format!(
                    "decision variable became {rdv} after {steps} steps"
                )));
            }
        }

        // NOTE: the upper barrier is reported as a LEFT choice (-1). This is
        // the reverse of the usual DDM convention and is kept on purpose so
        // that simulated data stay compatible with `LikelihoodEngine`, which
        // reads left choices off the upper-crossing mass.
        let choice = if rdv >= barrier {
            Choice::Left
        } else {
            Choice::Right
        };

        let rt_ms = steps
            .checked_mul(u64::from(self.time_step_ms))
            .and_then(|rt| u32::try_from(rt).ok())
            .ok_or_else(|| {
                DdmError::simulation(format!("response time of {steps} steps overflows u32 ms"))
            })?;

        Ok(Trial::new(rt_ms, choice, *condition))
    }

    /// Simulate `per_condition` trials for every condition, condition by
    /// condition, in input order.
    ///
    /// Failures carry the trial index, condition index and model key.
    pub fn simulate_conditions<R: Rng + ?Sized>(
        &self,
        params: &ModelParameters,
        conditions: &[TrialCondition],
        per_condition: usize,
        rng: &mut R,
    ) -> DdmResult<Vec<Trial>> {
        let mut trials = Vec::with_capacity(conditions.len() * per_condition);
        for (condition_idx, condition) in conditions.iter().enumerate() {
            for trial_idx in 0..per_condition {
                let trial = self
                    .simulate(params, condition, rng)
                    .map_err(|err| self.contextualize(err, trial_idx, condition_idx, params))?;
                trials.push(trial);
            }
        }
        Ok(trials)
    }

    /// Like [`Self::simulate_conditions`] but keeps only the response times,
    /// split by choice, one entry per condition.
    pub fn simulate_choice_rts<R: Rng + ?Sized>(
        &self,
        params: &ModelParameters,
        conditions: &[TrialCondition],
        per_condition: usize,
        rng: &mut R,
    ) -> DdmResult<Vec<ChoiceRts>> {
        conditions
            .iter()
            .enumerate()
            .map(|(condition_idx, condition)| {
                let mut rts = ChoiceRts::default();
                for trial_idx in 0..per_condition {
                    let trial = self
                        .simulate(params, condition, rng)
                        .map_err(|err| self.contextualize(err, trial_idx, condition_idx, params))?;
                    rts.push(&trial);
                }
                Ok(rts)
            })
            .collect()
    }

    fn contextualize(
        &self,
        err: DdmError,
        trial_idx: usize,
        condition_idx: usize,
        params: &ModelParameters,
    ) -> DdmError {
        warn!(
            trial = trial_idx,
            condition = condition_idx,
            model = %params.key(),
            error = %err,
            "failed to generate artificial trial"
        );
        err.in_trial(trial_idx, condition_idx, params.key())
    }
}
