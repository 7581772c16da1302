use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

use crate::error::{DdmError, DdmResult};
use crate::histogram::HistogramBins;
use crate::likelihood::{LikelihoodEngine, DEFAULT_APPROX_STATE_STEP};
use crate::pool::RayonPool;
use crate::sim::{TrialSimulator, DEFAULT_TIME_STEP_MS};

pub const DEFAULT_TRIALS_PER_CONDITION: usize = 800;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    #[serde_as(as = "DefaultOnNull")]
    pub time_step_ms: u32,
    #[serde_as(as = "DefaultOnNull")]
    pub approx_state_step: f64,
    #[serde_as(as = "DefaultOnNull")]
    pub barrier_decay: f64,
    /// Synthetic trials per condition for posterior updating.
    #[serde_as(as = "DefaultOnNull")]
    pub trials_per_condition: usize,
    /// Synthetic "observed" trials per condition for histogram matching.
    #[serde_as(as = "DefaultOnNull")]
    pub observed_trials_per_condition: usize,
    /// Trials simulated per condition for every candidate model.
    #[serde_as(as = "DefaultOnNull")]
    pub simulations_per_condition: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub bin_step_ms: u32,
    #[serde_as(as = "DefaultOnNull")]
    pub max_rt_ms: u32,
    #[serde_as(as = "DefaultOnNull")]
    pub num_workers: usize,
    #[serde_as(as = "DefaultOnNull")]
    pub seed: u64,
    pub max_decision_steps: Option<u64>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            time_step_ms: DEFAULT_TIME_STEP_MS,
            approx_state_step: DEFAULT_APPROX_STATE_STEP,
            barrier_decay: 0.0,
            trials_per_condition: DEFAULT_TRIALS_PER_CONDITION,
            observed_trials_per_condition: 10,
            simulations_per_condition: 10,
            bin_step_ms: 100,
            max_rt_ms: 8000,
            num_workers: 9,
            seed: 0xDD_2026_0001_u64,
            max_decision_steps: None,
        }
    }
}

impl RecoveryConfig {
    pub fn from_toml_str(raw: &str) -> DdmResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DdmResult<()> {
        if self.time_step_ms == 0 {
            return Err(DdmError::Configuration(
                "time_step_ms must be greater than zero".to_string(),
            ));
        }

        if !self.approx_state_step.is_finite() || self.approx_state_step <= 0.0 {
            return Err(DdmError::Configuration(
                "approx_state_step must be finite and greater than zero".to_string(),
            ));
        }

        if !self.barrier_decay.is_finite() || self.barrier_decay < 0.0 {
            return Err(DdmError::Configuration(
                "barrier_decay must be finite and non-negative".to_string(),
            ));
        }

        if self.trials_per_condition == 0
            || self.observed_trials_per_condition == 0
            || self.simulations_per_condition == 0
        {
            return Err(DdmError::Configuration(
                "trial counts per condition must be greater than zero".to_string(),
            ));
        }

        if self.bin_step_ms == 0 {
            return Err(DdmError::Configuration(
                "bin_step_ms must be greater than zero".to_string(),
            ));
        }

        if self.max_rt_ms < self.bin_step_ms {
            return Err(DdmError::Configuration(
                "max_rt_ms must be at least one bin step".to_string(),
            ));
        }

        if self.num_workers == 0 {
            return Err(DdmError::Configuration(
                "num_workers must be greater than zero".to_string(),
            ));
        }

        if self.max_decision_steps == Some(0) {
            return Err(DdmError::Configuration(
                "max_decision_steps must be greater than zero when set".to_string(),
            ));
        }

        Ok(())
    }

    pub fn simulator(&self) -> DdmResult<TrialSimulator> {
        Ok(TrialSimulator::new(self.time_step_ms)?.with_max_steps(self.max_decision_steps))
    }

    pub fn likelihood_engine(&self) -> DdmResult<LikelihoodEngine> {
        LikelihoodEngine::new(self.time_step_ms, self.approx_state_step)?
            .with_barrier_decay(self.barrier_decay)
    }

    pub fn histogram_bins(&self) -> DdmResult<HistogramBins> {
        HistogramBins::uniform(self.bin_step_ms, self.max_rt_ms)
    }

    pub fn worker_pool(&self) -> DdmResult<RayonPool> {
        RayonPool::new(self.num_workers)
    }
}
