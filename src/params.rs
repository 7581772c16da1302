//! DDM parameters
//!
//! Immutable description of one drift-diffusion model instance.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DdmError, DdmResult};
use crate::trial::TrialCondition;

/// Bookkeeping identity of a model: the `(d, sigma, delta, gamma)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelKey {
    pub d: f64,
    pub sigma: f64,
    pub delta: f64,
    pub gamma: f64,
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.d, self.sigma, self.delta, self.gamma
        )
    }
}

/// Parameters of a drift-diffusion model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelParameters {
    /// Drift scale
    d: f64,
    /// Standard deviation of each RDV increment
    sigma: f64,
    /// Probability-weighting strength
    delta: f64,
    /// Probability-weighting curvature
    gamma: f64,
    /// Magnitude of the symmetric absorbing barriers
    barrier: f64,
    /// Milliseconds of drift-free accumulation at trial start
    non_decision_time_ms: u32,
    /// Starting value of the RDV
    bias: f64,
}

impl ModelParameters {
    /// Create validated model parameters.
    ///
    /// Only the barrier and bias are checked: `barrier` must be positive and
    /// `bias` strictly below it. The remaining fields are taken as given.
    ///
    /// # Errors
    /// [`DdmError::Configuration`] when either check fails.
    pub fn new(
        d: f64,
        sigma: f64,
        delta: f64,
        gamma: f64,
        barrier: f64,
        non_decision_time_ms: u32,
        bias: f64,
    ) -> DdmResult<Self> {
        if barrier.is_nan() || barrier <= 0.0 {
            return Err(DdmError::Configuration(format!(
                "barrier must be larger than zero, got {barrier}"
            )));
        }
        if bias.is_nan() || bias >= barrier {
            return Err(DdmError::Configuration(format!(
                "bias must be smaller than barrier, got bias {bias} with barrier {barrier}"
            )));
        }

        Ok(Self {
            d,
            sigma,
            delta,
            gamma,
            barrier,
            non_decision_time_ms,
            bias,
        })
    }

    /// Model with the given drift and noise and the standard remaining fields:
    /// no distortion (`delta = gamma = 1`), unit barrier, no non-decision time
    /// and no bias.
    pub fn standard(d: f64, sigma: f64) -> Self {
        Self {
            d,
            sigma,
            delta: 1.0,
            gamma: 1.0,
            barrier: 1.0,
            non_decision_time_ms: 0,
            bias: 0.0,
        }
    }

    /// Same model with another drift scale and noise.
    pub fn with_drift_noise(&self, d: f64, sigma: f64) -> Self {
        Self { d, sigma, ..*self }
    }

    pub fn d(&self) -> f64 {
        self.d
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn barrier(&self) -> f64 {
        self.barrier
    }

    pub fn non_decision_time_ms(&self) -> u32 {
        self.non_decision_time_ms
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn key(&self) -> ModelKey {
        ModelKey {
            d: self.d,
            sigma: self.sigma,
            delta: self.delta,
            gamma: self.gamma,
        }
    }

    /// Number of whole time steps covered by the non-decision window.
    ///
    /// Truncating integer division; both the simulator and the likelihood
    /// engine gate the drift on this same count.
    pub fn non_decision_steps(&self, time_step_ms: u32) -> u32 {
        self.non_decision_time_ms / time_step_ms
    }

    /// Prospect-theory weighting of the fractal-draw probability:
    /// `exp(-delta * (-ln p)^gamma)`, with `p = 0` and `p = 1` passed through.
    pub fn distorted_probability(&self, p: f64) -> f64 {
        if p == 0.0 || p == 1.0 {
            return p;
        }
        (-self.delta * (-p.ln()).powf(self.gamma)).exp()
    }

    /// Drift of the RDV for one trial condition, positive towards the left item.
    pub fn drift(&self, condition: &TrialCondition) -> f64 {
        let distorted = self.distorted_probability(condition.prob_fractal_draw);
        let left_fractal_advantage = distorted * (condition.qv_left - condition.qv_right);
        let left_lottery_advantage =
            (1.0 - condition.prob_fractal_draw) * (condition.ev_left - condition.ev_right);
        self.d * (left_fractal_advantage + left_lottery_advantage)
    }
}
