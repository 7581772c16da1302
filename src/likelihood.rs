//! Trial likelihoods by forward propagation of the RDV density
//!
//! The RDV axis between the barriers is divided into a symmetric grid of
//! states. Starting from all probability at the state nearest the bias, the
//! mass vector is pushed forward one time step at a time through a Gaussian
//! transition kernel while the mass that leaves through either barrier is
//! accumulated separately. This is an explicit forward solution of the
//! Fokker-Planck equation with absorbing boundaries.

use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use crate::error::{DdmError, DdmResult};
use crate::params::ModelParameters;
use crate::sim::DEFAULT_TIME_STEP_MS;
use crate::trial::{Choice, Trial};

pub const DEFAULT_APPROX_STATE_STEP: f64 = 0.1;

/// Discretized RDV levels strictly inside `(-barrier, barrier)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StateGrid {
    step: f64,
    states: Vec<f64>,
}

impl StateGrid {
    /// Build a grid whose spacing is close to `approx_step` and fits an
    /// integer number of half bins between zero and the barrier.
    ///
    /// With `h = ceil(barrier / approx_step)` the grid has `2h + 1` states
    /// spaced by `barrier / (h + 0.5)`; the centre state is exactly zero.
    pub fn new(barrier: f64, approx_step: f64) -> Self {
        let half_bins = (barrier / approx_step).ceil();
        let step = barrier / (half_bins + 0.5);
        let half = half_bins as i64;
        let states = (-half..=half).map(|k| k as f64 * step).collect();
        Self { step, states }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn states(&self) -> &[f64] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Index of the state closest to `value`; the lowest index wins ties.
    pub fn nearest(&self, value: f64) -> usize {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (idx, &state) in self.states.iter().enumerate() {
            let distance = (state - value).abs();
            if distance < best_distance {
                best = idx;
                best_distance = distance;
            }
        }
        best
    }
}

/// Full time history of one propagation.
#[derive(Debug, Clone)]
pub struct Propagation {
    pub grid: StateGrid,
    /// Mass per state, indexed `[time step][state]`.
    pub mass: Vec<Vec<f64>>,
    /// Mass crossing the upper barrier during each step.
    pub up_crossing: Vec<f64>,
    /// Mass crossing the lower barrier during each step.
    pub down_crossing: Vec<f64>,
    /// Factor `sumIn / sumOut` applied at each step (1.0 at step 0 and on
    /// steps left unscaled).
    pub renormalization: Vec<f64>,
}

impl Propagation {
    pub fn num_steps(&self) -> usize {
        self.mass.len()
    }

    /// Interior mass at step `t` plus all mass absorbed up to and including `t`,
    /// or `None` past the last step.
    pub fn total_mass(&self, t: usize) -> Option<f64> {
        let interior: f64 = self.mass.get(t)?.iter().sum();
        let absorbed: f64 = self.up_crossing[..=t]
            .iter()
            .zip(&self.down_crossing[..=t])
            .map(|(up, down)| up + down)
            .sum();
        Some(interior + absorbed)
    }

    /// Crossing mass at the last step for the barrier tied to `choice`.
    pub fn final_crossing(&self, choice: Choice) -> f64 {
        // Same sign convention as the simulator: upper barrier is LEFT.
        let crossings = match choice {
            Choice::Left => &self.up_crossing,
            Choice::Right => &self.down_crossing,
        };
        crossings.last().copied().unwrap_or(0.0)
    }
}

/// Discretized Fokker-Planck likelihood engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LikelihoodEngine {
    /// Milliseconds per propagation step
    time_step_ms: u32,
    /// Requested spacing of the state grid
    approx_state_step: f64,
    /// Barrier collapse rate; barriers at step `t` are `±barrier / (1 + decay * t)`.
    barrier_decay: f64,
}

impl Default for LikelihoodEngine {
    fn default() -> Self {
        Self {
            time_step_ms: DEFAULT_TIME_STEP_MS,
            approx_state_step: DEFAULT_APPROX_STATE_STEP,
            barrier_decay: 0.0,
        }
    }
}

impl LikelihoodEngine {
    pub fn new(time_step_ms: u32, approx_state_step: f64) -> DdmResult<Self> {
        if time_step_ms == 0 {
            return Err(DdmError::Configuration(
                "time_step_ms must be greater than zero".to_string(),
            ));
        }
        if !approx_state_step.is_finite() || approx_state_step <= 0.0 {
            return Err(DdmError::Configuration(format!(
                "approx_state_step must be finite and positive, got {approx_state_step}"
            )));
        }
        Ok(Self {
            time_step_ms,
            approx_state_step,
            barrier_decay: 0.0,
        })
    }

    pub fn with_barrier_decay(self, barrier_decay: f64) -> DdmResult<Self> {
        if !barrier_decay.is_finite() || barrier_decay < 0.0 {
            return Err(DdmError::Configuration(format!(
                "barrier_decay must be finite and non-negative, got {barrier_decay}"
            )));
        }
        Ok(Self {
            barrier_decay,
            ..self
        })
    }

    pub fn time_step_ms(&self) -> u32 {
        self.time_step_ms
    }

    pub fn approx_state_step(&self) -> f64 {
        self.approx_state_step
    }

    pub fn barrier_decay(&self) -> f64 {
        self.barrier_decay
    }

    /// Probability of observing exactly this trial's response time and choice.
    ///
    /// # Errors
    /// [`DdmError::DegenerateTrial`] when the response time is shorter than
    /// one time step, [`DdmError::Configuration`] when sigma is not a positive
    /// standard deviation.
    pub fn likelihood(&self, params: &ModelParameters, trial: &Trial) -> DdmResult<f64> {
        let propagation = self.propagate(params, trial)?;
        let crossing = propagation.final_crossing(trial.choice);
        Ok(if crossing > 0.0 { crossing } else { 0.0 })
    }

    /// Propagate the RDV density over `trial.rt_ms / time_step_ms` steps.
    pub fn propagate(&self, params: &ModelParameters, trial: &Trial) -> DdmResult<Propagation> {
        if trial.rt_ms < self.time_step_ms {
            return Err(DdmError::DegenerateTrial {
                rt_ms: trial.rt_ms,
                time_step_ms: self.time_step_ms,
            });
        }
        let num_steps = (trial.rt_ms / self.time_step_ms) as usize;

        let barrier = params.barrier();
        let barrier_up: Vec<f64> = (0..num_steps)
            .map(|t| barrier / (1.0 + self.barrier_decay * t as f64))
            .collect();

        let grid = StateGrid::new(barrier, self.approx_state_step);
        let sigma = params.sigma();
        let mu = params.drift(&trial.condition);
        let non_decision_steps = params.non_decision_steps(self.time_step_ms);

        let drift_kernel = TransitionKernel::new(&grid, mu, sigma)?;
        let noise_kernel = if non_decision_steps > 0 {
            Some(TransitionKernel::new(&grid, 0.0, sigma)?)
        } else {
            None
        };

        let mut initial = vec![0.0; grid.len()];
        initial[grid.nearest(params.bias())] = 1.0;

        let mut mass = Vec::with_capacity(num_steps);
        mass.push(initial);
        let mut up_crossing = vec![0.0; num_steps];
        let mut down_crossing = vec![0.0; num_steps];
        let mut renormalization = vec![1.0; num_steps];

        let mut elapsed_non_decision = 0u32;
        for t in 1..num_steps {
            let kernel = match &noise_kernel {
                Some(noise) if elapsed_non_decision < non_decision_steps => {
                    elapsed_non_decision += 1;
                    noise
                }
                _ => &drift_kernel,
            };

            let previous = &mass[t - 1];
            let upper = barrier_up[t];
            let lower = -barrier_up[t];

            let mut next = kernel.apply(previous);
            for (m, &state) in next.iter_mut().zip(grid.states()) {
                if state >= upper || state <= lower {
                    *m = 0.0;
                }
            }

            let mut up = 0.0;
            let mut down = 0.0;
            for (&m, &state) in previous.iter().zip(grid.states()) {
                up += m * (1.0 - kernel.increment.cdf(upper - state));
                down += m * kernel.increment.cdf(lower - state);
            }

            let sum_in: f64 = previous.iter().sum();
            let sum_out = next.iter().sum::<f64>() + up + down;
            if sum_out > 0.0 {
                let scale = sum_in / sum_out;
                next.iter_mut().for_each(|m| *m *= scale);
                up *= scale;
                down *= scale;
                renormalization[t] = scale;
            }

            mass.push(next);
            up_crossing[t] = up;
            down_crossing[t] = down;
        }

        Ok(Propagation {
            grid,
            mass,
            up_crossing,
            down_crossing,
            renormalization,
        })
    }
}

/// Gaussian transition weights `stateStep * N(to - from; mean, sigma)`,
/// stored per index offset since the grid is uniform.
struct TransitionKernel {
    /// Distribution of one RDV increment.
    increment: Normal,
    len: usize,
    by_offset: Vec<f64>,
}

impl TransitionKernel {
    fn new(grid: &StateGrid, mean: f64, sigma: f64) -> DdmResult<Self> {
        let increment = Normal::new(mean, sigma).map_err(|err| {
            DdmError::Configuration(format!(
                "invalid increment distribution (mean {mean}, sigma {sigma}): {err}"
            ))
        })?;
        let len = grid.len();
        let by_offset = (0..2 * len.saturating_sub(1) + 1)
            .map(|k| {
                let offset = k as f64 - (len as f64 - 1.0);
                grid.step() * increment.pdf(offset * grid.step())
            })
            .collect();
        Ok(Self {
            increment,
            len,
            by_offset,
        })
    }

    fn weight(&self, from: usize, to: usize) -> f64 {
        self.by_offset[to + self.len - 1 - from]
    }

    fn apply(&self, previous: &[f64]) -> Vec<f64> {
        (0..self.len)
            .map(|to| {
                previous
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| **m != 0.0)
                    .map(|(from, &m)| m * self.weight(from, to))
                    .sum()
            })
            .collect()
    }
}
