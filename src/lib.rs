//! DDM Recovery - drift-diffusion decision models
//!
//! Simulates two-alternative choices between a left and a right option with a
//! drift-diffusion model whose drift depends on subjectively distorted reward
//! probabilities, computes discretized trial likelihoods by propagating the
//! decision-variable density on a discrete grid, and recovers the drift
//! scale `d` and noise `sigma` of a known model from its own synthetic data
//! by grid search (posterior updating or histogram likelihood maximization).

pub mod config;
pub mod error;
pub mod grid;
pub mod histogram;
pub mod likelihood;
pub mod params;
pub mod pool;
pub mod recovery;
pub mod sim;
pub mod trial;

// Re-export main types
pub use config::RecoveryConfig;
pub use error::{DdmError, DdmResult};
pub use grid::{GridIndex, ParameterGrid};
pub use histogram::{ConditionHistograms, HistogramBins};
pub use likelihood::{LikelihoodEngine, Propagation, StateGrid};
pub use params::{ModelKey, ModelParameters};
pub use pool::{task_rng, RayonPool, SerialPool, WorkerPool};
pub use recovery::{recover_mla, recover_pta, MlaOutcome, PtaOutcome};
pub use sim::TrialSimulator;
pub use trial::{Choice, ChoiceRts, Trial, TrialCondition};
