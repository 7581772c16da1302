//! Error types for DDM simulation, likelihood evaluation and recovery.

use thiserror::Error;

use crate::params::ModelKey;

pub type DdmResult<T> = Result<T, DdmError>;

#[derive(Debug, Error)]
pub enum DdmError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("trial response time {rt_ms} ms is shorter than one time step of {time_step_ms} ms")]
    DegenerateTrial { rt_ms: u32, time_step_ms: u32 },
    #[error("simulation failed: {reason}")]
    Simulation { reason: String },
    #[error("while generating trial {trial} for condition {condition} under model {model}: {source}")]
    TrialContext {
        trial: usize,
        condition: usize,
        model: ModelKey,
        #[source]
        source: Box<DdmError>,
    },
    #[error("while scoring model {model}: {source}")]
    ModelContext {
        model: ModelKey,
        #[source]
        source: Box<DdmError>,
    },
    #[error("{context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl DdmError {
    pub(crate) fn simulation(reason: impl Into<String>) -> Self {
        DdmError::Simulation {
            reason: reason.into(),
        }
    }

    pub(crate) fn in_trial(self, trial: usize, condition: usize, model: ModelKey) -> Self {
        DdmError::TrialContext {
            trial,
            condition,
            model,
            source: Box::new(self),
        }
    }

    pub(crate) fn in_model(self, model: ModelKey) -> Self {
        DdmError::ModelContext {
            model,
            source: Box::new(self),
        }
    }

    /// Innermost error, with all context layers removed.
    pub fn root_cause(&self) -> &DdmError {
        match self {
            DdmError::TrialContext { source, .. } | DdmError::ModelContext { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}
