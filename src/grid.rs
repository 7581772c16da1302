//! Two-dimensional (d, sigma) search grid.
//!
//! Grid points are addressed by integer indices; the real-valued parameters
//! are looked up from the ranges, never used as map keys.

use serde::{Deserialize, Serialize};

use crate::error::{DdmError, DdmResult};
use crate::params::ModelParameters;

/// Row (d) and column (sigma) of one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridIndex {
    pub d: usize,
    pub sigma: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterGrid {
    d_range: Vec<f64>,
    sigma_range: Vec<f64>,
}

impl ParameterGrid {
    pub fn new(d_range: Vec<f64>, sigma_range: Vec<f64>) -> DdmResult<Self> {
        if d_range.is_empty() || sigma_range.is_empty() {
            return Err(DdmError::Configuration(
                "parameter ranges for d and sigma must not be empty".to_string(),
            ));
        }
        Ok(Self {
            d_range,
            sigma_range,
        })
    }

    pub fn d_range(&self) -> &[f64] {
        &self.d_range
    }

    pub fn sigma_range(&self) -> &[f64] {
        &self.sigma_range
    }

    pub fn len(&self) -> usize {
        self.d_range.len() * self.sigma_range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid point at flat position `flat`; d varies slowest.
    pub fn index(&self, flat: usize) -> GridIndex {
        GridIndex {
            d: flat / self.sigma_range.len(),
            sigma: flat % self.sigma_range.len(),
        }
    }

    pub fn flat(&self, index: GridIndex) -> usize {
        index.d * self.sigma_range.len() + index.sigma
    }

    /// `(d, sigma)` at `index`.
    pub fn values(&self, index: GridIndex) -> (f64, f64) {
        (self.d_range[index.d], self.sigma_range[index.sigma])
    }

    /// All grid points in enumeration order: d outer, sigma inner.
    pub fn indices(&self) -> impl Iterator<Item = GridIndex> + '_ {
        (0..self.len()).map(move |flat| self.index(flat))
    }

    /// Candidate models, one per grid point in enumeration order, sharing
    /// every other field with `template`.
    pub fn models(&self, template: &ModelParameters) -> Vec<ModelParameters> {
        self.indices()
            .map(|index| {
                let (d, sigma) = self.values(index);
                template.with_drift_noise(d, sigma)
            })
            .collect()
    }
}
