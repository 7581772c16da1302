//! Response-time histograms conditioned on choice, and the log-likelihood of
//! observed histograms under simulated response-time distributions.

use serde::{Deserialize, Serialize};

use crate::error::{DdmError, DdmResult};
use crate::trial::ChoiceRts;

/// Ordered bin edges in milliseconds.
///
/// Bins are half-open `[e_i, e_{i+1})` except the last one, which also
/// contains its right edge. Response times outside the edges are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBins {
    edges: Vec<u32>,
}

impl HistogramBins {
    pub fn new(edges: Vec<u32>) -> DdmResult<Self> {
        if edges.len() < 2 {
            return Err(DdmError::Configuration(format!(
                "histogram needs at least two bin edges, got {}",
                edges.len()
            )));
        }
        if edges.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(DdmError::Configuration(
                "histogram bin edges must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { edges })
    }

    /// Edges `0, step, 2*step, ...` up to the first multiple of `step` that is
    /// not below `max_rt_ms`.
    pub fn uniform(bin_step_ms: u32, max_rt_ms: u32) -> DdmResult<Self> {
        if bin_step_ms == 0 {
            return Err(DdmError::Configuration(
                "bin_step_ms must be greater than zero".to_string(),
            ));
        }
        let end = u64::from(max_rt_ms) + u64::from(bin_step_ms);
        let edges = (0..)
            .map(|k: u64| k * u64::from(bin_step_ms))
            .take_while(|&edge| edge < end)
            .map(|edge| {
                u32::try_from(edge).map_err(|_| {
                    DdmError::Configuration(format!("bin edge {edge} ms overflows u32"))
                })
            })
            .collect::<DdmResult<Vec<_>>>()?;
        Self::new(edges)
    }

    pub fn edges(&self) -> &[u32] {
        &self.edges
    }

    pub fn num_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Bin containing `rt_ms`, if any.
    pub fn bin_of(&self, rt_ms: u32) -> Option<usize> {
        let first = self.edges[0];
        let last = self.edges[self.edges.len() - 1];
        if rt_ms < first || rt_ms > last {
            return None;
        }
        if rt_ms == last {
            return Some(self.num_bins() - 1);
        }
        Some(self.edges.partition_point(|&edge| edge <= rt_ms) - 1)
    }

    pub fn count(&self, rts: &[u32]) -> Vec<u64> {
        let mut counts = vec![0u64; self.num_bins()];
        for bin in rts.iter().filter_map(|&rt| self.bin_of(rt)) {
            counts[bin] += 1;
        }
        counts
    }
}

/// Counts over the same bins for left and right choices of one condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionHistograms {
    pub left: Vec<u64>,
    pub right: Vec<u64>,
}

impl ConditionHistograms {
    pub fn from_rts(bins: &HistogramBins, rts: &ChoiceRts) -> Self {
        Self {
            left: bins.count(&rts.left),
            right: bins.count(&rts.right),
        }
    }

    pub fn total(&self) -> u64 {
        self.left.iter().chain(&self.right).sum()
    }
}

/// Counts scaled to sum to one. An all-zero histogram stays all zero.
pub fn proportions(counts: &[u64]) -> Vec<f64> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts.iter().map(|&c| c as f64 / total as f64).collect()
}

/// `sum(data[i] * ln(p[i]))` where bins with `p[i] == 0` contribute nothing.
///
/// Observed mass in a bin the simulation never reached is therefore not
/// penalized.
pub fn log_likelihood_term(data_counts: &[u64], sim_proportions: &[f64]) -> DdmResult<f64> {
    if data_counts.len() != sim_proportions.len() {
        return Err(DdmError::LengthMismatch {
            context: "histogram bins",
            expected: sim_proportions.len(),
            got: data_counts.len(),
        });
    }
    Ok(data_counts
        .iter()
        .zip(sim_proportions)
        .filter(|(_, p)| **p > 0.0)
        .map(|(&count, &p)| count as f64 * p.ln())
        .sum())
}

/// Log-likelihood of the observed histograms given simulated response times.
///
/// `simulated` and `observed` are aligned by condition index; both choices
/// of every condition contribute.
pub fn log_likelihood(
    simulated: &[ChoiceRts],
    observed: &[ConditionHistograms],
    bins: &HistogramBins,
) -> DdmResult<f64> {
    if simulated.len() != observed.len() {
        return Err(DdmError::LengthMismatch {
            context: "trial conditions",
            expected: observed.len(),
            got: simulated.len(),
        });
    }

    let mut total = 0.0;
    for (rts, data) in simulated.iter().zip(observed) {
        let sim = ConditionHistograms::from_rts(bins, rts);
        total += log_likelihood_term(&data.left, &proportions(&sim.left))?;
        total += log_likelihood_term(&data.right, &proportions(&sim.right))?;
    }
    Ok(total)
}
