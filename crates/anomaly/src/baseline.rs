use serde::{Deserialize, Serialize};

use crate::math::{invert_matrix, shannon_entropy};
use crate::types::EVENT_KIND_COUNT;

/// Statistical profile of one process binary's normal behaviour, keyed by
/// the executable's content hash. Built incrementally; read-only during
/// scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: Vec<f64>,
    /// Co-moment matrix M2 from Welford's online update; covariance is
    /// `M2 / (n-1)`.
    pub comoment: Vec<Vec<f64>>,
    pub event_counts: [u64; EVENT_KIND_COUNT],
    pub sample_count: u64,
    /// Cached inverse covariance; `None` while the covariance is singular.
    /// Scoring falls back to Euclidean distance in that case — explicitly,
    /// never silently.
    pub inverse_covariance: Option<Vec<Vec<f64>>>,
}

impl Baseline {
    pub fn new(dims: usize) -> Self {
        Self {
            mean: vec![0.0; dims],
            comoment: vec![vec![0.0; dims]; dims],
            event_counts: [0; EVENT_KIND_COUNT],
            sample_count: 0,
            inverse_covariance: None,
        }
    }

    pub fn dims(&self) -> usize {
        self.mean.len()
    }

    /// Fold one observed feature vector into the running statistics
    /// (Welford's multivariate update), then refresh the cached inverse.
    pub fn update(&mut self, features: &[f64], event_kind_index: usize) {
        debug_assert_eq!(features.len(), self.dims());
        self.sample_count += 1;
        let n = self.sample_count as f64;

        let delta_old: Vec<f64> = features
            .iter()
            .zip(self.mean.iter())
            .map(|(x, m)| x - m)
            .collect();
        for (m, d) in self.mean.iter_mut().zip(delta_old.iter()) {
            *m += d / n;
        }
        let delta_new: Vec<f64> = features
            .iter()
            .zip(self.mean.iter())
            .map(|(x, m)| x - m)
            .collect();
        for i in 0..self.dims() {
            for j in 0..self.dims() {
                self.comoment[i][j] += delta_old[i] * delta_new[j];
            }
        }

        if event_kind_index < EVENT_KIND_COUNT {
            self.event_counts[event_kind_index] += 1;
        }

        self.refresh_inverse();
    }

    /// Sample covariance matrix, or `None` before two samples exist.
    pub fn covariance(&self) -> Option<Vec<Vec<f64>>> {
        if self.sample_count < 2 {
            return None;
        }
        let denom = (self.sample_count - 1) as f64;
        Some(
            self.comoment
                .iter()
                .map(|row| row.iter().map(|v| v / denom).collect())
                .collect(),
        )
    }

    pub fn stddev(&self) -> Vec<f64> {
        match self.covariance() {
            Some(cov) => (0..self.dims()).map(|i| cov[i][i].max(0.0).sqrt()).collect(),
            None => vec![0.0; self.dims()],
        }
    }

    /// Shannon entropy of the baseline event-type distribution.
    pub fn entropy(&self) -> f64 {
        shannon_entropy(&self.event_counts)
    }

    fn refresh_inverse(&mut self) {
        self.inverse_covariance = self.covariance().as_deref().and_then(invert_matrix);
    }
}
