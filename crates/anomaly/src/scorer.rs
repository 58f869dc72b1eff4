use std::fmt;

use tracing::trace;

use crate::baseline::Baseline;
use crate::math::{euclidean_sq, mahalanobis_sq, shannon_entropy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreError {
    DimensionMismatch { expected: usize, got: usize },
    UnknownScorer(String),
}

impl fmt::Display for ScoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { expected, got } => {
                write!(f, "feature dimension mismatch: expected {}, got {}", expected, got)
            }
            Self::UnknownScorer(name) => write!(f, "unknown scorer: {}", name),
        }
    }
}

impl std::error::Error for ScoreError {}

pub type ScoreResult<T> = std::result::Result<T, ScoreError>;

/// One scored observation: the statistical distance plus the entropy
/// deviation of the recent event mix against the baseline mix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub value: f64,
    pub distance: f64,
    pub entropy_delta: f64,
    /// True when the covariance was singular and the distance fell back to
    /// Euclidean.
    pub euclidean_fallback: bool,
}

impl Score {
    pub const ZERO: Score = Score {
        value: 0.0,
        distance: 0.0,
        entropy_delta: 0.0,
        euclidean_fallback: false,
    };
}

/// Scoring strategies must be pure: no I/O, no blocking, no panics on
/// malformed baselines. Workers call this on every batched event.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score a feature vector against a baseline. `baseline` is `None` when
    /// the binary has never been profiled; implementations must return a
    /// neutral score rather than guess.
    fn score(
        &self,
        features: &[f64],
        recent_counts: &[u64],
        baseline: Option<&Baseline>,
    ) -> ScoreResult<Score>;
}

/// Mahalanobis distance against the per-binary baseline, blended with the
/// entropy shift of the recent event-kind mix. Under-trained baselines are
/// treated the same as absent ones.
#[derive(Debug, Clone)]
pub struct MahalanobisScorer {
    pub entropy_weight: f64,
    /// Baselines with fewer samples than this score zero. A covariance
    /// estimate needs a handful of samples before the distance means
    /// anything.
    pub min_samples: u64,
}

impl Default for MahalanobisScorer {
    fn default() -> Self {
        Self {
            entropy_weight: 0.3,
            min_samples: 8,
        }
    }
}

impl Scorer for MahalanobisScorer {
    fn name(&self) -> &'static str {
        "mahalanobis"
    }

    fn score(
        &self,
        features: &[f64],
        recent_counts: &[u64],
        baseline: Option<&Baseline>,
    ) -> ScoreResult<Score> {
        let baseline = match baseline {
            Some(b) if b.sample_count >= self.min_samples => b,
            _ => return Ok(Score::ZERO),
        };
        if baseline.dims() != features.len() {
            return Err(ScoreError::DimensionMismatch {
                expected: baseline.dims(),
                got: features.len(),
            });
        }

        let (distance, fallback) = match baseline.inverse_covariance.as_deref() {
            Some(inv) => (mahalanobis_sq(features, &baseline.mean, inv), false),
            None => (euclidean_sq(features, &baseline.mean), true),
        };
        if fallback {
            trace!(samples = baseline.sample_count, "singular covariance, euclidean fallback");
        }

        let entropy_delta = (shannon_entropy(recent_counts) - baseline.entropy()).abs();
        let value = distance + self.entropy_weight * entropy_delta;
        Ok(Score {
            value,
            distance,
            entropy_delta,
            euclidean_fallback: fallback,
        })
    }
}

/// Scorer selection by config key so deployments can switch strategies
/// without a rebuild.
pub struct ScorerRegistry {
    entries: Vec<Box<dyn Scorer>>,
}

impl Default for ScorerRegistry {
    fn default() -> Self {
        Self {
            entries: vec![Box::new(MahalanobisScorer::default())],
        }
    }
}

impl ScorerRegistry {
    pub fn with_scorer(mut self, scorer: Box<dyn Scorer>) -> Self {
        self.entries.push(scorer);
        self
    }

    pub fn resolve(&self, name: &str) -> ScoreResult<&dyn Scorer> {
        self.entries
            .iter()
            .rev()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
            .ok_or_else(|| ScoreError::UnknownScorer(name.to_string()))
    }
}
