//! Small dense-matrix and entropy helpers for the scoring path. Feature
//! vectors are low-dimensional, so plain Gauss-Jordan is more than fast
//! enough and keeps the hot path allocation-light.

/// Pivot tolerance below which a matrix is treated as singular.
const SINGULAR_EPS: f64 = 1e-10;

/// Shannon entropy (bits) of a count distribution. Empty or degenerate
/// distributions have zero entropy; k equally likely categories give
/// log2(k).
pub fn shannon_entropy(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Invert a square matrix by Gauss-Jordan elimination with partial
/// pivoting. Returns `None` when the matrix is singular (or nearly so) —
/// callers must fall back explicitly, never assume invertibility.
pub fn invert_matrix(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    if n == 0 || matrix.iter().any(|row| row.len() != n) {
        return None;
    }

    // Augmented [A | I].
    let mut aug: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut out = row.clone();
            out.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            out
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| {
                aug[a][col]
                    .abs()
                    .partial_cmp(&aug[b][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if aug[pivot_row][col].abs() < SINGULAR_EPS {
            return None;
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for value in aug[col].iter_mut() {
            *value /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row][col];
            if factor == 0.0 {
                continue;
            }
            for k in 0..2 * n {
                aug[row][k] -= factor * aug[col][k];
            }
        }
    }

    Some(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}

/// Squared Mahalanobis distance `(x-μ)ᵀ Σ⁻¹ (x-μ)`. Caller guarantees
/// matching dimensions.
pub fn mahalanobis_sq(features: &[f64], mean: &[f64], inverse_cov: &[Vec<f64>]) -> f64 {
    let n = features.len();
    let delta: Vec<f64> = (0..n).map(|i| features[i] - mean[i]).collect();
    let mut acc = 0.0;
    for i in 0..n {
        let mut row = 0.0;
        for j in 0..n {
            row += inverse_cov[i][j] * delta[j];
        }
        acc += delta[i] * row;
    }
    acc.max(0.0)
}

/// Squared Euclidean distance against the mean: the explicit fallback when
/// the covariance has no inverse.
pub fn euclidean_sq(features: &[f64], mean: &[f64]) -> f64 {
    features
        .iter()
        .zip(mean.iter())
        .map(|(x, m)| (x - m) * (x - m))
        .sum()
}
