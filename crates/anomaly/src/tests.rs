use super::baseline::Baseline;
use super::integrity::IntegrityTracker;
use super::math::{euclidean_sq, invert_matrix, mahalanobis_sq, shannon_entropy};
use super::scorer::{MahalanobisScorer, ScoreError, Scorer, ScorerRegistry};
use super::store::BaselineStore;
use super::types::{EventKind, EVENT_KIND_COUNT, FEATURE_DIM};
use super::window::{FeatureWindow, WindowTable};

const EPS: f64 = 1e-9;

fn baseline_2d(mean: [f64; 2], inverse: Option<Vec<Vec<f64>>>, samples: u64) -> Baseline {
    let mut b = Baseline::new(2);
    b.mean = mean.to_vec();
    b.sample_count = samples;
    b.inverse_covariance = inverse;
    b
}

fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

#[test]
fn entropy_of_single_kind_is_zero() {
    assert!(shannon_entropy(&[42, 0, 0]).abs() < EPS);
    assert!(shannon_entropy(&[]).abs() < EPS);
}

#[test]
fn entropy_of_uniform_three_kinds_is_log2_three() {
    let h = shannon_entropy(&[7, 7, 7]);
    assert!((h - 3f64.log2()).abs() < EPS, "got {}", h);
}

#[test]
fn invert_identity_is_identity() {
    let inv = invert_matrix(&identity(3)).unwrap();
    for i in 0..3 {
        for j in 0..3 {
            let want = if i == j { 1.0 } else { 0.0 };
            assert!((inv[i][j] - want).abs() < EPS);
        }
    }
}

#[test]
fn invert_recovers_known_inverse() {
    // [[4, 7], [2, 6]] has inverse [[0.6, -0.7], [-0.2, 0.4]].
    let inv = invert_matrix(&[vec![4.0, 7.0], vec![2.0, 6.0]]).unwrap();
    assert!((inv[0][0] - 0.6).abs() < EPS);
    assert!((inv[0][1] + 0.7).abs() < EPS);
    assert!((inv[1][0] + 0.2).abs() < EPS);
    assert!((inv[1][1] - 0.4).abs() < EPS);
}

#[test]
fn singular_matrix_has_no_inverse() {
    assert!(invert_matrix(&[vec![1.0, 2.0], vec![2.0, 4.0]]).is_none());
    assert!(invert_matrix(&[vec![0.0, 0.0], vec![0.0, 0.0]]).is_none());
}

#[test]
fn mahalanobis_with_identity_covariance_is_euclidean() {
    let mean = [0.0, 0.0];
    let x = [1.0, 0.0];
    let inv = identity(2);
    let m = mahalanobis_sq(&x, &mean, &inv);
    let e = euclidean_sq(&x, &mean);
    assert!((m - 1.0).abs() < EPS);
    assert!((m - e).abs() < EPS);
}

#[test]
fn welford_mean_and_covariance_match_batch_statistics() {
    let samples = [
        [1.0, 2.0],
        [3.0, 4.0],
        [5.0, 6.0],
        [7.0, 8.0],
    ];
    let mut b = Baseline::new(2);
    for s in &samples {
        b.update(s, 0);
    }
    assert!((b.mean[0] - 4.0).abs() < EPS);
    assert!((b.mean[1] - 5.0).abs() < EPS);
    // Both dimensions move together, so every covariance entry equals the
    // common variance 20/3.
    let cov = b.covariance().unwrap();
    for i in 0..2 {
        for j in 0..2 {
            assert!((cov[i][j] - 20.0 / 3.0).abs() < 1e-6);
        }
    }
    // Perfectly correlated dimensions make the covariance singular.
    assert!(b.inverse_covariance.is_none());
}

#[test]
fn unprofiled_binary_scores_zero() {
    let scorer = MahalanobisScorer::default();
    let score = scorer.score(&[9.0, 9.0], &[1, 0, 0], None).unwrap();
    assert_eq!(score.value, 0.0);
    assert!(!score.euclidean_fallback);
}

#[test]
fn under_trained_baseline_scores_zero() {
    let scorer = MahalanobisScorer::default();
    let b = baseline_2d([0.0, 0.0], Some(identity(2)), 3);
    let score = scorer.score(&[100.0, 100.0], &[1, 0, 0], Some(&b)).unwrap();
    assert_eq!(score.value, 0.0);
}

#[test]
fn identity_covariance_with_zero_entropy_weight_scores_squared_distance() {
    let scorer = MahalanobisScorer {
        entropy_weight: 0.0,
        min_samples: 1,
    };
    let b = baseline_2d([0.0, 0.0], Some(identity(2)), 10);
    let score = scorer.score(&[1.0, 0.0], &[0, 0, 0], Some(&b)).unwrap();
    assert!((score.value - 1.0).abs() < EPS);
    assert!(!score.euclidean_fallback);
}

#[test]
fn singular_covariance_falls_back_to_euclidean() {
    let scorer = MahalanobisScorer {
        entropy_weight: 0.0,
        min_samples: 1,
    };
    let b = baseline_2d([0.0, 0.0], None, 10);
    let score = scorer.score(&[3.0, 4.0], &[0, 0, 0], Some(&b)).unwrap();
    assert!(score.euclidean_fallback);
    assert!((score.value - 25.0).abs() < EPS);
}

#[test]
fn entropy_shift_adds_weighted_term() {
    let scorer = MahalanobisScorer {
        entropy_weight: 0.3,
        min_samples: 1,
    };
    // Baseline mix is all one kind (entropy 0); recent mix is uniform over
    // three kinds (entropy log2 3).
    let mut b = baseline_2d([0.0, 0.0], Some(identity(2)), 10);
    b.event_counts = [10, 0, 0];
    let score = scorer.score(&[0.0, 0.0], &[5, 5, 5], Some(&b)).unwrap();
    assert!((score.distance - 0.0).abs() < EPS);
    assert!((score.entropy_delta - 3f64.log2()).abs() < EPS);
    assert!((score.value - 0.3 * 3f64.log2()).abs() < EPS);
}

#[test]
fn dimension_mismatch_is_an_error() {
    let scorer = MahalanobisScorer {
        entropy_weight: 0.0,
        min_samples: 1,
    };
    let b = baseline_2d([0.0, 0.0], Some(identity(2)), 10);
    let err = scorer.score(&[1.0, 2.0, 3.0], &[0, 0, 0], Some(&b)).unwrap_err();
    assert_eq!(err, ScoreError::DimensionMismatch { expected: 2, got: 3 });
}

#[test]
fn registry_resolves_by_name() {
    let registry = ScorerRegistry::default();
    assert_eq!(registry.resolve("mahalanobis").unwrap().name(), "mahalanobis");
    assert!(matches!(
        registry.resolve("nope"),
        Err(ScoreError::UnknownScorer(_))
    ));
}

#[test]
fn store_roundtrips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("baselines.bin");

    let store = BaselineStore::load_or_new(&path).unwrap();
    let features = [1.0, 0.0, 0.0, 1.0];
    for _ in 0..5 {
        store.update("abc123", &features, EventKind::Connect.index());
    }
    store.save().unwrap();

    let reopened = BaselineStore::load_or_new(&path).unwrap();
    assert_eq!(reopened.len(), 1);
    let b = reopened.get("abc123").unwrap();
    assert_eq!(b.sample_count, 5);
    assert_eq!(b.event_counts[EventKind::Connect.index()], 5);
    assert!((b.mean[0] - 1.0).abs() < EPS);
    assert!(reopened.get("missing").is_none());
}

#[test]
fn store_ignores_mismatched_dimensions() {
    let store = BaselineStore::new("/nonexistent/unused.bin");
    store.update("id", &[1.0, 2.0, 3.0, 4.0], 0);
    store.update("id", &[1.0, 2.0], 0);
    assert_eq!(store.get("id").unwrap().sample_count, 1);
}

#[test]
fn window_features_are_rates_over_the_window_span() {
    // 10s window; 5 connects and 5 file opens inside it.
    let mut w = FeatureWindow::new(10_000_000_000, 256);
    for i in 0..5u64 {
        w.push(i * 1_000_000_000, EventKind::Connect);
        w.push(i * 1_000_000_000 + 1, EventKind::FileOpen);
    }
    let f = w.features();
    assert!((f[EventKind::Connect.index()] - 0.5).abs() < EPS);
    assert!((f[EventKind::FileOpen.index()] - 0.5).abs() < EPS);
    assert!((f[EventKind::SetUid.index()] - 0.0).abs() < EPS);
    assert!((f[EVENT_KIND_COUNT] - 1.0).abs() < EPS);
}

#[test]
fn window_evicts_events_older_than_the_span() {
    let mut w = FeatureWindow::new(1_000_000_000, 256);
    w.push(0, EventKind::Connect);
    w.push(5_000_000_000, EventKind::FileOpen);
    assert_eq!(w.len(), 1);
    assert_eq!(w.kind_counts()[EventKind::Connect.index()], 0);
    assert_eq!(w.kind_counts()[EventKind::FileOpen.index()], 1);
}

#[test]
fn window_caps_event_count() {
    let mut w = FeatureWindow::new(u64::MAX / 2, 4);
    for i in 0..10 {
        w.push(i, EventKind::Connect);
    }
    assert_eq!(w.len(), 4);
}

#[test]
fn window_table_bounds_tracked_pids() {
    let table = WindowTable::new(2, 10_000_000_000, 16);
    table.observe(1, 0, EventKind::Connect);
    table.observe(2, 0, EventKind::Connect);
    table.observe(3, 0, EventKind::Connect);
    assert_eq!(table.len(), 2);
    table.remove(3);
    assert_eq!(table.len(), 1);
}

#[test]
fn window_table_accumulates_per_pid() {
    let table = WindowTable::default();
    table.observe(7, 1_000, EventKind::Connect);
    let (features, counts) = table.observe(7, 2_000, EventKind::Connect);
    assert_eq!(counts[EventKind::Connect.index()], 2);
    assert_eq!(features.len(), FEATURE_DIM);
    assert!(features[EVENT_KIND_COUNT] > 0.0);
}

#[test]
fn integrity_signal_is_zero_until_hash_drifts() {
    let tracker = IntegrityTracker::new();
    assert_eq!(tracker.observe(42, "aaaa"), 0.0);
    assert_eq!(tracker.observe(42, "aaaa"), 0.0);
    assert_eq!(tracker.observe(42, "bbbb"), 1.0);
    // Drift keeps reporting until the pid is forgotten.
    assert_eq!(tracker.observe(42, "bbbb"), 1.0);
    tracker.remove(42);
    assert_eq!(tracker.observe(42, "bbbb"), 0.0);
}

#[test]
fn hash_executable_is_stable_and_content_addressed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bin");
    std::fs::write(&path, b"payload-one").unwrap();
    let h1 = super::hash_executable(&path).unwrap();
    let h2 = super::hash_executable(&path).unwrap();
    assert_eq!(h1, h2);
    assert_eq!(h1.len(), 64);
    std::fs::write(&path, b"payload-two").unwrap();
    assert_ne!(super::hash_executable(&path).unwrap(), h1);
}
