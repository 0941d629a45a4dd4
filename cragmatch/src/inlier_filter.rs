use crate::config::FilterConfig;
use crate::error::{MatchError, MatchResult};
use crate::geometry::{homogeneous, normalize_points, null_space_3x3};
use crate::point_pair::{Point2, PointPair};
use crate::ransac::{ransac_fit, Estimator, RansacOptions};
use nalgebra::{DMatrix, Matrix3};

/// Minimum number of correspondences for the eight-point fundamental matrix fit.
pub const MIN_CORRESPONDENCES: usize = 8;

/// Correspondences that survived the epipolar consistency check.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Inliers in the order the oracle reported them.
    pub inliers: Vec<PointPair>,
}

impl FilterOutcome {
    /// Number of surviving correspondences.
    pub fn score(&self) -> usize {
        self.inliers.len()
    }
}

/// Rejects gross mismatches from raw oracle output.
///
/// A fundamental matrix is fitted with the normalized eight-point algorithm inside a
/// seeded sample-consensus loop; a correspondence is an inlier when its Sampson
/// distance to the fitted epipolar geometry is within `threshold` pixels.
#[derive(Debug, Clone, Default)]
pub struct InlierFilter {
    config: FilterConfig,
}

impl InlierFilter {
    /// Creates a filter with the given threshold, confidence, iteration cap and seed.
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// # Errors
    /// - `InsufficientCorrespondences` for fewer than eight pairs; the estimator is not run.
    /// - `NoConsensus` when no sample yields a usable fundamental matrix.
    pub fn filter(&self, raw: &[PointPair]) -> MatchResult<FilterOutcome> {
        if raw.len() < MIN_CORRESPONDENCES {
            return Err(MatchError::InsufficientCorrespondences {
                required: MIN_CORRESPONDENCES,
                actual: raw.len(),
            });
        }

        let opts = RansacOptions {
            threshold: self.config.threshold,
            confidence: self.config.confidence,
            max_iterations: self.config.max_iterations,
            seed: self.config.seed,
        };
        let consensus =
            ransac_fit::<FundamentalEstimator>(raw, &opts).ok_or(MatchError::NoConsensus)?;

        log::debug!(
            "epipolar filter kept {}/{} correspondences ({} iterations)",
            consensus.inliers.len(),
            raw.len(),
            consensus.iterations
        );

        Ok(FilterOutcome {
            inliers: consensus.inliers.iter().map(|&i| raw[i]).collect(),
        })
    }
}

struct FundamentalEstimator;

impl Estimator for FundamentalEstimator {
    type Datum = PointPair;
    type Model = Matrix3<f64>;

    const MIN_SAMPLES: usize = MIN_CORRESPONDENCES;

    fn fit(data: &[PointPair], indices: &[usize]) -> Option<Matrix3<f64>> {
        let a: Vec<Point2> = indices.iter().map(|&i| data[i].point_in_a).collect();
        let b: Vec<Point2> = indices.iter().map(|&i| data[i].point_in_b).collect();
        eight_point(&a, &b)
    }

    fn residual(model: &Matrix3<f64>, datum: &PointPair) -> f64 {
        sampson_distance(model, &datum.point_in_a, &datum.point_in_b)
    }
}

/// Normalized eight-point algorithm with rank-2 enforcement.
fn eight_point(a: &[Point2], b: &[Point2]) -> Option<Matrix3<f64>> {
    let (a_n, t_a) = normalize_points(a)?;
    let (b_n, t_b) = normalize_points(b)?;

    let mut design = DMatrix::<f64>::zeros(a_n.len(), 9);
    for (row, (p, q)) in a_n.iter().zip(b_n.iter()).enumerate() {
        let values = [
            q.x * p.x,
            q.x * p.y,
            q.x,
            q.y * p.x,
            q.y * p.y,
            q.y,
            p.x,
            p.y,
            1.0,
        ];
        for (col, v) in values.iter().enumerate() {
            design[(row, col)] = *v;
        }
    }

    let f_n = enforce_rank_two(null_space_3x3(&design)?)?;
    let f = t_b.transpose() * f_n * t_a;
    let norm = f.norm();
    if norm < 1e-15 || !norm.is_finite() {
        return None;
    }
    Some(f / norm)
}

fn enforce_rank_two(f: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = f.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut sigma = svd.singular_values;
    let smallest = sigma.imin();
    sigma[smallest] = 0.0;
    Some(u * Matrix3::from_diagonal(&sigma) * v_t)
}

/// First-order geometric distance, in pixels, of a correspondence to the epipolar geometry `f`.
fn sampson_distance(f: &Matrix3<f64>, a: &Point2, b: &Point2) -> f64 {
    let x_a = homogeneous(a);
    let x_b = homogeneous(b);
    let f_a = f * x_a;
    let ft_b = f.transpose() * x_b;
    let algebraic = x_b.dot(&f_a);
    let denom = f_a.x * f_a.x + f_a.y * f_a.y + ft_b.x * ft_b.x + ft_b.y * ft_b.y;
    if denom < 1e-24 {
        return f64::INFINITY;
    }
    (algebraic * algebraic / denom).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{scatter_outliers, two_view_pairs};

    #[test]
    fn fewer_than_eight_pairs_is_insufficient() {
        let pairs = two_view_pairs(7, 3);
        let err = InlierFilter::default().filter(&pairs).unwrap_err();
        assert!(matches!(
            err,
            MatchError::InsufficientCorrespondences { required: 8, actual: 7 }
        ));
    }

    #[test]
    fn consistent_pairs_are_all_inliers() {
        let pairs = two_view_pairs(47, 11);
        let outcome = InlierFilter::default().filter(&pairs).unwrap();
        assert_eq!(outcome.score(), 47);
        assert_eq!(outcome.inliers, pairs);
    }

    #[test]
    fn gross_outliers_are_rejected() {
        let mut pairs = two_view_pairs(40, 5);
        pairs.extend(scatter_outliers(20, 77));

        let outcome = InlierFilter::default().filter(&pairs).unwrap();
        for good in &pairs[..40] {
            assert!(outcome.inliers.contains(good));
        }
        // A random pair can land on its epipolar line by chance; allow a couple.
        assert!(outcome.score() <= 42, "kept {} pairs", outcome.score());
    }

    #[test]
    fn fundamental_matrix_is_rank_two() {
        let pairs = two_view_pairs(30, 8);
        let a: Vec<Point2> = pairs.iter().map(|p| p.point_in_a).collect();
        let b: Vec<Point2> = pairs.iter().map(|p| p.point_in_b).collect();
        let f = eight_point(&a, &b).unwrap();
        assert!(f.determinant().abs() < 1e-9);
        for pair in &pairs {
            assert!(sampson_distance(&f, &pair.point_in_a, &pair.point_in_b) < 1e-6);
        }
    }

    #[test]
    fn rank_enforcement_zeroes_the_smallest_singular_value() {
        let full = Matrix3::new(4.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 2.0);
        let reduced = enforce_rank_two(full).unwrap();
        let expected = Matrix3::new(4.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0);
        assert!((reduced - expected).norm() < 1e-12, "{reduced}");
    }

    #[test]
    fn filtering_is_deterministic() {
        let mut pairs = two_view_pairs(25, 2);
        pairs.extend(scatter_outliers(10, 3));
        let filter = InlierFilter::default();
        let first = filter.filter(&pairs).unwrap();
        let second = filter.filter(&pairs).unwrap();
        assert_eq!(first.inliers, second.inliers);
    }

    #[test]
    fn identical_points_have_no_consensus() {
        let pairs = vec![PointPair::new((5.0, 5.0), (6.0, 6.0)); 12];
        let err = InlierFilter::default().filter(&pairs).unwrap_err();
        assert!(matches!(err, MatchError::NoConsensus));
    }
}
