use crate::config::HomographyConfig;
use crate::error::{MatchError, MatchResult};
use crate::geometry::{
    has_collinear_triple, homogeneous, normalize_points, normalize_scale, null_space_3x3,
};
use crate::point_pair::{Point2, PointPair};
use crate::ransac::{ransac_fit, Estimator, RansacOptions};
use nalgebra::{DMatrix, Matrix3};

/// Minimum number of point pairs that pin down a projective transform.
pub const MIN_PAIRS: usize = 4;

/// Below this `|det|` (after scaling `H[2,2]` to one) the transform is treated as singular.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Below this `|w'|` a projected point is at infinity.
const PROJECTION_EPSILON: f64 = 1e-12;

/// Collinearity tolerance for minimal samples, in pixels of triangle height.
const COLLINEAR_TOLERANCE: f64 = 1e-6;

/// Which way a point is carried through a [`Homography`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionDirection {
    /// Image A working space to image B working space.
    Forward,
    /// Image B working space to image A working space.
    Inverse,
}

/// A projective transform between the working spaces of two images, with its inverse.
///
/// Both matrices are finite and `forward * inverse` is the identity up to rounding.
#[derive(Debug, Clone, PartialEq)]
pub struct Homography {
    forward: Matrix3<f64>,
    inverse: Matrix3<f64>,
    inlier_count: usize,
}

impl Homography {
    /// Wraps a known forward matrix, scaling it so `H[2,2] == 1` and computing the inverse.
    ///
    /// # Errors
    /// `DegenerateHomography` when the matrix is singular or has non-finite entries.
    pub fn from_forward(forward: Matrix3<f64>) -> MatchResult<Self> {
        Self::with_support(forward, 0)
    }

    fn with_support(forward: Matrix3<f64>, inlier_count: usize) -> MatchResult<Self> {
        if forward.iter().any(|v| !v.is_finite()) {
            return Err(MatchError::DegenerateHomography(
                "non-finite matrix entry".to_string(),
            ));
        }
        let forward = normalize_scale(forward);
        let det = forward.determinant();
        if det.abs() <= SINGULAR_EPSILON || !det.is_finite() {
            return Err(MatchError::DegenerateHomography(format!(
                "determinant {det:e} is too close to zero"
            )));
        }
        let inverse = forward.try_inverse().ok_or_else(|| {
            MatchError::DegenerateHomography("matrix is not invertible".to_string())
        })?;
        if inverse.iter().any(|v| !v.is_finite()) {
            return Err(MatchError::DegenerateHomography(
                "inverse has non-finite entries".to_string(),
            ));
        }
        Ok(Self {
            forward,
            inverse: normalize_scale(inverse),
            inlier_count,
        })
    }

    /// Maps A working space to B working space, with `H[2,2] == 1`.
    pub fn forward(&self) -> &Matrix3<f64> {
        &self.forward
    }

    /// Maps B working space back to A working space.
    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    /// Number of pairs that supported the robust fit (0 for hand-built transforms).
    pub fn inlier_count(&self) -> usize {
        self.inlier_count
    }

    /// The matrix used for `direction`.
    pub fn matrix(&self, direction: ProjectionDirection) -> &Matrix3<f64> {
        match direction {
            ProjectionDirection::Forward => &self.forward,
            ProjectionDirection::Inverse => &self.inverse,
        }
    }

    /// The forward matrix flattened row by row, as sent on the wire.
    pub fn forward_row_major(&self) -> [f64; 9] {
        row_major(&self.forward)
    }

    pub fn inverse_row_major(&self) -> [f64; 9] {
        row_major(&self.inverse)
    }

    /// Applies `(x', y', w') = M (x, y, 1)` and returns `(x'/w', y'/w')`.
    ///
    /// # Errors
    /// `ProjectionDegenerate` when `w'` is within epsilon of zero.
    pub fn project(&self, point: Point2, direction: ProjectionDirection) -> MatchResult<Point2> {
        let p = self.matrix(direction) * homogeneous(&point);
        if p.z.abs() <= PROJECTION_EPSILON || !p.z.is_finite() {
            return Err(MatchError::ProjectionDegenerate {
                x: point.x,
                y: point.y,
            });
        }
        Ok(Point2::new(p.x / p.z, p.y / p.z))
    }
}

fn row_major(m: &Matrix3<f64>) -> [f64; 9] {
    let mut out = [0.0; 9];
    for r in 0..3 {
        for c in 0..3 {
            out[3 * r + c] = m[(r, c)];
        }
    }
    out
}

/// Robust homography fit from a clean-ish set of correspondences.
#[derive(Debug, Clone, Default)]
pub struct HomographyEstimator {
    config: HomographyConfig,
}

impl HomographyEstimator {
    /// Creates an estimator with the given reprojection threshold, iteration cap and seed.
    pub fn new(config: HomographyConfig) -> Self {
        Self { config }
    }

    /// Fits `H` with `point_in_b ~ H point_in_a`, tolerating residual outliers.
    ///
    /// # Errors
    /// - `InsufficientPairs` for fewer than four pairs.
    /// - `DegenerateHomography` when every sample is degenerate (e.g. all points
    ///   collinear) or the fitted matrix is singular.
    pub fn estimate(&self, pairs: &[PointPair]) -> MatchResult<Homography> {
        if pairs.len() < MIN_PAIRS {
            return Err(MatchError::InsufficientPairs {
                required: MIN_PAIRS,
                actual: pairs.len(),
            });
        }

        let opts = RansacOptions {
            threshold: self.config.reprojection_threshold,
            confidence: self.config.confidence,
            max_iterations: self.config.max_iterations,
            seed: self.config.seed,
        };
        let consensus = ransac_fit::<ProjectiveEstimator>(pairs, &opts).ok_or_else(|| {
            MatchError::DegenerateHomography(format!(
                "no non-degenerate projective fit from {} pairs",
                pairs.len()
            ))
        })?;

        log::debug!(
            "homography supported by {}/{} pairs",
            consensus.inliers.len(),
            pairs.len()
        );
        Homography::with_support(consensus.model, consensus.inliers.len())
    }
}

struct ProjectiveEstimator;

impl Estimator for ProjectiveEstimator {
    type Datum = PointPair;
    type Model = Matrix3<f64>;

    const MIN_SAMPLES: usize = MIN_PAIRS;

    fn fit(data: &[PointPair], indices: &[usize]) -> Option<Matrix3<f64>> {
        let a: Vec<Point2> = indices.iter().map(|&i| data[i].point_in_a).collect();
        let b: Vec<Point2> = indices.iter().map(|&i| data[i].point_in_b).collect();
        dlt(&a, &b)
    }

    fn residual(model: &Matrix3<f64>, datum: &PointPair) -> f64 {
        let p = model * homogeneous(&datum.point_in_a);
        if p.z.abs() <= PROJECTION_EPSILON {
            return f64::INFINITY;
        }
        Point2::new(p.x / p.z, p.y / p.z).distance(&datum.point_in_b)
    }

    fn is_degenerate(data: &[PointPair], indices: &[usize]) -> bool {
        let a: Vec<Point2> = indices.iter().map(|&i| data[i].point_in_a).collect();
        let b: Vec<Point2> = indices.iter().map(|&i| data[i].point_in_b).collect();
        has_collinear_triple(&a, COLLINEAR_TOLERANCE)
            || has_collinear_triple(&b, COLLINEAR_TOLERANCE)
    }
}

/// Normalized direct linear transform.
fn dlt(a: &[Point2], b: &[Point2]) -> Option<Matrix3<f64>> {
    let (a_n, t_a) = normalize_points(a)?;
    let (b_n, t_b) = normalize_points(b)?;

    let mut design = DMatrix::<f64>::zeros(2 * a_n.len(), 9);
    for (i, (p, q)) in a_n.iter().zip(b_n.iter()).enumerate() {
        let (r0, r1) = (2 * i, 2 * i + 1);
        design[(r0, 0)] = -p.x;
        design[(r0, 1)] = -p.y;
        design[(r0, 2)] = -1.0;
        design[(r0, 6)] = q.x * p.x;
        design[(r0, 7)] = q.x * p.y;
        design[(r0, 8)] = q.x;

        design[(r1, 3)] = -p.x;
        design[(r1, 4)] = -p.y;
        design[(r1, 5)] = -1.0;
        design[(r1, 6)] = q.y * p.x;
        design[(r1, 7)] = q.y * p.y;
        design[(r1, 8)] = q.y;
    }

    let h_n = null_space_3x3(&design)?;
    let t_b_inv = t_b.try_inverse()?;
    let h = normalize_scale(t_b_inv * h_n * t_a);
    if h.iter().all(|v| v.is_finite()) {
        Some(h)
    } else {
        None
    }
}
