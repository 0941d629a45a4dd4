//! Small linear-algebra helpers shared by the epipolar filter and the homography fit.

use crate::point_pair::Point2;
use nalgebra::{DMatrix, Matrix3, Vector3};

/// Hartley normalization: translate the centroid to the origin and scale so the mean
/// distance from it is `sqrt(2)`.
///
/// Returns the normalized points and the similarity `T` with `p_norm = T * p`, or `None`
/// when every point coincides.
pub(crate) fn normalize_points(points: &[Point2]) -> Option<(Vec<Point2>, Matrix3<f64>)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < 1e-12 || !mean_dist.is_finite() {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    let normalized = points
        .iter()
        .map(|p| Point2::new((p.x - cx) * s, (p.y - cy) * s))
        .collect();
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    Some((normalized, t))
}

/// Null vector of `a` (the right singular vector of its smallest singular value),
/// reshaped row-major into a 3x3 matrix. `a` must have 9 columns.
///
/// Under-determined systems are padded with zero rows so the SVD yields all nine
/// right singular vectors.
pub(crate) fn null_space_3x3(a: &DMatrix<f64>) -> Option<Matrix3<f64>> {
    debug_assert_eq!(a.ncols(), 9);
    let rows = a.nrows().max(9);
    let padded = DMatrix::from_fn(rows, 9, |r, c| if r < a.nrows() { a[(r, c)] } else { 0.0 });
    let svd = padded.svd(false, true);
    let v_t = svd.v_t?;
    let smallest = svd.singular_values.imin();
    let h = v_t.row(smallest);
    let m = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    if m.iter().all(|v| v.is_finite()) {
        Some(m)
    } else {
        None
    }
}

pub(crate) fn homogeneous(p: &Point2) -> Vector3<f64> {
    Vector3::new(p.x, p.y, 1.0)
}

/// Twice the signed area of the triangle `a b c`, scaled by the longest side so the
/// test does not depend on the magnitude of the coordinates.
pub(crate) fn are_collinear(a: &Point2, b: &Point2, c: &Point2, tolerance: f64) -> bool {
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    let longest = a.distance(b).max(a.distance(c)).max(b.distance(c));
    if longest < 1e-12 {
        return true;
    }
    (cross / longest).abs() < tolerance
}

/// True when any three of `points` are collinear.
pub(crate) fn has_collinear_triple(points: &[Point2], tolerance: f64) -> bool {
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            for k in j + 1..points.len() {
                if are_collinear(&points[i], &points[j], &points[k], tolerance) {
                    return true;
                }
            }
        }
    }
    false
}

/// Scales `m` so that its bottom-right entry is one, when that entry is usable.
pub(crate) fn normalize_scale(m: Matrix3<f64>) -> Matrix3<f64> {
    let scale = m[(2, 2)];
    if scale.abs() > f64::EPSILON {
        m / scale
    } else {
        m
    }
}
