//! Point and correspondence types shared by the filter, the estimator and the wire format.

use serde::{Deserialize, Serialize};

/// A location in the working-resolution pixel space of one image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A correspondence between two images: the same physical feature seen in A and in B.
///
/// Both points live in the working-resolution space of their own image. On the wire
/// the pair is written as `{"point1": {..}, "point2": {..}}`:
///
/// ```
/// # use cragmatch::point_pair::PointPair;
/// let pair = PointPair::new((1.0, 2.0), (3.5, 4.0));
/// let json = serde_json::to_string(&pair).unwrap();
/// assert_eq!(json, r#"{"point1":{"x":1.0,"y":2.0},"point2":{"x":3.5,"y":4.0}}"#);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointPair {
    #[serde(rename = "point1")]
    pub point_in_a: Point2,
    #[serde(rename = "point2")]
    pub point_in_b: Point2,
}

impl PointPair {
    /// Pairs `a` in image A with `b` in image B.
    pub fn new(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            point_in_a: Point2::new(a.0, a.1),
            point_in_b: Point2::new(b.0, b.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_wire_form() {
        let pair: PointPair =
            serde_json::from_str(r#"{"point1":{"x":10,"y":20.5},"point2":{"x":0.25,"y":1}}"#)
                .unwrap();
        assert_eq!(pair, PointPair::new((10.0, 20.5), (0.25, 1.0)));
    }

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(Point2::new(0.0, 0.0).distance(&Point2::new(3.0, 4.0)), 5.0);
    }
}
