//! Synthetic data and stub collaborators for unit tests.

use crate::correspondence::CorrespondenceOracle;
use crate::error::{MatchError, MatchResult};
use crate::image_frame::ImageFrame;
use crate::point_pair::PointPair;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const FOCAL: f64 = 500.0;
const CX: f64 = 420.0;
const CY: f64 = 315.0;

/// `n` exact correspondences of random 3D points seen by two cameras with a
/// translated, slightly rotated baseline. All of them satisfy one epipolar geometry.
pub(crate) fn two_view_pairs(n: usize, seed: u64) -> Vec<PointPair> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (s, c) = 0.05f64.sin_cos();
    let t = [-0.6, 0.05, 0.1];
    (0..n)
        .map(|_| {
            let x: f64 = rng.random_range(-2.0..2.0);
            let y: f64 = rng.random_range(-1.5..1.5);
            let z: f64 = rng.random_range(4.0..10.0);

            let a = (FOCAL * x / z + CX, FOCAL * y / z + CY);

            let xb = c * x + s * z + t[0];
            let yb = y + t[1];
            let zb = -s * x + c * z + t[2];
            let b = (FOCAL * xb / zb + CX, FOCAL * yb / zb + CY);

            PointPair::new(a, b)
        })
        .collect()
}

/// Unrelated random pairs spread over an 840x630 frame.
pub(crate) fn scatter_outliers(n: usize, seed: u64) -> Vec<PointPair> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            PointPair::new(
                (rng.random_range(0.0..840.0), rng.random_range(0.0..630.0)),
                (rng.random_range(0.0..840.0), rng.random_range(0.0..630.0)),
            )
        })
        .collect()
}

/// A single-colour frame of the given original and working size.
pub(crate) fn uniform_frame(
    original: (u32, u32),
    working: (u32, u32),
    rgba: [u8; 4],
) -> ImageFrame {
    let pixel_count = working.0 as usize * working.1 as usize;
    let pixels = rgba.iter().copied().cycle().take(pixel_count * 4).collect();
    ImageFrame::from_rgba(original.0, original.1, working.0, working.1, pixels).unwrap()
}

/// A frame whose identity is its red channel; stub oracles key on it.
pub(crate) fn tagged_frame(tag: u8) -> ImageFrame {
    uniform_frame((4000, 3000), (8, 6), [tag, 0, 0, 255])
}

fn frame_tag(frame: &ImageFrame) -> u8 {
    frame.pixels().first().copied().unwrap_or(0)
}

/// Oracle returning canned correspondences per candidate tag.
#[derive(Default)]
pub(crate) struct StubOracle {
    responses: HashMap<u8, Vec<PointPair>>,
    failing: Option<u8>,
    pub calls: Vec<u8>,
}

impl StubOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidate `tag` yields `inliers` exact two-view correspondences.
    pub fn with_inliers(mut self, tag: u8, inliers: usize) -> Self {
        self.responses
            .insert(tag, two_view_pairs(inliers, 1000 + tag as u64));
        self
    }

    pub fn with_pairs(mut self, tag: u8, pairs: Vec<PointPair>) -> Self {
        self.responses.insert(tag, pairs);
        self
    }

    /// Calls against candidate `tag` report an oracle failure.
    pub fn failing_on(mut self, tag: u8) -> Self {
        self.failing = Some(tag);
        self
    }
}

impl CorrespondenceOracle for StubOracle {
    fn correspond(&mut self, _a: &ImageFrame, b: &ImageFrame) -> MatchResult<Vec<PointPair>> {
        let tag = frame_tag(b);
        self.calls.push(tag);
        if self.failing == Some(tag) {
            return Err(MatchError::Oracle(format!("device fault on {tag}")));
        }
        Ok(self.responses.get(&tag).cloned().unwrap_or_default())
    }
}
