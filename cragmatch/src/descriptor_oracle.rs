//! A self-contained correspondence oracle built on circular colour descriptors.
//!
//! It is far weaker than a learned dense matcher but needs no model weights or device,
//! which makes it useful for local runs of the command line tool and for exercising the
//! full pipeline end to end.

use crate::circular_descriptor::{lattice_descriptors, CircularDescriptor};
use crate::config::DescriptorConfig;
use crate::correspondence::CorrespondenceOracle;
use crate::error::MatchResult;
use crate::image_frame::ImageFrame;
use crate::point_pair::PointPair;
use kd_tree::KdTree;

/// Matches lattice descriptors of B to their nearest neighbours among A's descriptors.
#[derive(Debug, Clone, Default)]
pub struct DescriptorOracle {
    config: DescriptorConfig,
}

impl DescriptorOracle {
    pub fn new(config: DescriptorConfig) -> Self {
        Self { config }
    }

    fn textured(&self, frame: &ImageFrame) -> Vec<CircularDescriptor> {
        lattice_descriptors(frame, self.config.stride, self.config.radius)
            .into_iter()
            .filter(|d| d.total_radius >= self.config.min_contrast)
            .collect()
    }
}

impl CorrespondenceOracle for DescriptorOracle {
    fn correspond(&mut self, a: &ImageFrame, b: &ImageFrame) -> MatchResult<Vec<PointPair>> {
        let descriptors_a = self.textured(a);
        let descriptors_b = self.textured(b);
        if descriptors_a.is_empty() || descriptors_b.is_empty() {
            log::debug!("descriptor oracle: no textured samples to match");
            return Ok(Vec::new());
        }

        let tree_a = KdTree::build(descriptors_a);
        let tree_b = self
            .config
            .cross_check
            .then(|| KdTree::build(descriptors_b.clone()));

        let mut pairs = Vec::new();
        for db in &descriptors_b {
            let Some(found) = tree_a.nearest(db) else {
                continue;
            };
            let da = found.item;
            if da.distance(db) > self.config.max_descriptor_distance {
                continue;
            }
            if let Some(tree_b) = &tree_b {
                let back = tree_b.nearest(da).map(|n| n.item.index);
                if back != Some(db.index) {
                    continue;
                }
            }
            pairs.push(PointPair::new(
                (da.center_x as f64, da.center_y as f64),
                (db.center_x as f64, db.center_y as f64),
            ));
        }

        log::debug!(
            "descriptor oracle: {} matches from {} samples of B",
            pairs.len(),
            descriptors_b.len()
        );
        Ok(pairs)
    }
}
