use crate::annotation::AnnotationDocument;
use crate::annotation_remapper::remap_document;
use crate::candidate_ranker::{Candidate, CandidateRanker};
use crate::config::MatcherConfig;
use crate::correspondence::{CorrespondenceOracle, SharedOracle};
use crate::crag_store::CragStore;
use crate::error::{MatchError, MatchResult};
use crate::homography::{Homography, HomographyEstimator};
use crate::image_frame::ImageFrame;
use crate::inlier_filter::InlierFilter;
use crate::point_pair::PointPair;
use crate::response::{
    BestMatchResponse, FrameSize, MatchedImage, PairMatchResponse, RankingResponse,
};

/// Runs a query photo against stored crag images and registers it onto the winner.
///
/// The full request is:
/// 1. **Ranking**: every candidate is matched against the query by the correspondence
///    oracle and scored by its epipolar inlier count; the best one wins.
/// 2. **Registration**: a homography is fitted to the winner's inliers.
/// 3. **Annotation remapping**: the winner's stored annotations are rescaled into its
///    working resolution so they can be drawn with the homography.
///
/// Any failing stage fails the whole request; no partial response is produced.
pub struct MatchPipeline<O> {
    oracle: SharedOracle<O>,
    config: MatcherConfig,
}

impl<O: CorrespondenceOracle> MatchPipeline<O> {
    /// Wraps `oracle`; every stage reads its settings from `config`.
    pub fn new(oracle: SharedOracle<O>, config: MatcherConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn oracle(&self) -> &SharedOracle<O> {
        &self.oracle
    }

    fn ranker(&self) -> CandidateRanker<'_, O> {
        CandidateRanker::new(&self.oracle, InlierFilter::new(self.config.filter.clone()))
    }

    fn estimate(&self, pairs: &[PointPair]) -> MatchResult<Homography> {
        HomographyEstimator::new(self.config.homography.clone()).estimate(pairs)
    }

    /// Finds the best candidate for `query` and registers the query onto it.
    ///
    /// `annotations` is asked only for the winner.
    pub fn find_best_match(
        &self,
        query: &ImageFrame,
        candidates: &[Candidate],
        annotations: impl Fn(&Candidate) -> Option<AnnotationDocument>,
    ) -> MatchResult<BestMatchResponse> {
        self.best_match_with(query, candidates, |c| Ok(annotations(c)))
    }

    /// Like [`find_best_match`](Self::find_best_match) over every image stored in `region`.
    pub fn find_best_match_in_region(
        &self,
        store: &CragStore,
        region: &str,
        query: &ImageFrame,
    ) -> MatchResult<BestMatchResponse> {
        let candidates = self.load_candidates(store, region)?;
        self.best_match_with(query, &candidates, |winner| {
            let Some(image) = &winner.source else {
                return Ok(None);
            };
            match store.read_annotation_for_image(image) {
                Ok(doc) => Ok(Some(doc)),
                Err(e) if e.is_recoverable() => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    fn best_match_with(
        &self,
        query: &ImageFrame,
        candidates: &[Candidate],
        annotations: impl FnOnce(&Candidate) -> MatchResult<Option<AnnotationDocument>>,
    ) -> MatchResult<BestMatchResponse> {
        let best = self.ranker().rank(query, candidates)?;
        let winner = &candidates[best.candidate_index];
        let homography = self.estimate(&best.inlier_pairs)?;
        let document = annotations(winner)?.map(|doc| remap_document(&doc, &winner.frame));

        Ok(BestMatchResponse {
            image1: FrameSize::from(query),
            image2: MatchedImage::new(&winner.frame, winner.id.clone()),
            best_match_json_content: document,
            homography_matrix: homography.forward_row_major(),
            homography_matrix_inverse: homography.inverse_row_major(),
            score: best.score(),
            matched_points: best.inlier_pairs,
        })
    }

    /// Registers `frame1` onto `frame2` directly, without ranking.
    pub fn match_pair(
        &self,
        frame1: &ImageFrame,
        frame2: &ImageFrame,
    ) -> MatchResult<PairMatchResponse> {
        let raw = self.oracle.correspond(frame1, frame2)?;
        let inliers = InlierFilter::new(self.config.filter.clone()).filter(&raw)?.inliers;
        let homography = self.estimate(&inliers)?;
        log::info!("pair matched with {} of {} correspondences", inliers.len(), raw.len());

        Ok(PairMatchResponse {
            matched_points: inliers,
            image1: FrameSize::from(frame1),
            image2: FrameSize::from(frame2),
            homography_matrix: homography.forward_row_major(),
            homography_matrix_inverse: homography.inverse_row_major(),
        })
    }

    /// Scores `query` against every image in `region` and reports all the scores.
    pub fn rank_region(
        &self,
        store: &CragStore,
        region: &str,
        query: &ImageFrame,
    ) -> MatchResult<RankingResponse> {
        let candidates = self.load_candidates(store, region)?;
        let all_scores = self.ranker().rank_all(query, &candidates)?;

        let mut best: Option<(usize, usize)> = None;
        for (index, entry) in all_scores.iter().enumerate() {
            if entry.score > best.map_or(0, |(_, score)| score) {
                best = Some((index, entry.score));
            }
        }
        let (index, score) = best.ok_or(MatchError::NoViableMatch {
            evaluated: candidates.len(),
        })?;

        Ok(RankingResponse {
            best_match: all_scores[index].candidate_id.clone(),
            score,
            all_scores,
        })
    }

    /// Decodes every stored image of `region`, in store order.
    pub fn load_candidates(
        &self,
        store: &CragStore,
        region: &str,
    ) -> MatchResult<Vec<Candidate>> {
        let working_size = self.config.frame.working_size;
        store
            .list_images(region)?
            .into_iter()
            .map(|image| {
                let frame = ImageFrame::open(&image.path, working_size)?;
                Ok(Candidate::from_file(image.path, frame))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, PathPoint};
    use crate::test_support::{tagged_frame, two_view_pairs, StubOracle};
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn uniform_png(width: u32, height: u32, tag: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([tag, 0, 0, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    fn config() -> MatcherConfig {
        let mut config = MatcherConfig::default();
        config.frame.working_size = 16;
        config
    }

    fn pipeline(oracle: StubOracle) -> MatchPipeline<StubOracle> {
        MatchPipeline::new(SharedOracle::new(oracle), config())
    }

    /// Region `jura` with crags a, b, c tagged 10, 20, 30; b carries one route.
    fn seeded_store() -> (TempDir, CragStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CragStore::new(dir.path());
        for (name, tag) in [("c", 30), ("a", 10), ("b", 20)] {
            store.add_crag("jura", name, &uniform_png(48, 36, tag)).unwrap();
        }
        let doc = AnnotationDocument {
            name: Some("b".to_string()),
            crags: Some(vec![Annotation {
                name: Some("Rysa".to_string()),
                path: Some(vec![PathPoint(24.0, 18.0), PathPoint(48.0, 0.0)]),
                ..Annotation::default()
            }]),
            ..AnnotationDocument::default()
        };
        store.write_annotation("jura", "b", &doc).unwrap();
        (dir, store)
    }

    fn scored_oracle() -> StubOracle {
        StubOracle::new()
            .with_inliers(10, 12)
            .with_inliers(20, 47)
            .with_inliers(30, 9)
    }

    #[test]
    fn best_match_in_region_registers_and_remaps() {
        let (_dir, store) = seeded_store();
        let pipeline = pipeline(scored_oracle());

        let response = pipeline
            .find_best_match_in_region(&store, "jura", &tagged_frame(0))
            .unwrap();

        assert_eq!(response.score, 47);
        assert_eq!(response.matched_points.len(), 47);
        assert!(response.image2.path.ends_with("b.jpg"));
        assert_eq!((response.image2.width, response.image2.height), (16, 12));
        assert_eq!(
            (response.image2.original_width, response.image2.original_height),
            (48, 36)
        );
        assert_eq!((response.image1.width, response.image1.height), (8, 6));
        assert!(response.homography_matrix.iter().all(|v| v.is_finite()));
        assert!(response.homography_matrix_inverse.iter().all(|v| v.is_finite()));

        let doc = response.best_match_json_content.unwrap();
        let path = doc.crags.unwrap()[0].path.clone().unwrap();
        let expected = [PathPoint(8.0, 6.0), PathPoint(16.0, 0.0)];
        assert_eq!(path.len(), expected.len());
        for (got, want) in path.iter().zip(expected.iter()) {
            assert!((got.x() - want.x()).abs() < 1e-9 && (got.y() - want.y()).abs() < 1e-9);
        }

        // candidates are visited in file-name order
        assert_eq!(pipeline.oracle().with_oracle(|o| o.calls.clone()), vec![10, 20, 30]);
    }

    #[test]
    fn winner_without_annotations_reports_null() {
        let dir = tempfile::tempdir().unwrap();
        let store = CragStore::new(dir.path());
        let region = store.create_region("tatry").unwrap();
        fs::write(region.join("mnich.jpg"), uniform_png(20, 10, 20)).unwrap();

        let response = pipeline(scored_oracle())
            .find_best_match_in_region(&store, "tatry", &tagged_frame(0))
            .unwrap();
        assert!(response.best_match_json_content.is_none());
        assert_eq!(response.score, 47);
    }

    #[cfg(unix)]
    #[test]
    fn annotations_are_found_for_non_utf8_file_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CragStore::new(dir.path());
        let region = store.create_region("tatry").unwrap();
        let image = region.join(OsStr::from_bytes(b"mnich\xff.jpg"));
        fs::write(&image, uniform_png(20, 10, 20)).unwrap();
        fs::write(image.with_extension("json"), br#"{"name": "Mnich", "crags": []}"#).unwrap();

        let pipeline = pipeline(scored_oracle());
        let candidates = pipeline.load_candidates(&store, "tatry").unwrap();
        assert_eq!(candidates[0].source.as_deref(), Some(image.as_path()));

        let response = pipeline
            .find_best_match_in_region(&store, "tatry", &tagged_frame(0))
            .unwrap();
        let doc = response.best_match_json_content.unwrap();
        assert_eq!(doc.name.as_deref(), Some("Mnich"));
    }

    #[test]
    fn empty_region_has_no_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let store = CragStore::new(dir.path());
        store.create_region("empty").unwrap();
        let err = pipeline(scored_oracle())
            .find_best_match_in_region(&store, "empty", &tagged_frame(0))
            .unwrap_err();
        assert!(matches!(err, MatchError::NoCandidates));
    }

    #[test]
    fn in_memory_candidates_use_the_supplied_annotations() {
        let candidates = vec![
            Candidate::new("first", tagged_frame(1)),
            Candidate::new("second", tagged_frame(2)),
        ];
        let oracle = StubOracle::new().with_inliers(1, 9).with_inliers(2, 30);
        let asked = std::cell::RefCell::new(Vec::new());

        let response = pipeline(oracle)
            .find_best_match(&tagged_frame(0), &candidates, |c| {
                asked.borrow_mut().push(c.id.clone());
                None
            })
            .unwrap();
        assert_eq!(response.image2.path, "second");
        assert_eq!(response.score, 30);
        assert_eq!(asked.into_inner(), vec!["second".to_string()]);
    }

    #[test]
    fn planar_scene_yields_an_accurate_homography() {
        let truth = nalgebra::Matrix3::new(0.9, 0.05, 30.0, -0.04, 1.1, 12.0, 0.0001, 0.0002, 1.0);
        let pairs: Vec<PointPair> = (0..8)
            .flat_map(|i| (0..6).map(move |j| (i as f64 * 100.0 + 20.0, j as f64 * 90.0 + 15.0)))
            .map(|(x, y)| {
                let p = truth * nalgebra::Vector3::new(x, y, 1.0);
                PointPair::new((x, y), (p.x / p.z, p.y / p.z))
            })
            .collect();
        let oracle = StubOracle::new().with_pairs(5, pairs.clone());

        let response = pipeline(oracle)
            .match_pair(&tagged_frame(0), &tagged_frame(5))
            .unwrap();
        assert_eq!(response.matched_points.len(), pairs.len());
        let expected = [0.9, 0.05, 30.0, -0.04, 1.1, 12.0, 0.0001, 0.0002, 1.0];
        for (got, want) in response.homography_matrix.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
    }

    #[test]
    fn pair_with_too_few_correspondences_fails() {
        let oracle = StubOracle::new().with_pairs(5, two_view_pairs(6, 1));
        let err = pipeline(oracle)
            .match_pair(&tagged_frame(0), &tagged_frame(5))
            .unwrap_err();
        assert!(matches!(err, MatchError::InsufficientCorrespondences { actual: 6, .. }));
    }

    #[test]
    fn ranking_lists_every_score_in_store_order() {
        let (_dir, store) = seeded_store();
        let response = pipeline(scored_oracle())
            .rank_region(&store, "jura", &tagged_frame(0))
            .unwrap();
        assert!(response.best_match.ends_with("b.jpg"));
        assert_eq!(response.score, 47);
        let scores: Vec<usize> = response.all_scores.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![12, 47, 9]);
        assert!(response.all_scores[0].candidate_id.ends_with("a.jpg"));
    }

    #[test]
    fn ranking_without_any_viable_candidate_fails() {
        let (_dir, store) = seeded_store();
        let err = pipeline(StubOracle::new())
            .rank_region(&store, "jura", &tagged_frame(0))
            .unwrap_err();
        assert!(matches!(err, MatchError::NoViableMatch { evaluated: 3 }));
    }
}
