//! JSON shapes returned to clients.

use crate::annotation::AnnotationDocument;
use crate::candidate_ranker::CandidateScore;
use crate::crag_store::CragRecord;
use crate::image_frame::ImageFrame;
use crate::point_pair::PointPair;
use serde::Serialize;
use std::path::PathBuf;

/// Working-resolution size of a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSize {
    /// Working width in pixels.
    pub width: u32,
    /// Working height in pixels.
    pub height: u32,
}

impl From<&ImageFrame> for FrameSize {
    fn from(frame: &ImageFrame) -> Self {
        Self {
            width: frame.working_width(),
            height: frame.working_height(),
        }
    }
}

/// Working and original size of the matched stored image, plus where it lives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedImage {
    /// Working width in pixels.
    pub width: u32,
    /// Working height in pixels.
    pub height: u32,
    /// Width of the stored file.
    pub original_width: u32,
    /// Height of the stored file.
    pub original_height: u32,
    /// Where the stored image lives, or the caller's id for in-memory candidates.
    pub path: String,
}

impl MatchedImage {
    pub fn new(frame: &ImageFrame, path: impl Into<String>) -> Self {
        Self {
            width: frame.working_width(),
            height: frame.working_height(),
            original_width: frame.original_width(),
            original_height: frame.original_height(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestMatchResponse {
    pub matched_points: Vec<PointPair>,
    pub image1: FrameSize,
    pub image2: MatchedImage,
    /// The winner's annotations in its working space, or `null` when it has none.
    pub best_match_json_content: Option<AnnotationDocument>,
    pub homography_matrix: [f64; 9],
    pub homography_matrix_inverse: [f64; 9],
    pub score: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairMatchResponse {
    pub matched_points: Vec<PointPair>,
    pub image1: FrameSize,
    pub image2: FrameSize,
    pub homography_matrix: [f64; 9],
    pub homography_matrix_inverse: [f64; 9],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingResponse {
    pub best_match: String,
    pub score: usize,
    pub all_scores: Vec<CandidateScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CragResponse {
    pub data: Option<AnnotationDocument>,
    pub image: PathBuf,
}

impl From<CragRecord> for CragResponse {
    fn from(record: CragRecord) -> Self {
        Self {
            data: record.data,
            image: record.image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}
