use std::path::PathBuf;
use thiserror::Error;

/// Every way a matching request, a fitting step or a store access can fail.
///
/// None of these are transient: they come from bad input or genuine data
/// insufficiency, so callers never retry automatically.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The image bytes could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// A pixel buffer does not have the length its dimensions imply.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    InvalidFrame { expected: usize, actual: usize },

    /// Working and original dimensions are zero or not related by one uniform scale factor.
    #[error(
        "working size {}x{} is not a uniform resize of {}x{}",
        .working.0,
        .working.1,
        .original.0,
        .original.1
    )]
    InvalidDimensions {
        original: (u32, u32),
        working: (u32, u32),
    },

    /// Too few raw correspondences for the epipolar consistency model.
    #[error("inlier filter needs at least {required} correspondences, got {actual}")]
    InsufficientCorrespondences { required: usize, actual: usize },

    /// Sample consensus could not fit a single model from the data.
    #[error("no consensus model could be fitted")]
    NoConsensus,

    /// Too few point pairs for a projective fit.
    #[error("homography needs at least {required} point pairs, got {actual}")]
    InsufficientPairs { required: usize, actual: usize },

    /// The candidate set was empty.
    #[error("no candidate images to compare against")]
    NoCandidates,

    /// Every candidate failed filtering or produced no inliers.
    #[error("none of the {evaluated} candidates produced a viable match")]
    NoViableMatch { evaluated: usize },

    /// The fitted transform is numerically singular.
    #[error("degenerate homography: {0}")]
    DegenerateHomography(String),

    /// A point projected to infinity (w' ~ 0).
    #[error("point ({x}, {y}) projects to infinity")]
    ProjectionDegenerate { x: f64, y: f64 },

    /// The requested region, crag or annotation document does not exist.
    #[error("not found in store: {}", .0.display())]
    StoreNotFound(PathBuf),

    /// A region that should be created already exists.
    #[error("region already exists: {0}")]
    RegionExists(String),

    /// A region or crag name would escape the store root.
    #[error("invalid region or crag name: {0:?}")]
    InvalidName(String),

    /// The correspondence oracle could not be acquired in time.
    #[error("correspondence oracle is busy")]
    Busy,

    /// The correspondence oracle reported a failure.
    #[error("correspondence oracle failed: {0}")]
    Oracle(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The configuration could not be parsed or written.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MatchError {
    /// `StoreNotFound` is an expected condition ("no annotation data"), the rest are hard failures.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MatchError::StoreNotFound(_))
    }

    /// Failures that make a single ranking candidate non-viable without aborting the ranking.
    pub fn is_candidate_insufficiency(&self) -> bool {
        matches!(
            self,
            MatchError::InsufficientCorrespondences { .. } | MatchError::NoConsensus
        )
    }
}

impl From<image::ImageError> for MatchError {
    fn from(err: image::ImageError) -> Self {
        MatchError::Decode(err.to_string())
    }
}

pub type MatchResult<T> = Result<T, MatchError>;
