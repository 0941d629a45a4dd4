use crate::correspondence::{CorrespondenceOracle, SharedOracle};
use crate::error::{MatchError, MatchResult};
use crate::image_frame::ImageFrame;
use crate::inlier_filter::InlierFilter;
use crate::point_pair::PointPair;
use serde::Serialize;
use std::path::PathBuf;

/// One stored image competing to be the best match for a query.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Identifier reported back to clients.
    pub id: String,
    pub frame: ImageFrame,
    /// The file the frame was decoded from, for candidates that come from a store.
    pub source: Option<PathBuf>,
}

impl Candidate {
    /// An in-memory candidate with no backing file.
    pub fn new(id: impl Into<String>, frame: ImageFrame) -> Self {
        Self {
            id: id.into(),
            frame,
            source: None,
        }
    }

    /// A candidate decoded from `path`; its id is the displayed path.
    pub fn from_file(path: PathBuf, frame: ImageFrame) -> Self {
        Self {
            id: path.display().to_string(),
            frame,
            source: Some(path),
        }
    }
}

/// The winning candidate and the filtered correspondences that made it win.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
    pub candidate_id: String,
    /// Position of the candidate in enumeration order.
    pub candidate_index: usize,
    /// Query-to-candidate inliers, in the order the oracle reported them.
    pub inlier_pairs: Vec<PointPair>,
}

impl CandidateMatch {
    pub fn score(&self) -> usize {
        self.inlier_pairs.len()
    }
}

/// One line of a full ranking, serialized as `{"candidate": .., "score": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateScore {
    #[serde(rename = "candidate")]
    pub candidate_id: String,
    /// Filtered inlier count; 0 when the candidate was not viable.
    pub score: usize,
}

/// Scores every candidate against a query by counting epipolar inliers and picks the best.
pub struct CandidateRanker<'a, O> {
    oracle: &'a SharedOracle<O>,
    filter: InlierFilter,
}

impl<'a, O: CorrespondenceOracle> CandidateRanker<'a, O> {
    pub fn new(oracle: &'a SharedOracle<O>, filter: InlierFilter) -> Self {
        Self { oracle, filter }
    }

    /// Returns the candidate with the most inliers. Ties go to the earlier candidate.
    ///
    /// Candidates that do not yield enough correspondences count as score 0; oracle
    /// failures abort the whole ranking.
    ///
    /// # Errors
    /// - `NoCandidates` when `candidates` is empty; the oracle is not called.
    /// - `NoViableMatch` when no candidate has a positive score.
    /// - Any oracle error, unchanged.
    pub fn rank(
        &self,
        query: &ImageFrame,
        candidates: &[Candidate],
    ) -> MatchResult<CandidateMatch> {
        if candidates.is_empty() {
            return Err(MatchError::NoCandidates);
        }

        let mut best: Option<CandidateMatch> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let inliers = self.inliers_for(query, candidate)?;
            let best_score = best.as_ref().map_or(0, CandidateMatch::score);
            if inliers.len() > best_score {
                best = Some(CandidateMatch {
                    candidate_id: candidate.id.clone(),
                    candidate_index: index,
                    inlier_pairs: inliers,
                });
            }
        }

        let best = best.ok_or(MatchError::NoViableMatch {
            evaluated: candidates.len(),
        })?;
        log::info!(
            "best match {} (#{}) with {} inliers out of {} candidates",
            best.candidate_id,
            best.candidate_index,
            best.score(),
            candidates.len()
        );
        Ok(best)
    }

    /// Scores of every candidate, in enumeration order.
    pub fn rank_all(
        &self,
        query: &ImageFrame,
        candidates: &[Candidate],
    ) -> MatchResult<Vec<CandidateScore>> {
        if candidates.is_empty() {
            return Err(MatchError::NoCandidates);
        }
        candidates
            .iter()
            .map(|candidate| {
                Ok(CandidateScore {
                    candidate_id: candidate.id.clone(),
                    score: self.inliers_for(query, candidate)?.len(),
                })
            })
            .collect()
    }

    fn inliers_for(
        &self,
        query: &ImageFrame,
        candidate: &Candidate,
    ) -> MatchResult<Vec<PointPair>> {
        let raw = self.oracle.correspond(query, &candidate.frame)?;
        match self.filter.filter(&raw) {
            Ok(outcome) => {
                log::debug!(
                    "candidate {}: {} raw, {} inliers",
                    candidate.id,
                    raw.len(),
                    outcome.score()
                );
                Ok(outcome.inliers)
            }
            Err(e) if e.is_candidate_insufficiency() => {
                log::warn!("candidate {} is not viable: {}", candidate.id, e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}
