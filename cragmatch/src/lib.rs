//! # Cragmatch Library
//!
//! The `cragmatch` library finds which stored photo of a climbing crag best matches a
//! query photo, and registers the query onto it with a homography so that route
//! annotations drawn on the stored photo can be overlaid on the query.
//!
//! ## Overview of Modules
//!
//! - **`pipeline`**: Orchestrates a whole request: ranking candidates, fitting the
//!   homography for the winner and remapping its annotations.
//!
//! - **`image_frame`**: Decodes images and resizes them to the working resolution,
//!   remembering the original size.
//!
//! - **`correspondence`**: The `CorrespondenceOracle` trait every matcher implements,
//!   and `SharedOracle`, the lock-guarded handle through which it is used.
//!
//! - **`descriptor_oracle`**: A built-in oracle matching circular colour descriptors
//!   with a k-d tree. Needs no external model.
//!
//! - **`inlier_filter`**: Rejects gross mismatches with a robust fundamental-matrix fit.
//!
//! - **`candidate_ranker`**: Scores candidates by their inlier count and picks the best.
//!
//! - **`homography`**: Robust projective fit between two working spaces, and point
//!   projection in both directions.
//!
//! - **`annotation`** and **`annotation_remapper`**: The stored annotation documents and
//!   the coordinate transforms applied to them.
//!
//! - **`crag_store`**: Filesystem layout of regions, crag images and annotations.
//!
//! - **`response`**: The JSON shapes handed back to clients.
//!
//! - **`config`** and **`error`**: TOML-backed configuration and the error type.

pub mod annotation;
pub mod annotation_remapper;
pub mod candidate_ranker;
pub mod config;
pub mod correspondence;
pub mod crag_store;
pub mod descriptor_oracle;
pub mod error;
pub mod homography;
pub mod image_frame;
pub mod inlier_filter;
pub mod pipeline;
pub mod point_pair;
pub mod response;

// Internal Modules
mod circular_descriptor;
mod geometry;
mod ransac;

#[cfg(test)]
mod test_support;

pub use error::{MatchError, MatchResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
