//! Carries annotation geometry between coordinate spaces.
//!
//! Stored annotations are drawn on the original-resolution image. The matcher works
//! at the working resolution, so paths are first rescaled with the owning image's own
//! resize ratios, and can then be carried to the other image through a [`Homography`].

use crate::annotation::{Annotation, AnnotationDocument, PathPoint};
use crate::error::MatchResult;
use crate::homography::{Homography, ProjectionDirection};
use crate::image_frame::ImageFrame;

/// Original-resolution path of `annotation` rescaled into the working space of `owner`.
pub fn remap(annotation: &Annotation, owner: &ImageFrame) -> Annotation {
    let sx = owner.working_width() as f64 / owner.original_width() as f64;
    let sy = owner.working_height() as f64 / owner.original_height() as f64;
    rescale(annotation, sx, sy)
}

/// Inverse of [`remap`]: working space of `owner` back to its original resolution.
pub fn restore(annotation: &Annotation, owner: &ImageFrame) -> Annotation {
    let sx = owner.original_width() as f64 / owner.working_width() as f64;
    let sy = owner.original_height() as f64 / owner.working_height() as f64;
    rescale(annotation, sx, sy)
}

/// Applies [`remap`] to every crag that has a path; everything else is copied as is.
pub fn remap_document(doc: &AnnotationDocument, owner: &ImageFrame) -> AnnotationDocument {
    AnnotationDocument {
        crags: doc
            .crags
            .as_ref()
            .map(|crags| crags.iter().map(|c| remap(c, owner)).collect()),
        ..doc.clone()
    }
}

fn rescale(annotation: &Annotation, sx: f64, sy: f64) -> Annotation {
    match &annotation.path {
        Some(path) => annotation.with_path(
            path.iter()
                .map(|p| PathPoint(p.x() * sx, p.y() * sy))
                .collect(),
        ),
        None => annotation.clone(),
    }
}

/// Projects working-space points through `homography`.
///
/// # Errors
/// `ProjectionDegenerate` if any point maps to infinity; no partial result is returned.
pub fn project(
    points: &[PathPoint],
    homography: &Homography,
    direction: ProjectionDirection,
) -> MatchResult<Vec<PathPoint>> {
    points
        .iter()
        .map(|&p| homography.project(p.into(), direction).map(PathPoint::from))
        .collect()
}

pub fn project_annotation(
    annotation: &Annotation,
    homography: &Homography,
    direction: ProjectionDirection,
) -> MatchResult<Annotation> {
    match &annotation.path {
        Some(path) => Ok(annotation.with_path(project(path, homography, direction)?)),
        None => Ok(annotation.clone()),
    }
}
