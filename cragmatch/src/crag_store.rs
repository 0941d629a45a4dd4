//! Filesystem layout of regions, crag images and their annotation documents.
//!
//! ```text
//! <root>/poland/jura/rzedkowice/
//!     okiennik.jpg
//!     okiennik.json
//! ```
//!
//! Regions are addressed by a single name in which `_` stands for the path separator,
//! so `poland_jura_rzedkowice` is the directory above.

use crate::annotation::AnnotationDocument;
use crate::error::{MatchError, MatchResult};
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

const REGION_SEPARATOR: char = '_';

/// `poland_jura` -> `poland/jura`.
pub fn region_to_path(region: &str) -> PathBuf {
    region.split(REGION_SEPARATOR).collect()
}

/// `poland/jura` -> `poland_jura`. Inverse of [`region_to_path`].
pub fn path_to_region(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// A crag image found in a region directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    /// File name without extension; also the crag name.
    pub name: String,
    /// Full path of the image file.
    pub path: PathBuf,
}

/// What is known about one crag: its annotations (if any were saved) and its image path.
#[derive(Debug, Clone, PartialEq)]
pub struct CragRecord {
    /// `None` when no annotation document has been saved yet.
    pub data: Option<AnnotationDocument>,
    /// Where the crag image is expected; it may not exist.
    pub image: PathBuf,
}

/// Regions and crags laid out under one root directory.
#[derive(Debug, Clone)]
pub struct CragStore {
    root: PathBuf,
}

impl CragStore {
    /// A store rooted at `root`. Nothing is touched on disk until a method needs it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory of `region` under the store root.
    pub fn region_dir(&self, region: &str) -> MatchResult<PathBuf> {
        validate_region(region)?;
        Ok(self.root.join(region_to_path(region)))
    }

    /// The `.jpg`/`.jpeg` files directly inside the region, sorted by file name.
    ///
    /// # Errors
    /// `StoreNotFound` when the region directory does not exist.
    pub fn list_images(&self, region: &str) -> MatchResult<Vec<StoredImage>> {
        let dir = self.region_dir(region)?;
        let entries = fs::read_dir(&dir).map_err(|e| not_found_or(e, &dir))?;

        let mut images = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || !is_jpeg(&path) {
                continue;
            }
            let Some(stem) = path.file_stem() else {
                continue;
            };
            images.push(StoredImage {
                name: stem.to_string_lossy().into_owned(),
                path,
            });
        }
        images.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        log::debug!("region {region}: {} images", images.len());
        Ok(images)
    }

    /// Reads `<crag>.json` from the region directory.
    ///
    /// # Errors
    /// `StoreNotFound` when the document is missing, `Json` when it does not parse.
    pub fn read_annotation(&self, region: &str, crag: &str) -> MatchResult<AnnotationDocument> {
        let path = self.crag_path(region, crag, "json")?;
        read_document(&path)
    }

    /// Reads the `.json` document that sits next to `image`.
    pub fn read_annotation_for_image(&self, image: &Path) -> MatchResult<AnnotationDocument> {
        read_document(&image.with_extension("json"))
    }

    /// Creates or replaces the annotation document of a crag.
    pub fn write_annotation(
        &self,
        region: &str,
        crag: &str,
        doc: &AnnotationDocument,
    ) -> MatchResult<()> {
        let path = self.crag_path(region, crag, "json")?;
        fs::write(&path, serde_json::to_vec_pretty(doc)?).map_err(|e| not_found_or(e, &path))?;
        log::info!("saved annotations of {crag} in {region}");
        Ok(())
    }

    /// # Errors
    /// `RegionExists` when the directory is already there.
    pub fn create_region(&self, region: &str) -> MatchResult<PathBuf> {
        let dir = self.region_dir(region)?;
        if dir.exists() {
            return Err(MatchError::RegionExists(region.to_string()));
        }
        fs::create_dir_all(&dir)?;
        log::info!("created region {region} at {}", dir.display());
        Ok(dir)
    }

    /// Stores a new crag image with a placeholder annotation document, creating the
    /// region on the way if needed.
    pub fn add_crag(&self, region: &str, crag: &str, image_bytes: &[u8]) -> MatchResult<PathBuf> {
        let dir = self.region_dir(region)?;
        validate_crag(crag)?;
        fs::create_dir_all(&dir)?;

        let json = dir.join(format!("{crag}.json"));
        fs::write(&json, serde_json::to_vec(&AnnotationDocument::placeholder(crag))?)?;
        let image = dir.join(format!("{crag}.jpg"));
        fs::write(&image, image_bytes)?;

        log::info!("added crag {crag} to {region}");
        Ok(image)
    }

    /// Missing annotations are not an error here; `data` is `None` instead.
    pub fn crag(&self, region: &str, crag: &str) -> MatchResult<CragRecord> {
        let data = match self.read_annotation(region, crag) {
            Ok(doc) => Some(doc),
            Err(e) if e.is_recoverable() => None,
            Err(e) => return Err(e),
        };
        Ok(CragRecord {
            data,
            image: self.crag_path(region, crag, "jpg")?,
        })
    }

    fn crag_path(&self, region: &str, crag: &str, extension: &str) -> MatchResult<PathBuf> {
        validate_crag(crag)?;
        Ok(self.region_dir(region)?.join(format!("{crag}.{extension}")))
    }
}

fn read_document(path: &Path) -> MatchResult<AnnotationDocument> {
    let text = fs::read_to_string(path).map_err(|e| not_found_or(e, path))?;
    Ok(serde_json::from_str(&text)?)
}

fn not_found_or(e: std::io::Error, path: &Path) -> MatchError {
    if e.kind() == ErrorKind::NotFound {
        MatchError::StoreNotFound(path.to_path_buf())
    } else {
        MatchError::Io(e)
    }
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

fn validate_region(region: &str) -> MatchResult<()> {
    if region.split(REGION_SEPARATOR).all(is_plain_segment) {
        Ok(())
    } else {
        Err(MatchError::InvalidName(region.to_string()))
    }
}

fn validate_crag(crag: &str) -> MatchResult<()> {
    if is_plain_segment(crag) {
        Ok(())
    } else {
        Err(MatchError::InvalidName(crag.to_string()))
    }
}
