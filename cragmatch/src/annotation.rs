//! Crag annotation documents, as stored next to each crag image.
//!
//! ```
//! # use cragmatch::annotation::AnnotationDocument;
//! let doc: AnnotationDocument = serde_json::from_str(
//!     r#"{"name": "Zegarowe", "crags": [{"name": "Rysa", "path": [[10, 20.5]], "grade": "VI.2"}]}"#,
//! ).unwrap();
//! let crag = &doc.crags.as_ref().unwrap()[0];
//! assert_eq!(crag.path.as_ref().unwrap()[0].x(), 10.0);
//! assert_eq!(crag.extra["grade"], "VI.2");
//! ```

use crate::point_pair::Point2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A polyline vertex, serialized as a two-element `[x, y]` array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint(pub f64, pub f64);

impl PathPoint {
    pub fn x(&self) -> f64 {
        self.0
    }

    pub fn y(&self) -> f64 {
        self.1
    }
}

impl From<PathPoint> for Point2 {
    fn from(p: PathPoint) -> Self {
        Point2::new(p.0, p.1)
    }
}

impl From<Point2> for PathPoint {
    fn from(p: Point2) -> Self {
        PathPoint(p.x, p.y)
    }
}

/// One annotated feature (usually a climbing route) on a crag image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathPoint>>,
    /// Fields this crate does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Annotation {
    pub fn with_path(&self, path: Vec<PathPoint>) -> Self {
        Self {
            path: Some(path),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crags: Option<Vec<Annotation>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotationDocument {
    /// The placeholder written when a crag is first added: `{"name": .., "path": []}`.
    pub fn placeholder(name: &str) -> Self {
        let mut extra = Map::new();
        extra.insert("path".to_string(), Value::Array(Vec::new()));
        Self {
            name: Some(name.to_string()),
            crags: None,
            extra,
        }
    }
}
