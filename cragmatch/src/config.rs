use crate::error::{MatchError, MatchResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longer side, in pixels, of every frame fed to the correspondence oracle.
pub const DEFAULT_WORKING_SIZE: u32 = 840;

/// Complete matcher configuration.
///
/// Every section falls back to its defaults when absent, so a TOML file only
/// needs to list the values it changes:
///
/// ```
/// # use cragmatch::config::MatcherConfig;
/// let config = MatcherConfig::from_toml_str("[homography]\nreprojection_threshold = 3.0\n").unwrap();
/// assert_eq!(config.homography.reprojection_threshold, 3.0);
/// assert_eq!(config.frame.working_size, 840);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub frame: FrameConfig,
    pub filter: FilterConfig,
    pub homography: HomographyConfig,
    pub oracle: OracleConfig,
    pub descriptor: DescriptorConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Target length of the longer side after the uniform resize.
    pub working_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            working_size: DEFAULT_WORKING_SIZE,
        }
    }
}

/// Epipolar inlier filter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Maximum Sampson distance, in working-resolution pixels.
    pub threshold: f64,
    pub confidence: f64,
    pub max_iterations: usize,
    pub seed: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            confidence: 0.999_999,
            max_iterations: 10_000,
            seed: 0x5eed,
        }
    }
}

/// Robust homography fit parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomographyConfig {
    /// Maximum reprojection error, in working-resolution pixels.
    pub reprojection_threshold: f64,
    pub confidence: f64,
    pub max_iterations: usize,
    pub seed: u64,
}

impl Default for HomographyConfig {
    fn default() -> Self {
        Self {
            reprojection_threshold: 5.0,
            confidence: 0.995,
            max_iterations: 2_000,
            seed: 0x4077,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Give up waiting for the oracle after this long. `None` waits forever.
    pub lock_timeout_ms: Option<u64>,
}

/// Parameters of the built-in descriptor oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Spacing of the sampling lattice in pixels.
    pub stride: usize,
    /// Radius of the circular neighbourhood summarised by one descriptor.
    pub radius: usize,
    /// Descriptors whose colour centroid sits closer than this to the centre are skipped.
    pub min_contrast: f32,
    /// Matches whose descriptors are farther apart than this are dropped.
    pub max_descriptor_distance: f32,
    pub cross_check: bool,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            stride: 6,
            radius: 10,
            min_contrast: 0.15,
            max_descriptor_distance: 0.6,
            cross_check: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./images"),
        }
    }
}

impl MatcherConfig {
    pub fn from_toml_str(text: &str) -> MatchResult<Self> {
        toml::from_str(text).map_err(|e| MatchError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> MatchResult<String> {
        toml::to_string_pretty(self).map_err(|e| MatchError::Config(e.to_string()))
    }

    /// Loads a configuration file; a missing file is an error, not a silent default.
    pub fn load(path: &Path) -> MatchResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_constants() {
        let config = MatcherConfig::default();
        assert_eq!(config.frame.working_size, 840);
        assert_eq!(config.filter.threshold, 0.5);
        assert_eq!(config.filter.confidence, 0.999_999);
        assert_eq!(config.filter.max_iterations, 10_000);
        assert_eq!(config.homography.reprojection_threshold, 5.0);
        assert_eq!(config.oracle.lock_timeout_ms, None);
    }

    #[test]
    fn toml_round_trip_keeps_every_section() {
        let mut config = MatcherConfig::default();
        config.oracle.lock_timeout_ms = Some(250);
        config.store.root = PathBuf::from("/srv/crags");
        config.descriptor.cross_check = false;

        let text = config.to_toml_string().unwrap();
        let parsed = MatcherConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = MatcherConfig::from_toml_str("[filter\nthreshold = ").unwrap_err();
        assert!(matches!(err, MatchError::Config(_)));
    }
}
