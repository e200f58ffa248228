//! Run configuration.
//!
//! Defaults reproduce the classic generator settings: 3–10 objects,
//! 0.25 spacing, 50 local retries, 320×240 frames, five scenes per run.

use crate::geometry::Bounds;
use crate::orbit::{OrbitConfig, DEFAULT_MAX_POLAR};
use crate::placement::PlacementConfig;
use crate::relations::DEFAULT_EPS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("min_objects ({min}) must not exceed max_objects ({max})")]
    ObjectRange { min: usize, max: usize },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config {path}: {reason}")]
    Load { path: PathBuf, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

/// Input files and asset directories.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Base scene with ground plane, lights and camera
    pub base_scene: PathBuf,
    /// Catalog of shapes, colors, materials and sizes
    pub properties: PathBuf,
    /// Directory holding shape assets
    pub shape_dir: PathBuf,
    /// Directory holding material assets
    pub material_dir: PathBuf,
    /// Optional shape → allowed colors table
    pub shape_color_combos: Option<PathBuf>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            base_scene: PathBuf::from("data/base_scene.json"),
            properties: PathBuf::from("data/properties.json"),
            shape_dir: PathBuf::from("data/shapes"),
            material_dir: PathBuf::from("data/materials"),
            shape_color_combos: None,
        }
    }
}

/// Object count and placement constraints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    pub min_objects: usize,
    pub max_objects: usize,
    /// Minimum gap between object footprints
    pub min_dist: f32,
    /// Spacing along the cardinal directions, applied only with `enforce_margin`
    pub margin: f32,
    pub enforce_margin: bool,
    /// Visible pixels each object needs, applied only with `enforce_visibility`
    pub min_pixels_per_object: u32,
    pub enforce_visibility: bool,
    /// Candidates per slot before the whole layout restarts
    pub max_retries: u32,
    /// Full layout restarts before the scene fails
    pub max_restarts: u32,
    /// Scene rebuilds allowed when visibility enforcement rejects a layout
    pub max_scene_attempts: u32,
    /// Half-width of the square region object centers are drawn from
    pub placement_extent: f32,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            min_objects: 3,
            max_objects: 10,
            min_dist: 0.25,
            margin: 0.4,
            enforce_margin: false,
            min_pixels_per_object: 200,
            enforce_visibility: false,
            max_retries: 50,
            max_restarts: 1000,
            max_scene_attempts: 20,
            placement_extent: 3.0,
        }
    }
}

impl ObjectConfig {
    pub fn placement(&self) -> PlacementConfig {
        PlacementConfig {
            min_dist: self.min_dist,
            bounds: Bounds::square(self.placement_extent),
            max_local_retries: self.max_retries,
            max_restarts: self.max_restarts,
        }
    }
}

/// Camera orbit layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub num_cams: usize,
    pub num_heights: usize,
    pub radius: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            num_cams: 8,
            num_heights: 8,
            radius: 10.0,
        }
    }
}

impl CameraConfig {
    pub fn orbit(&self) -> OrbitConfig {
        OrbitConfig {
            radius: self.radius,
            num_cams: self.num_cams,
            num_heights: self.num_heights,
            max_polar: DEFAULT_MAX_POLAR,
        }
    }
}

/// Largest accepted image side in pixels.
pub const MAX_RESOLUTION: u32 = 16_384;

/// Image size and renderer quality knobs, forwarded to the scene graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub num_samples: u32,
    pub min_bounces: u32,
    pub max_bounces: u32,
    pub tile_size: u32,
    pub use_gpu: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            num_samples: 512,
            min_bounces: 8,
            max_bounces: 8,
            tile_size: 256,
            use_gpu: false,
        }
    }
}

/// Random offset magnitudes applied to the base scene lights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightJitter {
    pub key: f32,
    pub fill: f32,
    pub back: f32,
}

impl Default for LightJitter {
    fn default() -> Self {
        Self {
            key: 1.0,
            fill: 1.0,
            back: 1.0,
        }
    }
}

/// Where and how results are written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: PathBuf,
    pub filename_prefix: String,
    pub split: String,
    /// Index of the first scene, so runs can be spread across machines
    pub start_idx: usize,
    pub num_images: usize,
    /// Also write a snapshot of each finished scene graph
    pub save_snapshots: bool,
    pub version: String,
    pub license: String,
    pub date: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            filename_prefix: "CLEVR".to_string(),
            split: "new".to_string(),
            start_idx: 0,
            num_images: 5,
            save_snapshots: false,
            version: "1.0".to_string(),
            license: "Creative Commons Attribution (CC-BY 4.0)".to_string(),
            date: chrono::Local::now().format("%m/%d/%Y").to_string(),
        }
    }
}

impl OutputConfig {
    /// `<prefix>_<split>`, shared by scene directories and image names.
    pub fn stem(&self) -> String {
        format!("{}_{}", self.filename_prefix, self.split)
    }
}

/// Bounded retry policy for render calls.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before retry `n` is `n * backoff_ms`
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 250,
        }
    }
}

/// Complete configuration for a generation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub input: InputConfig,
    pub objects: ObjectConfig,
    pub camera: CameraConfig,
    pub render: RenderSettings,
    pub jitter: LightJitter,
    pub output: OutputConfig,
    pub retry: RetryPolicy,
    /// Slack for relationship inference
    pub eps: f32,
    /// Seed for reproducible runs; entropy when absent
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            objects: ObjectConfig::default(),
            camera: CameraConfig::default(),
            render: RenderSettings::default(),
            jitter: LightJitter::default(),
            output: OutputConfig::default(),
            retry: RetryPolicy::default(),
            eps: DEFAULT_EPS,
            seed: None,
        }
    }
}

impl GenerationConfig {
    /// Small, fast settings for smoke tests and previews.
    pub fn preview() -> Self {
        Self {
            objects: ObjectConfig {
                min_objects: 3,
                max_objects: 5,
                ..ObjectConfig::default()
            },
            render: RenderSettings {
                width: 160,
                height: 120,
                num_samples: 16,
                ..RenderSettings::default()
            },
            output: OutputConfig {
                num_images: 1,
                ..OutputConfig::default()
            },
            retry: RetryPolicy {
                max_attempts: 3,
                backoff_ms: 0,
            },
            ..Self::default()
        }
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let fail = |reason: String| ConfigError::Load {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| fail(e.to_string()))
    }

    /// Check every setting before anything touches the scene graph.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let o = &self.objects;
        if o.min_objects > o.max_objects {
            return Err(ConfigError::ObjectRange {
                min: o.min_objects,
                max: o.max_objects,
            });
        }
        if !o.min_dist.is_finite() || o.min_dist < 0.0 {
            return Err(invalid("min_dist", "must be a non-negative number"));
        }
        if !o.margin.is_finite() || o.margin < 0.0 {
            return Err(invalid("margin", "must be a non-negative number"));
        }
        if !o.placement_extent.is_finite() || o.placement_extent <= 0.0 {
            return Err(invalid("placement_extent", "must be positive"));
        }
        if o.max_scene_attempts == 0 {
            return Err(invalid("max_scene_attempts", "must be at least 1"));
        }

        self.camera
            .orbit()
            .validate()
            .map_err(|e| invalid("camera", e.to_string()))?;

        if self.render.width == 0 || self.render.height == 0 {
            return Err(invalid("resolution", "width and height must be non-zero"));
        }
        if self.render.width > MAX_RESOLUTION || self.render.height > MAX_RESOLUTION {
            return Err(invalid(
                "resolution",
                format!("width and height must not exceed {}", MAX_RESOLUTION),
            ));
        }
        if self.render.min_bounces > self.render.max_bounces {
            return Err(invalid("render_min_bounces", "must not exceed render_max_bounces"));
        }
        for (field, value) in [
            ("key_light_jitter", self.jitter.key),
            ("fill_light_jitter", self.jitter.fill),
            ("back_light_jitter", self.jitter.back),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, "must be a non-negative number"));
            }
        }

        if self.output.num_images == 0 {
            return Err(invalid("num_images", "must be at least 1"));
        }
        if self.output.filename_prefix.is_empty() {
            return Err(invalid("filename_prefix", "must not be empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("render_max_attempts", "must be at least 1"));
        }
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(invalid("eps", "must be a non-negative number"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GenerationConfig {
        GenerationConfig::default()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(valid().validate(), Ok(()));
        assert_eq!(GenerationConfig::preview().validate(), Ok(()));
    }

    #[test]
    fn test_defaults_match_generator() {
        let config = valid();
        assert_eq!(config.objects.min_objects, 3);
        assert_eq!(config.objects.max_objects, 10);
        assert_eq!(config.objects.max_retries, 50);
        assert!(!config.objects.enforce_visibility);
        assert!(!config.objects.enforce_margin);
        assert_eq!(config.render.width, 320);
        assert_eq!(config.render.height, 240);
        assert_eq!(config.output.stem(), "CLEVR_new");
        assert_eq!(config.output.num_images, 5);
        assert_eq!(config.eps, DEFAULT_EPS);
    }

    #[test]
    fn test_object_range_rejected() {
        let mut config = valid();
        config.objects.min_objects = 6;
        config.objects.max_objects = 2;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ObjectRange { min: 6, max: 2 })
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = valid();
        config.camera.num_heights = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "camera", .. })
        ));

        let mut config = valid();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.render.min_bounces = 9;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.render.width = 70_000;
        config.render.height = 70_000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "resolution", .. })
        ));

        let mut config = valid();
        config.render.width = MAX_RESOLUTION;
        config.render.height = 16;
        assert!(config.validate().is_ok());

        let mut config = valid();
        config.jitter.fill = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "fill_light_jitter",
                ..
            })
        ));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"objects": {"max_objects": 6}, "output": {"split": "train"}, "seed": 9}"#,
        )
        .unwrap();

        let config = GenerationConfig::load(&path).unwrap();
        assert_eq!(config.objects.max_objects, 6);
        assert_eq!(config.objects.min_objects, 3);
        assert_eq!(config.output.split, "train");
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.eps, DEFAULT_EPS);

        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            GenerationConfig::load(&path),
            Err(ConfigError::Load { .. })
        ));
    }

    #[test]
    fn test_placement_config_mapping() {
        let config = valid();
        let placement = config.objects.placement();
        assert_eq!(placement.min_dist, 0.25);
        assert_eq!(placement.max_local_retries, 50);
        assert_eq!(placement.bounds, Bounds::square(3.0));
    }
}
