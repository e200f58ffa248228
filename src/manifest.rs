//! Per-scene output records.
//!
//! Each scene directory holds two JSON files:
//!
//! - `images/transforms.json` ([`OutputManifest`]): lens angle plus one
//!   [`FrameRecord`] per rendered view
//! - `scene.json` ([`SceneRecord`]): ground-truth objects, directions and
//!   pairwise relationships
//!
//! ```ignore
//! use bevy_scenegen::manifest::{OutputManifest, SceneRecord};
//!
//! let manifest = OutputManifest::load("output/CLEVR_new_000000/images/transforms.json")?;
//! let scene = SceneRecord::load("output/CLEVR_new_000000/scene.json")?;
//! ```

use crate::config::OutputConfig;
use crate::orbit::CameraPose;
use crate::relations::{Directions, RelationshipTable};
use crate::scene::{PlacedObject, SceneSpec};
use bevy::prelude::Vec3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Camera manifest, inside each scene's `images/` directory
pub const MANIFEST_FILE: &str = "transforms.json";
/// Ground-truth record, at the scene directory root
pub const SCENE_FILE: &str = "scene.json";
/// Optional scene graph snapshot
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Errors reading or writing output records.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ManifestError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ManifestError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, json).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ManifestError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Dataset-wide fields stamped on every record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub split: String,
    pub date: String,
    pub version: String,
    pub license: String,
}

impl From<&OutputConfig> for DatasetInfo {
    fn from(output: &OutputConfig) -> Self {
        Self {
            split: output.split.clone(),
            date: output.date.clone(),
            version: output.version.clone(),
            license: output.license.clone(),
        }
    }
}

/// One rendered view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Image path relative to the scene directory
    pub file_path: String,
    /// Azimuth step of the view's tier in radians
    pub rotation: f32,
    /// Camera-to-world matrix, row-major
    pub transform_matrix: [[f32; 4]; 4],
}

impl FrameRecord {
    /// Build a record for `pose`, storing its image path relative to `scene_dir`.
    pub fn from_pose(pose: &CameraPose, scene_dir: &Path) -> Self {
        let relative = pose.file_path.strip_prefix(scene_dir).unwrap_or(&pose.file_path);
        Self {
            file_path: relative.to_string_lossy().replace('\\', "/"),
            rotation: pose.rotation,
            transform_matrix: pose.transform_matrix(),
        }
    }
}

/// Camera metadata for every view of one scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputManifest {
    /// Horizontal field of view in radians
    pub camera_angle_x: f32,
    #[serde(flatten)]
    pub info: DatasetInfo,
    pub image_index: usize,
    /// Views in render order
    pub frames: Vec<FrameRecord>,
}

impl OutputManifest {
    /// Empty manifest for scene `image_index`.
    pub fn new(camera_angle_x: f32, info: DatasetInfo, image_index: usize) -> Self {
        Self {
            camera_angle_x,
            info,
            image_index,
            frames: Vec::new(),
        }
    }

    /// Append a frame once its image is on disk.
    pub fn push(&mut self, frame: FrameRecord) {
        self.frames.push(frame);
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ManifestError> {
        write_json(path.as_ref(), self)
    }

    /// Read a manifest written by [`OutputManifest::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        read_json(path.as_ref())
    }
}

/// Ground truth for one scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    #[serde(flatten)]
    pub info: DatasetInfo,
    pub image_index: usize,
    /// Reference view, relative to the scene directory
    pub image_filename: Option<String>,
    pub objects: Vec<PlacedObject>,
    /// Unit directions from the reference camera
    pub directions: BTreeMap<String, [f32; 3]>,
    pub relationships: RelationshipTable,
}

impl SceneRecord {
    /// Snapshot a scene for serialization.
    pub fn from_spec(spec: &SceneSpec, info: DatasetInfo) -> Self {
        Self {
            info,
            image_index: spec.image_index,
            image_filename: spec.image_filename.clone(),
            objects: spec.objects.clone(),
            directions: spec
                .directions
                .iter()
                .map(|(name, dir)| (name.clone(), dir.to_array()))
                .collect(),
            relationships: spec.relationships.clone(),
        }
    }

    /// Rebuild the in-memory scene, e.g. to recompute relations with another `eps`.
    pub fn to_spec(&self) -> SceneSpec {
        SceneSpec {
            split: self.info.split.clone(),
            image_index: self.image_index,
            image_filename: self.image_filename.clone(),
            objects: self.objects.clone(),
            directions: self
                .directions
                .iter()
                .map(|(name, dir)| (name.clone(), Vec3::from_array(*dir)))
                .collect::<Directions>(),
            relationships: self.relationships.clone(),
        }
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ManifestError> {
        write_json(path.as_ref(), self)
    }

    /// Read a record written by [`SceneRecord::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        read_json(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbit::{generate_orbit, OrbitConfig};
    use crate::relations::directions_from_camera;
    use tempfile::TempDir;

    fn info() -> DatasetInfo {
        DatasetInfo {
            split: "val".to_string(),
            date: "01/02/2026".to_string(),
            version: "1.0".to_string(),
            license: "CC-BY".to_string(),
        }
    }

    fn spec() -> SceneSpec {
        let pose = generate_orbit(&OrbitConfig::default(), |_| PathBuf::new())
            .unwrap()
            .remove(0);
        let mut spec = SceneSpec::new("val", 7);
        spec.image_filename = Some("CLEVR_val_000007".to_string());
        spec.objects.push(PlacedObject {
            shape: "cube".to_string(),
            size: "large".to_string(),
            material: "metal".to_string(),
            color: "red".to_string(),
            position: [1.0, -1.0, 0.49],
            radius: 0.49,
            rotation: 12.5,
            pixel_coords: Some([100.0, 80.0]),
        });
        spec.objects.push(PlacedObject {
            shape: "sphere".to_string(),
            size: "small".to_string(),
            material: "rubber".to_string(),
            color: "blue".to_string(),
            position: [-1.5, 0.5, 0.35],
            radius: 0.35,
            rotation: 300.0,
            pixel_coords: None,
        });
        spec.set_directions(directions_from_camera(&pose.transform));
        spec.compute_relationships(0.2);
        spec
    }

    #[test]
    fn test_frame_record_relative_path() {
        let scene_dir = PathBuf::from("/out/CLEVR_new_000000");
        let pose = generate_orbit(&OrbitConfig::default(), |i| {
            scene_dir.join("images").join(format!("CLEVR_new_{:06}.png", i))
        })
        .unwrap()
        .remove(3);
        let frame = FrameRecord::from_pose(&pose, &scene_dir);
        assert_eq!(frame.file_path, "images/CLEVR_new_000003.png");
        assert_eq!(frame.rotation, pose.rotation);
        assert_eq!(frame.transform_matrix, pose.transform_matrix());
    }

    #[test]
    fn test_manifest_json_layout() {
        let mut manifest = OutputManifest::new(0.857, info(), 4);
        manifest.push(FrameRecord {
            file_path: "images/a.png".to_string(),
            rotation: 0.785,
            transform_matrix: [[0.0; 4]; 4],
        });
        let json = serde_json::to_value(&manifest).unwrap();
        assert!(json["camera_angle_x"].is_number());
        assert_eq!(json["split"], "val");
        assert_eq!(json["frames"][0]["file_path"], "images/a.png");
        assert_eq!(json["frames"][0]["transform_matrix"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_manifest_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("images").join(MANIFEST_FILE);
        let mut manifest = OutputManifest::new(0.5, info(), 0);
        manifest.push(FrameRecord {
            file_path: "images/b.png".to_string(),
            rotation: 1.0,
            transform_matrix: [[1.0, 0.0, 0.0, 2.0], [0.0, 1.0, 0.0, 3.0], [0.0, 0.0, 1.0, 4.0], [0.0, 0.0, 0.0, 1.0]],
        });
        manifest.save(&path).unwrap();
        assert_eq!(OutputManifest::load(&path).unwrap(), manifest);
    }

    #[test]
    fn test_scene_record_keys() {
        let record = SceneRecord::from_spec(&spec(), info());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["image_index"], 7);
        assert_eq!(json["objects"][0]["3d_coords"][2].as_f64().unwrap() as f32, 0.49);
        assert!(json["objects"][1]["pixel_coords"].is_null());
        assert_eq!(json["relationships"].as_object().unwrap().len(), 4);
        assert_eq!(json["directions"].as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_scene_record_restores_spec() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SCENE_FILE);
        let original = spec();
        SceneRecord::from_spec(&original, info()).save(&path).unwrap();

        let restored = SceneRecord::load(&path).unwrap().to_spec();
        assert_eq!(restored.objects, original.objects);
        assert_eq!(restored.relationships, original.relationships);
        assert_eq!(restored.split, "val");
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            SceneRecord::load(&missing),
            Err(ManifestError::NotFound(_))
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{").unwrap();
        assert!(matches!(
            OutputManifest::load(&bad),
            Err(ManifestError::Json { .. })
        ));
    }
}
