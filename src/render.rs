//! In-process scene graph backed by a small CPU rasterizer.
//!
//! Objects are drawn as depth-tested, Lambert-shaded spheres of their
//! collision radius over an infinite ground plane. Metal materials get a
//! specular highlight from the key light. This is enough to produce
//! recognisable frames and exact per-object visibility counts without an
//! external 3D package.

use crate::config::RenderSettings;
use crate::orbit::CameraPose;
use crate::scene::{Light, ObjectHandle, SceneGraph, SceneGraphError};
use bevy::math::Vec2;
use bevy::prelude::{Transform, Vec3};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Horizontal field of view of a 35 mm lens on a 32 mm sensor, in radians.
pub const DEFAULT_FOV_X: f32 = 0.857_556;

const NEAR_PLANE: f32 = 1e-3;
const AMBIENT: f32 = 0.25;
const SKY_COLOR: [f32; 3] = [0.05, 0.05, 0.06];

/// Pinhole intrinsics for an image of `image_size` pixels.
///
/// Points are given in the optical frame: x right, y down, z forward.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in pixels (fx, fy)
    pub focal_length: [f32; 2],
    /// Principal point (cx, cy), the image center
    pub principal_point: [f32; 2],
    /// Image dimensions (width, height)
    pub image_size: [u32; 2],
}

impl CameraIntrinsics {
    /// Square pixels with the given horizontal field of view.
    pub fn from_fov(fov_x: f32, width: u32, height: u32) -> Self {
        let fx = width as f32 / 2.0 / (fov_x / 2.0).tan();
        Self {
            focal_length: [fx, fx],
            principal_point: [width as f32 / 2.0, height as f32 / 2.0],
            image_size: [width, height],
        }
    }

    /// Project an optical-frame point to pixel coordinates.
    pub fn project(&self, point: Vec3) -> Option<[f32; 2]> {
        if point.z <= NEAR_PLANE {
            return None;
        }
        let x = point.x / point.z * self.focal_length[0] + self.principal_point[0];
        let y = point.y / point.z * self.focal_length[1] + self.principal_point[1];
        Some([x, y])
    }

    /// Optical-frame point at `depth` along the ray through `pixel`.
    pub fn unproject(&self, pixel: [f32; 2], depth: f32) -> Vec3 {
        let x = (pixel[0] - self.principal_point[0]) / self.focal_length[0] * depth;
        let y = (pixel[1] - self.principal_point[1]) / self.focal_length[1] * depth;
        Vec3::new(x, y, depth)
    }
}

/// Express a world point in the optical frame of `camera`.
///
/// Bevy cameras look down -Z with +Y up; the optical frame flips both.
pub fn world_to_optical(camera: &Transform, point: Vec3) -> Vec3 {
    let local = camera.compute_matrix().inverse().transform_point3(point);
    Vec3::new(local.x, -local.y, -local.z)
}

fn optical_to_world_dir(camera: &Transform, dir: Vec3) -> Vec3 {
    camera.rotation * Vec3::new(dir.x, -dir.y, -dir.z)
}

/// Light positions of the base scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaseLights {
    /// Main light; the rasterizer shades with this one
    pub key: [f32; 3],
    pub fill: [f32; 3],
    pub back: [f32; 3],
}

impl Default for BaseLights {
    fn default() -> Self {
        Self {
            key: [6.45, -2.91, 4.26],
            fill: [-4.67, -4.01, 3.01],
            back: [-1.17, 2.65, 5.82],
        }
    }
}

fn default_fov() -> f32 {
    DEFAULT_FOV_X
}

fn default_ground() -> [f32; 3] {
    [0.55, 0.55, 0.55]
}

/// Base scene file: camera lens, ground color and lights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaseScene {
    /// Horizontal field of view in radians
    #[serde(default = "default_fov")]
    pub camera_fov_x: f32,
    /// Linear RGB of the ground plane
    #[serde(default = "default_ground")]
    pub ground_color: [f32; 3],
    #[serde(default)]
    pub lights: BaseLights,
}

impl Default for BaseScene {
    fn default() -> Self {
        Self {
            camera_fov_x: DEFAULT_FOV_X,
            ground_color: default_ground(),
            lights: BaseLights::default(),
        }
    }
}

impl BaseScene {
    /// Load a base scene file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, SceneGraphError> {
        let fail = |reason: String| SceneGraphError::BaseScene {
            path: path.to_path_buf(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let scene: BaseScene = serde_json::from_str(&content).map_err(|e| fail(e.to_string()))?;
        if !(scene.camera_fov_x > 0.0 && scene.camera_fov_x < std::f32::consts::PI) {
            return Err(fail(format!("camera_fov_x out of range: {}", scene.camera_fov_x)));
        }
        Ok(scene)
    }

    fn light_mut(&mut self, light: Light) -> &mut [f32; 3] {
        match light {
            Light::Key => &mut self.lights.key,
            Light::Fill => &mut self.lights.fill,
            Light::Back => &mut self.lights.back,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct SceneObject {
    handle: ObjectHandle,
    shape_id: String,
    scale: f32,
    location: [f32; 2],
    rotation_deg: f32,
    material: Option<String>,
    color: [f32; 4],
}

impl SceneObject {
    fn center(&self) -> Vec3 {
        Vec3::new(self.location[0], self.location[1], self.scale)
    }

    fn is_metal(&self) -> bool {
        self.material
            .as_deref()
            .is_some_and(|m| m.to_ascii_lowercase().contains("metal"))
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    base: &'a BaseScene,
    render: &'a RenderSettings,
    camera: Option<[[f32; 4]; 4]>,
    objects: &'a [SceneObject],
}

/// One rasterized frame.
#[derive(Clone, Debug)]
pub struct RenderOutput {
    /// RGBA pixel data in row-major order (width * height * 4 bytes)
    pub rgba: Vec<u8>,
    /// Optical depth per pixel; `f32::INFINITY` where nothing was hit
    pub depth: Vec<f32>,
    /// Object covering each pixel
    pub ids: Vec<Option<ObjectHandle>>,
    pub width: u32,
    pub height: u32,
    /// Intrinsics the frame was rendered with
    pub intrinsics: CameraIntrinsics,
}

impl RenderOutput {
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// RGBA at pixel (x, y), or `None` outside the frame.
    pub fn get_rgba(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let i = self.index(x, y)? * 4;
        Some([self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]])
    }

    /// Optical depth at pixel (x, y), or `None` outside the frame.
    pub fn get_depth(&self, x: u32, y: u32) -> Option<f32> {
        self.index(x, y).map(|i| self.depth[i])
    }

    /// Object visible at pixel (x, y), if any.
    pub fn object_at(&self, x: u32, y: u32) -> Option<ObjectHandle> {
        self.index(x, y).and_then(|i| self.ids[i])
    }

    /// Pixels showing each of `handles`, in order.
    pub fn visible_counts(&self, handles: &[ObjectHandle]) -> Vec<u32> {
        handles
            .iter()
            .map(|h| self.ids.iter().filter(|id| id.as_ref() == Some(h)).count() as u32)
            .collect()
    }
}

fn to_u8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// File stems in `dir`, or `None` when the directory does not exist.
fn asset_stems(dir: &Path) -> Result<Option<BTreeSet<String>>, SceneGraphError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let io = |source| SceneGraphError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut stems = BTreeSet::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            stems.insert(stem.to_string());
        }
    }
    Ok(Some(stems))
}

fn ensure_parent(path: &Path) -> Result<(), SceneGraphError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| SceneGraphError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// CPU scene graph.
///
/// Asset directories are optional: when `shape_dir` or the material
/// directory exists, ids must match a file stem inside it.
#[derive(Clone, Debug, Default)]
pub struct SoftwareSceneGraph {
    base: BaseScene,
    settings: RenderSettings,
    camera: Option<Transform>,
    objects: Vec<SceneObject>,
    next_handle: u64,
    materials: Option<BTreeSet<String>>,
}

impl SoftwareSceneGraph {
    /// Empty graph with the default base scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty graph over an in-memory base scene, skipping `load_base_scene`.
    pub fn with_base(base: BaseScene) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Current base scene, including any light jitter.
    pub fn base(&self) -> &BaseScene {
        &self.base
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Intrinsics for the configured resolution and the base scene lens.
    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::from_fov(self.base.camera_fov_x, self.settings.width, self.settings.height)
    }

    fn find(&mut self, handle: ObjectHandle) -> Result<&mut SceneObject, SceneGraphError> {
        self.objects
            .iter_mut()
            .find(|o| o.handle == handle)
            .ok_or(SceneGraphError::UnknownHandle(handle))
    }

    /// Rasterize the current camera view.
    pub fn render_to_buffer(&self) -> Result<RenderOutput, SceneGraphError> {
        let camera = self.camera.ok_or(SceneGraphError::NoCamera)?;
        let intrinsics = self.intrinsics();
        let (width, height) = (self.settings.width, self.settings.height);
        let n = width as usize * height as usize;

        let mut rgba = vec![0u8; n * 4];
        let mut depth = vec![f32::INFINITY; n];
        let mut ids = vec![None; n];

        let key = Vec3::from_array(self.base.lights.key);
        let ground = Vec3::from_array(self.base.ground_color);

        for y in 0..height {
            for x in 0..width {
                let i = y as usize * width as usize + x as usize;
                let ray = optical_to_world_dir(
                    &camera,
                    intrinsics.unproject([x as f32 + 0.5, y as f32 + 0.5], 1.0),
                );
                let color = if ray.z < -1e-6 {
                    let t = -camera.translation.z / ray.z;
                    let hit = camera.translation + ray * t;
                    depth[i] = t;
                    let lambert = (key - hit).normalize_or_zero().z.max(0.0);
                    ground * (AMBIENT + (1.0 - AMBIENT) * lambert)
                } else {
                    Vec3::from_array(SKY_COLOR)
                };
                rgba[i * 4..i * 4 + 4].copy_from_slice(&[to_u8(color.x), to_u8(color.y), to_u8(color.z), 255]);
            }
        }

        let key_optical = world_to_optical(&camera, key);
        for object in &self.objects {
            let center = world_to_optical(&camera, object.center());
            let Some([cx, cy]) = intrinsics.project(center) else {
                continue;
            };
            let r_px = intrinsics.focal_length[0] * object.scale / center.z;
            if r_px < 0.5 {
                continue;
            }
            let x0 = (cx - r_px).floor().max(0.0) as u32;
            let y0 = (cy - r_px).floor().max(0.0) as u32;
            let x1 = ((cx + r_px).ceil() as i64).clamp(0, width as i64) as u32;
            let y1 = ((cy + r_px).ceil() as i64).clamp(0, height as i64) as u32;

            let base = Vec3::new(object.color[0], object.color[1], object.color[2]);
            let metal = object.is_metal();
            for y in y0..y1 {
                for x in x0..x1 {
                    let dx = (x as f32 + 0.5 - cx) / r_px;
                    let dy = (y as f32 + 0.5 - cy) / r_px;
                    let d2 = dx * dx + dy * dy;
                    if d2 > 1.0 {
                        continue;
                    }
                    let dz = (1.0 - d2).sqrt();
                    let z = center.z - dz * object.scale;
                    let i = y as usize * width as usize + x as usize;
                    if z >= depth[i] {
                        continue;
                    }
                    depth[i] = z;
                    ids[i] = Some(object.handle);

                    let normal = Vec3::new(dx, dy, -dz);
                    let surface = center + normal * object.scale;
                    let to_light = (key_optical - surface).normalize_or_zero();
                    let lambert = normal.dot(to_light).max(0.0);
                    let mut color = base * (AMBIENT + (1.0 - AMBIENT) * lambert);
                    if metal {
                        let to_eye = (-surface).normalize_or_zero();
                        let half = (to_light + to_eye).normalize_or_zero();
                        color += Vec3::splat(0.6 * normal.dot(half).max(0.0).powf(32.0));
                    }
                    rgba[i * 4..i * 4 + 4].copy_from_slice(&[
                        to_u8(color.x),
                        to_u8(color.y),
                        to_u8(color.z),
                        255,
                    ]);
                }
            }
        }

        Ok(RenderOutput {
            rgba,
            depth,
            ids,
            width,
            height,
            intrinsics,
        })
    }
}

impl SceneGraph for SoftwareSceneGraph {
    fn load_base_scene(&mut self, path: &Path) -> Result<(), SceneGraphError> {
        self.base = BaseScene::load(path)?;
        self.objects.clear();
        self.camera = None;
        debug!("loaded base scene {}", path.display());
        Ok(())
    }

    fn load_materials(&mut self, material_dir: &Path) -> Result<(), SceneGraphError> {
        self.materials = asset_stems(material_dir)?;
        if let Some(materials) = &self.materials {
            debug!("{} materials in {}", materials.len(), material_dir.display());
        }
        Ok(())
    }

    fn configure_render(&mut self, settings: &RenderSettings) -> Result<(), SceneGraphError> {
        debug!(
            "{}x{} frames; samples={} bounces={}..{} tile={} gpu={} have no effect on the rasterizer",
            settings.width,
            settings.height,
            settings.num_samples,
            settings.min_bounces,
            settings.max_bounces,
            settings.tile_size,
            settings.use_gpu
        );
        self.settings = settings.clone();
        Ok(())
    }

    fn jitter_light(&mut self, light: Light, offset: Vec3) -> Result<(), SceneGraphError> {
        let position = self.base.light_mut(light);
        *position = (Vec3::from_array(*position) + offset).to_array();
        trace!("{} moved to {:?}", light.name(), position);
        Ok(())
    }

    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), SceneGraphError> {
        self.camera = Some(pose.transform);
        Ok(())
    }

    fn camera_fov_x(&self) -> f32 {
        self.base.camera_fov_x
    }

    fn add_object(
        &mut self,
        shape_dir: &Path,
        shape_id: &str,
        scale: f32,
        location: Vec2,
        rotation_deg: f32,
    ) -> Result<ObjectHandle, SceneGraphError> {
        if let Some(shapes) = asset_stems(shape_dir)? {
            if !shapes.contains(shape_id) {
                return Err(SceneGraphError::AssetNotFound(
                    shape_dir.join(shape_id).display().to_string(),
                ));
            }
        }
        let handle = ObjectHandle(self.next_handle);
        self.next_handle += 1;
        self.objects.push(SceneObject {
            handle,
            shape_id: shape_id.to_string(),
            scale,
            location: location.to_array(),
            rotation_deg,
            material: None,
            color: [1.0; 4],
        });
        Ok(handle)
    }

    fn delete_object(&mut self, handle: ObjectHandle) -> Result<(), SceneGraphError> {
        let index = self
            .objects
            .iter()
            .position(|o| o.handle == handle)
            .ok_or(SceneGraphError::UnknownHandle(handle))?;
        self.objects.remove(index);
        Ok(())
    }

    fn attach_material(
        &mut self,
        material_id: &str,
        color: [f32; 4],
        handle: ObjectHandle,
    ) -> Result<(), SceneGraphError> {
        if let Some(materials) = &self.materials {
            if !materials.contains(material_id) {
                return Err(SceneGraphError::AssetNotFound(material_id.to_string()));
            }
        }
        let object = self.find(handle)?;
        object.material = Some(material_id.to_string());
        object.color = color;
        Ok(())
    }

    fn project_to_pixels(&self, camera: &CameraPose, point: Vec3) -> Option<[f32; 2]> {
        self.intrinsics()
            .project(world_to_optical(&camera.transform, point))
    }

    fn visible_pixel_counts(&mut self, handles: &[ObjectHandle]) -> Result<Vec<u32>, SceneGraphError> {
        Ok(self.render_to_buffer()?.visible_counts(handles))
    }

    fn render_current_view(&mut self, output_path: &Path) -> Result<(), SceneGraphError> {
        let output = self.render_to_buffer()?;
        ensure_parent(output_path)?;
        let image = image::RgbaImage::from_raw(output.width, output.height, output.rgba)
            .ok_or_else(|| SceneGraphError::RenderFailed("pixel buffer size mismatch".to_string()))?;
        image
            .save(output_path)
            .map_err(|e| SceneGraphError::RenderFailed(format!("{}: {}", output_path.display(), e)))?;
        trace!("wrote {}", output_path.display());
        Ok(())
    }

    fn save_scene_snapshot(&self, path: &Path) -> Result<(), SceneGraphError> {
        let snapshot = Snapshot {
            base: &self.base,
            render: &self.settings,
            camera: self
                .camera
                .map(|t| t.compute_matrix().transpose().to_cols_array_2d()),
            objects: &self.objects,
        };
        let io = |source| SceneGraphError::Io {
            path: PathBuf::from(path),
            source,
        };
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        ensure_parent(path)?;
        fs::write(path, json).map_err(io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbit::{generate_orbit, OrbitConfig};
    use tempfile::TempDir;

    fn top_down() -> CameraPose {
        let config = OrbitConfig {
            num_cams: 1,
            num_heights: 1,
            max_polar: 0.01,
            ..OrbitConfig::default()
        };
        generate_orbit(&config, |_| PathBuf::from("view.png")).unwrap().remove(0)
    }

    fn small_graph() -> SoftwareSceneGraph {
        let mut graph = SoftwareSceneGraph::new();
        graph
            .configure_render(&RenderSettings {
                width: 64,
                height: 48,
                ..RenderSettings::default()
            })
            .unwrap();
        graph
    }

    #[test]
    fn test_intrinsics_project_unproject() {
        let intrinsics = CameraIntrinsics::from_fov(DEFAULT_FOV_X, 320, 240);
        let point = Vec3::new(0.3, -0.2, 4.0);
        let pixel = intrinsics.project(point).unwrap();
        let back = intrinsics.unproject(pixel, 4.0);
        assert!(back.distance(point) < 1e-4);
        assert!(intrinsics.project(Vec3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn test_origin_projects_to_center() {
        let graph = small_graph();
        let pose = top_down();
        let [x, y] = graph.project_to_pixels(&pose, Vec3::ZERO).unwrap();
        assert!((x - 32.0).abs() < 0.5, "x = {}", x);
        assert!((y - 24.0).abs() < 0.5, "y = {}", y);
    }

    #[test]
    fn test_render_requires_camera() {
        let graph = small_graph();
        assert!(matches!(graph.render_to_buffer(), Err(SceneGraphError::NoCamera)));
    }

    #[test]
    fn test_nearer_object_occludes() {
        let mut graph = small_graph();
        let pose = top_down();
        graph.set_camera(&pose).unwrap();

        let low = graph
            .add_object(Path::new("missing"), "sphere", 0.5, Vec2::ZERO, 0.0)
            .unwrap();
        let output = graph.render_to_buffer().unwrap();
        let alone = output.visible_counts(&[low])[0];
        assert!(alone > 0);

        // Same footprint center, bigger and closer to the camera
        let high = graph
            .add_object(Path::new("missing"), "sphere", 1.0, Vec2::ZERO, 0.0)
            .unwrap();
        let counts = graph.visible_pixel_counts(&[low, high]).unwrap();
        assert_eq!(counts[0], 0);
        assert!(counts[1] > alone);
        assert_eq!(graph.render_to_buffer().unwrap().object_at(32, 24), Some(high));
    }

    #[test]
    fn test_buffer_accessors() {
        let base = BaseScene {
            ground_color: [0.0, 1.0, 0.0],
            ..BaseScene::default()
        };
        let mut graph = SoftwareSceneGraph::with_base(base);
        graph
            .configure_render(&RenderSettings {
                width: 64,
                height: 48,
                ..RenderSettings::default()
            })
            .unwrap();
        graph.set_camera(&top_down()).unwrap();

        let empty = graph.render_to_buffer().unwrap();
        assert_eq!(empty.rgba.len(), 64 * 48 * 4);
        let ground = empty.get_rgba(32, 24).unwrap();
        assert!(ground[1] > ground[0] && ground[1] > ground[2], "ground is green, got {:?}", ground);
        assert_eq!(ground[3], 255);
        let ground_depth = empty.get_depth(32, 24).unwrap();
        assert!((ground_depth - 10.0).abs() < 0.1, "depth {}", ground_depth);
        assert!(empty.get_rgba(64, 0).is_none());
        assert!(empty.get_depth(0, 48).is_none());
        assert!(empty.object_at(32, 24).is_none());

        graph
            .add_object(Path::new("missing"), "sphere", 0.5, Vec2::ZERO, 0.0)
            .unwrap();
        let depth = graph.render_to_buffer().unwrap().get_depth(32, 24).unwrap();
        assert!((depth - 9.0).abs() < 0.1, "top of the sphere at depth {}", depth);
    }

    #[test]
    fn test_delete_and_unknown_handle() {
        let mut graph = small_graph();
        let handle = graph
            .add_object(Path::new("missing"), "cube", 0.5, Vec2::new(1.0, 1.0), 45.0)
            .unwrap();
        graph.delete_object(handle).unwrap();
        assert_eq!(graph.object_count(), 0);
        assert!(matches!(
            graph.delete_object(handle),
            Err(SceneGraphError::UnknownHandle(_))
        ));
        assert!(graph.attach_material("Rubber", [1.0; 4], handle).is_err());
    }

    #[test]
    fn test_asset_directories_validate_ids() {
        let dir = TempDir::new().unwrap();
        let shapes = dir.path().join("shapes");
        let materials = dir.path().join("materials");
        fs::create_dir_all(&shapes).unwrap();
        fs::create_dir_all(&materials).unwrap();
        fs::write(shapes.join("Sphere.blend"), b"").unwrap();
        fs::write(materials.join("Rubber.blend"), b"").unwrap();

        let mut graph = small_graph();
        graph.load_materials(&materials).unwrap();
        let handle = graph.add_object(&shapes, "Sphere", 0.5, Vec2::ZERO, 0.0).unwrap();
        assert!(graph.add_object(&shapes, "Torus", 0.5, Vec2::ZERO, 0.0).is_err());
        graph.attach_material("Rubber", [1.0, 0.0, 0.0, 1.0], handle).unwrap();
        assert!(matches!(
            graph.attach_material("Glass", [1.0; 4], handle),
            Err(SceneGraphError::AssetNotFound(_))
        ));
    }

    #[test]
    fn test_render_writes_png_and_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut graph = small_graph();
        graph.set_camera(&top_down()).unwrap();
        let handle = graph
            .add_object(Path::new("missing"), "sphere", 0.7, Vec2::ZERO, 0.0)
            .unwrap();
        graph.attach_material("MyMetal", [0.1, 0.1, 0.9, 1.0], handle).unwrap();

        let png = dir.path().join("images").join("frame.png");
        graph.render_current_view(&png).unwrap();
        let img = image::open(&png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (64, 48));
        let center = img.get_pixel(32, 24);
        assert!(center[2] > center[0], "object should be blue, got {:?}", center);

        let snapshot = dir.path().join("snapshot.json");
        graph.save_scene_snapshot(&snapshot).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&snapshot).unwrap()).unwrap();
        assert_eq!(json["objects"].as_array().unwrap().len(), 1);
        assert_eq!(json["objects"][0]["material"], "MyMetal");
    }

    #[test]
    fn test_base_scene_load_and_jitter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base.json");
        fs::write(&path, r#"{"ground_color": [0.2, 0.3, 0.4]}"#).unwrap();

        let mut graph = SoftwareSceneGraph::new();
        graph.load_base_scene(&path).unwrap();
        assert_eq!(graph.base().ground_color, [0.2, 0.3, 0.4]);
        assert_eq!(graph.camera_fov_x(), DEFAULT_FOV_X);

        graph.jitter_light(Light::Fill, Vec3::new(1.0, 0.0, -1.0)).unwrap();
        let fill = Vec3::from_array(graph.base().lights.fill);
        assert!(fill.distance(Vec3::new(-3.67, -4.01, 2.01)) < 1e-5);

        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            graph.load_base_scene(&path),
            Err(SceneGraphError::BaseScene { .. })
        ));
    }
}
