//! Scene description, the scene-graph collaborator seam, and scene assembly.
//!
//! [`SceneAssembler`] is the only component that mutates a [`SceneGraph`]
//! while a scene is being built. It holds the graph by `&mut` for the whole
//! scene, so nothing else can interleave edits.

use crate::attributes::{AttributeBundle, AttributeSampler};
use crate::catalog::{Catalog, CatalogError};
use crate::config::RenderSettings;
use crate::orbit::CameraPose;
use crate::placement::{Placement, PlacementEngine, PlacementError};
use crate::relations::{infer_relationships, Directions, RelationshipTable};
use bevy::math::Vec2;
use bevy::prelude::Vec3;
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Opaque reference to an object living in a scene graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(pub u64);

/// The three lights of the base scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Light {
    Key,
    Fill,
    Back,
}

impl Light {
    pub fn name(&self) -> &'static str {
        match self {
            Light::Key => "Lamp_Key",
            Light::Fill => "Lamp_Fill",
            Light::Back => "Lamp_Back",
        }
    }
}

#[derive(Debug, Error)]
pub enum SceneGraphError {
    #[error("failed to load base scene {path}: {reason}")]
    BaseScene { path: PathBuf, reason: String },

    #[error("unknown object handle {0:?}")]
    UnknownHandle(ObjectHandle),

    #[error("asset `{0}` not found")]
    AssetNotFound(String),

    #[error("no camera has been positioned")]
    NoCamera,

    #[error("render failed: {0}")]
    RenderFailed(String),

    #[error("`{0}` is not supported by this scene graph")]
    Unsupported(&'static str),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The 3D scene the generator drives.
///
/// Implementations own the actual scene (a DCC tool, a game engine world,
/// or the in-process [`SoftwareSceneGraph`](crate::render::SoftwareSceneGraph)).
pub trait SceneGraph {
    /// Replace the current scene with the base scene at `path`, dropping all objects.
    fn load_base_scene(&mut self, path: &Path) -> Result<(), SceneGraphError>;

    /// Make the materials in `material_dir` available to [`attach_material`](Self::attach_material).
    fn load_materials(&mut self, material_dir: &Path) -> Result<(), SceneGraphError>;

    fn configure_render(&mut self, settings: &RenderSettings) -> Result<(), SceneGraphError>;

    /// Move a base-scene light by `offset`.
    fn jitter_light(&mut self, light: Light, offset: Vec3) -> Result<(), SceneGraphError>;

    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), SceneGraphError>;

    /// Horizontal field of view of the scene camera in radians.
    fn camera_fov_x(&self) -> f32;

    /// Instance shape `shape_id` from `shape_dir`, scaled uniformly, standing
    /// on the ground at `location`.
    fn add_object(
        &mut self,
        shape_dir: &Path,
        shape_id: &str,
        scale: f32,
        location: Vec2,
        rotation_deg: f32,
    ) -> Result<ObjectHandle, SceneGraphError>;

    fn delete_object(&mut self, handle: ObjectHandle) -> Result<(), SceneGraphError>;

    fn attach_material(
        &mut self,
        material_id: &str,
        color: [f32; 4],
        handle: ObjectHandle,
    ) -> Result<(), SceneGraphError>;

    /// Pixel coordinates of `point` as seen from `camera`, `None` when behind it.
    fn project_to_pixels(&self, camera: &CameraPose, point: Vec3) -> Option<[f32; 2]>;

    /// Visible pixel count of each handle from the current camera.
    fn visible_pixel_counts(&mut self, _handles: &[ObjectHandle]) -> Result<Vec<u32>, SceneGraphError> {
        Err(SceneGraphError::Unsupported("visible_pixel_counts"))
    }

    fn render_current_view(&mut self, output_path: &Path) -> Result<(), SceneGraphError>;

    fn save_scene_snapshot(&self, path: &Path) -> Result<(), SceneGraphError>;
}

/// Ground truth for one placed object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedObject {
    pub shape: String,
    pub size: String,
    pub material: String,
    pub color: String,
    /// World position; `z` is the collision radius so the object rests on the ground
    #[serde(rename = "3d_coords")]
    pub position: [f32; 3],
    pub radius: f32,
    /// Degrees about the vertical axis
    pub rotation: f32,
    /// Projection under the reference camera
    pub pixel_coords: Option<[f32; 2]>,
}

impl PlacedObject {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// Everything known about one generated scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneSpec {
    pub split: String,
    pub image_index: usize,
    pub image_filename: Option<String>,
    pub objects: Vec<PlacedObject>,
    pub directions: Directions,
    pub relationships: RelationshipTable,
}

impl SceneSpec {
    pub fn new(split: impl Into<String>, image_index: usize) -> Self {
        Self {
            split: split.into(),
            image_index,
            ..Self::default()
        }
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.objects.iter().map(PlacedObject::position).collect()
    }

    /// Set the scene's reference directions. Later calls are ignored.
    pub fn set_directions(&mut self, directions: Directions) {
        if self.directions.is_empty() {
            self.directions = directions;
        } else {
            debug!("scene {} already has directions; keeping them", self.image_index);
        }
    }

    /// Infer and store pairwise relations for the current objects.
    pub fn compute_relationships(&mut self, eps: f32) -> &RelationshipTable {
        self.relationships = infer_relationships(&self.positions(), &self.directions, eps);
        &self.relationships
    }
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error("scene graph error: {0}")]
    SceneGraph(#[from] SceneGraphError),

    #[error("objects stayed occluded below {min_pixels} px after {attempts} attempts")]
    Occluded { attempts: u32, min_pixels: u32 },
}

/// Lifecycle of the objects an assembler has created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneState {
    /// No objects created
    Empty,
    /// Objects are being added
    Placing,
    /// Every slot has an object with its material
    Populated,
}

/// Scene assembly knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyOptions {
    pub shape_dir: PathBuf,
    pub enforce_visibility: bool,
    pub min_pixels_per_object: u32,
    pub max_scene_attempts: u32,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            shape_dir: PathBuf::from("data/shapes"),
            enforce_visibility: false,
            min_pixels_per_object: 200,
            max_scene_attempts: 20,
        }
    }
}

/// Catalog lookups for one slot, done before the graph is touched.
struct ResolvedSlot {
    shape_id: String,
    material_id: String,
    rgba: [f32; 4],
}

fn resolve(catalog: &Catalog, bundle: &AttributeBundle) -> Result<ResolvedSlot, CatalogError> {
    Ok(ResolvedSlot {
        shape_id: catalog.shapes().id(&bundle.shape)?.to_string(),
        material_id: catalog.materials().id(&bundle.material)?.to_string(),
        rgba: catalog.color_rgba(&bundle.color)?,
    })
}

/// Builds a scene's objects inside a borrowed scene graph.
pub struct SceneAssembler<'g> {
    graph: &'g mut dyn SceneGraph,
    handles: Vec<ObjectHandle>,
    state: SceneState,
}

impl<'g> SceneAssembler<'g> {
    pub fn new(graph: &'g mut dyn SceneGraph) -> Self {
        Self {
            graph,
            handles: Vec::new(),
            state: SceneState::Empty,
        }
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn handles(&self) -> &[ObjectHandle] {
        &self.handles
    }

    /// The borrowed graph, for camera moves and renders once the scene is built.
    pub fn graph(&mut self) -> &mut dyn SceneGraph {
        &mut *self.graph
    }

    /// Fill `spec` with `count` objects and create them in the graph.
    ///
    /// Attributes are drawn first so placement knows every slot's radius.
    /// `camera` is the reference camera used for pixel coordinates and, with
    /// visibility enforcement on, must already be set on the graph.
    pub fn assemble<R: Rng + ?Sized>(
        &mut self,
        spec: &mut SceneSpec,
        count: usize,
        sampler: &AttributeSampler<'_>,
        engine: &PlacementEngine,
        camera: &CameraPose,
        options: &AssemblyOptions,
        rng: &mut R,
    ) -> Result<(), AssemblyError> {
        if self.state != SceneState::Empty {
            self.teardown()?;
        }

        let attempts = if options.enforce_visibility {
            options.max_scene_attempts.max(1)
        } else {
            1
        };

        for attempt in 1..=attempts {
            spec.objects.clear();

            let bundles = sampler.sample_many(count, rng)?;
            let radii: Vec<f32> = bundles.iter().map(|b| b.radius).collect();
            let placements = engine.place(&radii, rng)?;
            let resolved = bundles
                .iter()
                .map(|b| resolve(sampler.catalog(), b))
                .collect::<Result<Vec<_>, _>>()?;

            self.state = SceneState::Placing;
            if let Err(e) = self.populate(spec, &bundles, &placements, &resolved, camera, options) {
                self.discard();
                spec.objects.clear();
                return Err(e.into());
            }
            self.state = SceneState::Populated;

            if !options.enforce_visibility {
                break;
            }

            let counts = match self.graph.visible_pixel_counts(&self.handles) {
                Ok(counts) => counts,
                Err(e) => {
                    self.discard();
                    spec.objects.clear();
                    return Err(e.into());
                }
            };
            let occluded = counts
                .iter()
                .filter(|&&c| c < options.min_pixels_per_object)
                .count();
            if occluded == 0 {
                break;
            }

            warn!(
                "{} of {} objects below {} visible px (attempt {}/{})",
                occluded, count, options.min_pixels_per_object, attempt, attempts
            );
            self.teardown()?;
            spec.objects.clear();
            if attempt == attempts {
                return Err(AssemblyError::Occluded {
                    attempts,
                    min_pixels: options.min_pixels_per_object,
                });
            }
        }

        info!("scene {}: placed {} objects", spec.image_index, spec.objects.len());
        Ok(())
    }

    fn populate(
        &mut self,
        spec: &mut SceneSpec,
        bundles: &[AttributeBundle],
        placements: &[Placement],
        resolved: &[ResolvedSlot],
        camera: &CameraPose,
        options: &AssemblyOptions,
    ) -> Result<(), SceneGraphError> {
        for ((bundle, placement), slot) in bundles.iter().zip(placements).zip(resolved) {
            let handle = self.graph.add_object(
                &options.shape_dir,
                &slot.shape_id,
                placement.radius,
                placement.position(),
                bundle.rotation_deg,
            )?;
            self.handles.push(handle);
            self.graph.attach_material(&slot.material_id, slot.rgba, handle)?;

            let position = Vec3::new(placement.x, placement.y, placement.radius);
            spec.objects.push(PlacedObject {
                shape: bundle.shape.clone(),
                size: bundle.size.clone(),
                material: bundle.material.clone(),
                color: bundle.color.clone(),
                position: position.to_array(),
                radius: placement.radius,
                rotation: bundle.rotation_deg,
                pixel_coords: self.graph.project_to_pixels(camera, position),
            });
        }
        Ok(())
    }

    /// Delete every object this assembler created.
    pub fn teardown(&mut self) -> Result<(), SceneGraphError> {
        while let Some(handle) = self.handles.pop() {
            self.graph.delete_object(handle)?;
        }
        self.state = SceneState::Empty;
        Ok(())
    }

    /// Best-effort teardown on an error path; the original error wins.
    fn discard(&mut self) {
        for handle in self.handles.drain(..).rev() {
            if let Err(e) = self.graph.delete_object(handle) {
                warn!("failed to delete {:?} during cleanup: {}", handle, e);
            }
        }
        self.state = SceneState::Empty;
    }
}
