//! bevy-scenegen: procedural multi-object scenes for visual-reasoning datasets
//!
//! Scatters randomly attributed objects over a ground plane without overlap,
//! renders each scene from a deterministic orbit of cameras, and records
//! ground truth for every frame: object attributes, 3D and pixel positions,
//! camera transforms and pairwise spatial relations ("left", "behind", ...).
//!
//! # Generating a dataset
//!
//! ```ignore
//! use bevy_scenegen::{GenerationConfig, RenderDriver, SoftwareSceneGraph};
//!
//! let mut config = GenerationConfig::default();
//! config.output.num_images = 10;
//! config.seed = Some(7);
//!
//! let mut driver = RenderDriver::from_config(config, SoftwareSceneGraph::new())?;
//! driver.run()?;
//! ```
//!
//! # Using the pieces directly
//!
//! ```ignore
//! use bevy_scenegen::{generate_orbit, infer_relationships, OrbitConfig, PlacementEngine};
//!
//! let poses = generate_orbit(&OrbitConfig::default(), |i| format!("view_{i:06}.png").into())?;
//! let layout = PlacementEngine::default().place(&[0.7, 0.35, 0.35], &mut rng)?;
//! ```
//!
//! Any 3D backend can be driven by implementing [`SceneGraph`];
//! [`SoftwareSceneGraph`] is a CPU rasterizer that needs no GPU or external tool.

pub mod attributes;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod error;
pub mod geometry;
pub mod manifest;
pub mod orbit;
pub mod placement;
pub mod relations;
pub mod render;
pub mod scene;

pub use attributes::{compute_collision_radius, AttributeBundle, AttributeSampler};
pub use batch::{DriverError, FrameState, RenderDriver, SceneOutput};
pub use catalog::{Catalog, CatalogError, ShapeColorRestriction};
pub use config::{GenerationConfig, RenderSettings, RetryPolicy};
pub use error::{Error, Result};
pub use manifest::{FrameRecord, OutputManifest, SceneRecord};
pub use orbit::{generate_orbit, CameraPose, OrbitConfig};
pub use placement::{Placement, PlacementEngine, PlacementError};
pub use relations::{directions_from_camera, infer_relationships, Directions, RelationshipTable};
pub use render::{CameraIntrinsics, SoftwareSceneGraph};
pub use scene::{ObjectHandle, PlacedObject, SceneAssembler, SceneGraph, SceneSpec};

// Re-export bevy math types for convenience
pub use bevy::prelude::{Quat, Transform, Vec2, Vec3};
