//! Render/persist driver: one assembled scene per image index, rendered from
//! every orbit pose.
//!
//! # Example
//!
//! ```ignore
//! use bevy_scenegen::{GenerationConfig, RenderDriver, SoftwareSceneGraph};
//!
//! let mut config = GenerationConfig::preview();
//! config.output.num_images = 4;
//! let mut driver = RenderDriver::from_config(config, SoftwareSceneGraph::new())?;
//! for scene in driver.run()? {
//!     println!("{}: {} frames", scene.scene_dir.display(), scene.manifest.frames.len());
//! }
//! ```
//!
//! Output layout per scene:
//!
//! ```text
//! <output_dir>/<prefix>_<split>_<index:06>/
//!     images/<prefix>_<split>_<view:06>.png
//!     images/transforms.json
//!     scene.json
//!     snapshot.json        (with save_snapshots)
//! ```

use crate::attributes::AttributeSampler;
use crate::catalog::{Catalog, CatalogError, ShapeColorRestriction};
use crate::config::{ConfigError, GenerationConfig, RetryPolicy};
use crate::geometry::jitter;
use crate::manifest::{
    DatasetInfo, FrameRecord, ManifestError, OutputManifest, SceneRecord, MANIFEST_FILE,
    SCENE_FILE, SNAPSHOT_FILE,
};
use crate::orbit::{generate_orbit, CameraPose, OrbitError};
use crate::placement::{MarginConstraint, PlacementEngine};
use crate::relations::{directions_from_camera, planar_directions};
use crate::scene::{
    AssemblyError, AssemblyOptions, Light, SceneAssembler, SceneGraph, SceneGraphError, SceneSpec,
};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("camera orbit error: {0}")]
    Orbit(#[from] OrbitError),

    #[error("scene assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("scene graph error: {0}")]
    SceneGraph(#[from] SceneGraphError),

    #[error("failed to write scene output: {0}")]
    Manifest(#[from] ManifestError),

    #[error("rendering {path} failed after {attempts} attempts: {source}")]
    RenderExhausted {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: SceneGraphError,
    },
}

/// Lifecycle of one frame within a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// Camera pose generated, not rendered yet
    Pending,
    /// Render call in flight
    Rendering { attempt: u32 },
    /// Image written to disk
    Rendered,
    /// Frame metadata appended to the manifest
    Recorded,
    /// Retries exhausted
    Failed,
}

/// Everything written for one scene.
#[derive(Clone, Debug)]
pub struct SceneOutput {
    pub scene_dir: PathBuf,
    pub manifest: OutputManifest,
    pub record: SceneRecord,
}

/// Directory name of scene `index`: `<stem>_<index:06>`.
pub fn scene_dir_name(stem: &str, index: usize) -> String {
    format!("{}_{:06}", stem, index)
}

/// Render the current view, retrying under `policy` with linear backoff.
///
/// Returns the number of attempts used.
pub fn render_with_retry(
    graph: &mut dyn SceneGraph,
    pose: &CameraPose,
    policy: &RetryPolicy,
    state: &mut FrameState,
) -> Result<u32, DriverError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        *state = FrameState::Rendering { attempt };
        match graph.render_current_view(&pose.file_path) {
            Ok(()) => {
                *state = FrameState::Rendered;
                return Ok(attempt);
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.backoff_ms * u64::from(attempt);
                warn!(
                    "render of {} failed (attempt {}/{}), retrying in {} ms: {}",
                    pose.file_path.display(),
                    attempt,
                    max_attempts,
                    delay,
                    e
                );
                if delay > 0 {
                    std::thread::sleep(Duration::from_millis(delay));
                }
            }
            Err(source) => {
                *state = FrameState::Failed;
                return Err(DriverError::RenderExhausted {
                    path: pose.file_path.clone(),
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}

/// Drives scene assembly and rendering over a run.
pub struct RenderDriver<G: SceneGraph> {
    /// Run configuration
    pub config: GenerationConfig,
    /// States of the frames of the current (or last) scene
    pub frame_states: Vec<FrameState>,
    /// Frames rendered and recorded so far
    pub frames_rendered: usize,
    /// Render calls that failed and were retried
    pub render_retries: usize,
    /// Scenes fully written
    pub scenes_completed: usize,
    catalog: Catalog,
    restriction: Option<ShapeColorRestriction>,
    graph: G,
    rng: StdRng,
}

impl<G: SceneGraph> RenderDriver<G> {
    /// Validate `config` and set up a driver over an already loaded catalog.
    pub fn new(
        config: GenerationConfig,
        catalog: Catalog,
        restriction: Option<ShapeColorRestriction>,
        graph: G,
    ) -> Result<Self, DriverError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            frame_states: Vec::new(),
            frames_rendered: 0,
            render_retries: 0,
            scenes_completed: 0,
            catalog,
            restriction,
            graph,
            rng,
        })
    }

    /// Load the catalog files named in `config.input` and set up a driver.
    pub fn from_config(config: GenerationConfig, graph: G) -> Result<Self, DriverError> {
        config.validate()?;
        let catalog = Catalog::load(&config.input.properties)?;
        let restriction = match &config.input.shape_color_combos {
            Some(path) => Some(ShapeColorRestriction::load(path, &catalog)?),
            None => None,
        };
        Self::new(config, catalog, restriction, graph)
    }

    /// The scene graph the driver renders through.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Generate every scene of the run, stopping at the first error.
    pub fn run(&mut self) -> Result<Vec<SceneOutput>, DriverError> {
        let start = self.config.output.start_idx;
        let end = start + self.config.output.num_images;
        let started = Instant::now();

        let mut outputs = Vec::with_capacity(self.config.output.num_images);
        for image_index in start..end {
            outputs.push(self.render_scene(image_index)?);
            info!(
                "scene {} done ({}/{}, {:.1}s elapsed)",
                image_index,
                image_index - start + 1,
                end - start,
                started.elapsed().as_secs_f32()
            );
        }
        Ok(outputs)
    }

    /// Assemble, render and persist the scene for `image_index`.
    pub fn render_scene(&mut self, image_index: usize) -> Result<SceneOutput, DriverError> {
        let config = &self.config;
        let stem = config.output.stem();
        let scene_dir = config.output.output_dir.join(scene_dir_name(&stem, image_index));
        let images_dir = scene_dir.join("images");
        info!("scene {} -> {}", image_index, scene_dir.display());

        self.graph.load_base_scene(&config.input.base_scene)?;
        self.graph.load_materials(&config.input.material_dir)?;
        self.graph.configure_render(&config.render)?;
        for (light, magnitude) in [
            (Light::Key, config.jitter.key),
            (Light::Fill, config.jitter.fill),
            (Light::Back, config.jitter.back),
        ] {
            if magnitude > 0.0 {
                let offset = jitter(&mut self.rng, magnitude);
                self.graph.jitter_light(light, offset)?;
            }
        }

        let poses = generate_orbit(&config.camera.orbit(), |view| {
            images_dir.join(format!("{}_{:06}.png", stem, view))
        })?;
        let reference = poses.first().ok_or(OrbitError::NoCameras)?;
        self.graph.set_camera(reference)?;
        let directions = directions_from_camera(&reference.transform);

        let objects = &config.objects;
        let count = self.rng.gen_range(objects.min_objects..=objects.max_objects);
        let mut engine = PlacementEngine::new(objects.placement());
        if objects.enforce_margin {
            engine = engine.with_margin(MarginConstraint {
                margin: objects.margin,
                directions: planar_directions(&directions),
            });
        }
        let options = AssemblyOptions {
            shape_dir: config.input.shape_dir.clone(),
            enforce_visibility: objects.enforce_visibility,
            min_pixels_per_object: objects.min_pixels_per_object,
            max_scene_attempts: objects.max_scene_attempts,
        };
        let sampler = AttributeSampler::new(&self.catalog, self.restriction.as_ref());

        let mut spec = SceneSpec::new(config.output.split.clone(), image_index);
        spec.image_filename = Some(FrameRecord::from_pose(reference, &scene_dir).file_path);

        let mut assembler = SceneAssembler::new(&mut self.graph);
        assembler.assemble(&mut spec, count, &sampler, &engine, reference, &options, &mut self.rng)?;

        spec.set_directions(directions);
        spec.compute_relationships(config.eps);
        debug!(
            "scene {}: {} objects, relations {:?}",
            image_index,
            spec.objects.len(),
            spec.relationships.keys().collect::<Vec<_>>()
        );

        let info = DatasetInfo::from(&config.output);
        let graph = assembler.graph();
        let mut manifest = OutputManifest::new(graph.camera_fov_x(), info.clone(), image_index);
        self.frame_states = vec![FrameState::Pending; poses.len()];
        for pose in &poses {
            graph.set_camera(pose)?;
            let attempts = render_with_retry(graph, pose, &config.retry, &mut self.frame_states[pose.index])?;
            self.render_retries += (attempts - 1) as usize;

            manifest.push(FrameRecord::from_pose(pose, &scene_dir));
            self.frame_states[pose.index] = FrameState::Recorded;
            self.frames_rendered += 1;
        }

        manifest.save(images_dir.join(MANIFEST_FILE))?;
        let record = SceneRecord::from_spec(&spec, info);
        record.save(scene_dir.join(SCENE_FILE))?;
        if config.output.save_snapshots {
            graph.save_scene_snapshot(&scene_dir.join(SNAPSHOT_FILE))?;
        }

        self.scenes_completed += 1;
        Ok(SceneOutput {
            scene_dir,
            manifest,
            record,
        })
    }
}
