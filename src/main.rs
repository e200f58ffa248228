//! Generate a dataset of multi-object scenes.
//!
//! Usage:
//!   cargo run --release -- --num-images 10 --num-cams 8 --output-dir output
//!   cargo run --release -- --config run.json --seed 3
//!
//! Every option overrides the matching field of `--config` (or the built-in
//! defaults when no config file is given).

use bevy_scenegen::{GenerationConfig, RenderDriver, SoftwareSceneGraph};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bevy-scenegen", version, about = "Render synthetic multi-object scenes with ground truth")]
struct Args {
    /// JSON config file; other options override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base scene with ground plane, lights and camera
    #[arg(long)]
    base_scene: Option<PathBuf>,
    /// JSON file defining shapes, colors, materials and sizes
    #[arg(long)]
    properties_json: Option<PathBuf>,
    /// Directory holding shape assets
    #[arg(long)]
    shape_dir: Option<PathBuf>,
    /// Directory holding material assets
    #[arg(long)]
    material_dir: Option<PathBuf>,
    /// JSON file mapping shape names to their allowed color names
    #[arg(long)]
    shape_color_combos_json: Option<PathBuf>,

    /// Minimum number of objects per scene
    #[arg(long)]
    min_objects: Option<usize>,
    /// Maximum number of objects per scene
    #[arg(long)]
    max_objects: Option<usize>,
    /// Minimum gap between object footprints
    #[arg(long)]
    min_dist: Option<f32>,
    /// Spacing along left/right/front/behind, with --enforce-margin
    #[arg(long)]
    margin: Option<f32>,
    /// Reject layouts that break --margin
    #[arg(long)]
    enforce_margin: bool,
    /// Visible pixels each object needs, with --enforce-visibility
    #[arg(long)]
    min_pixels_per_object: Option<u32>,
    /// Rebuild scenes whose objects are occluded
    #[arg(long)]
    enforce_visibility: bool,
    /// Tries per object before the whole layout restarts
    #[arg(long)]
    max_retries: Option<u32>,
    /// Layout restarts before a scene fails
    #[arg(long)]
    max_restarts: Option<u32>,
    /// Scene rebuilds allowed by --enforce-visibility
    #[arg(long)]
    max_scene_attempts: Option<u32>,

    /// Index of the first scene, for spreading a run across machines
    #[arg(long)]
    start_idx: Option<usize>,
    /// Number of scenes to generate
    #[arg(long)]
    num_images: Option<usize>,
    /// Cameras per scene
    #[arg(long)]
    num_cams: Option<usize>,
    /// Height tiers the cameras are split over
    #[arg(long)]
    num_heights: Option<usize>,
    /// Distance from each camera to the scene origin
    #[arg(long)]
    camera_radius: Option<f32>,

    /// Prefix for scene directories and image names
    #[arg(long)]
    filename_prefix: Option<String>,
    /// Split name stored in every record
    #[arg(long)]
    split: Option<String>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Also save a snapshot of each scene graph
    #[arg(long)]
    save_snapshots: bool,
    /// Value of the "version" field
    #[arg(long = "dataset-version")]
    dataset_version: Option<String>,
    /// Value of the "license" field
    #[arg(long)]
    license: Option<String>,
    /// Value of the "date" field; defaults to today
    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    use_gpu: bool,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    key_light_jitter: Option<f32>,
    #[arg(long)]
    fill_light_jitter: Option<f32>,
    #[arg(long)]
    back_light_jitter: Option<f32>,
    #[arg(long)]
    render_num_samples: Option<u32>,
    #[arg(long)]
    render_min_bounces: Option<u32>,
    #[arg(long)]
    render_max_bounces: Option<u32>,
    #[arg(long)]
    render_tile_size: Option<u32>,
    /// Render attempts per frame before the run fails
    #[arg(long)]
    render_max_attempts: Option<u32>,
    /// Backoff step between render attempts
    #[arg(long)]
    render_backoff_ms: Option<u64>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
    /// Slack for spatial relations
    #[arg(long)]
    eps: Option<f32>,
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

impl Args {
    fn into_config(self) -> bevy_scenegen::Result<GenerationConfig> {
        let mut config = match &self.config {
            Some(path) => GenerationConfig::load(path)?,
            None => GenerationConfig::default(),
        };

        let input = &mut config.input;
        set(&mut input.base_scene, self.base_scene);
        set(&mut input.properties, self.properties_json);
        set(&mut input.shape_dir, self.shape_dir);
        set(&mut input.material_dir, self.material_dir);
        if self.shape_color_combos_json.is_some() {
            input.shape_color_combos = self.shape_color_combos_json;
        }

        let objects = &mut config.objects;
        set(&mut objects.min_objects, self.min_objects);
        set(&mut objects.max_objects, self.max_objects);
        set(&mut objects.min_dist, self.min_dist);
        set(&mut objects.margin, self.margin);
        objects.enforce_margin |= self.enforce_margin;
        set(&mut objects.min_pixels_per_object, self.min_pixels_per_object);
        objects.enforce_visibility |= self.enforce_visibility;
        set(&mut objects.max_retries, self.max_retries);
        set(&mut objects.max_restarts, self.max_restarts);
        set(&mut objects.max_scene_attempts, self.max_scene_attempts);

        set(&mut config.camera.num_cams, self.num_cams);
        set(&mut config.camera.num_heights, self.num_heights);
        set(&mut config.camera.radius, self.camera_radius);

        let output = &mut config.output;
        set(&mut output.start_idx, self.start_idx);
        set(&mut output.num_images, self.num_images);
        set(&mut output.filename_prefix, self.filename_prefix);
        set(&mut output.split, self.split);
        set(&mut output.output_dir, self.output_dir);
        output.save_snapshots |= self.save_snapshots;
        set(&mut output.version, self.dataset_version);
        set(&mut output.license, self.license);
        set(&mut output.date, self.date);

        let render = &mut config.render;
        render.use_gpu |= self.use_gpu;
        set(&mut render.width, self.width);
        set(&mut render.height, self.height);
        set(&mut render.num_samples, self.render_num_samples);
        set(&mut render.min_bounces, self.render_min_bounces);
        set(&mut render.max_bounces, self.render_max_bounces);
        set(&mut render.tile_size, self.render_tile_size);

        set(&mut config.jitter.key, self.key_light_jitter);
        set(&mut config.jitter.fill, self.fill_light_jitter);
        set(&mut config.jitter.back, self.back_light_jitter);

        set(&mut config.retry.max_attempts, self.render_max_attempts);
        set(&mut config.retry.backoff_ms, self.render_backoff_ms);

        if self.seed.is_some() {
            config.seed = self.seed;
        }
        set(&mut config.eps, self.eps);

        config.validate()?;
        Ok(config)
    }
}

fn run(args: Args) -> bevy_scenegen::Result<()> {
    let config = args.into_config()?;
    info!(
        "generating {} scene(s) from index {} into {}",
        config.output.num_images,
        config.output.start_idx,
        config.output.output_dir.display()
    );

    let mut driver = RenderDriver::from_config(config, SoftwareSceneGraph::new())?;
    let scenes = driver.run()?;
    info!(
        "done: {} scenes, {} frames, {} render retries",
        scenes.len(),
        driver.frames_rendered,
        driver.render_retries
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
