//! Recompute the spatial relations of saved scenes.
//!
//! Usage:
//!   cargo run --bin relations -- output/CLEVR_new_000000/scene.json --eps 0.3
//!   cargo run --bin relations -- output/*/scene.json --in-place
//!
//! Relations are derived from the stored object positions and directions, so
//! a dataset can be re-labelled with a different slack without re-rendering.

use bevy_scenegen::manifest::SceneRecord;
use bevy_scenegen::relations::{DEFAULT_EPS, PLANAR_RELATIONS};
use clap::Parser;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "relations", about = "Recompute pairwise relations of saved scenes")]
struct Args {
    /// Scene records to process
    #[arg(required = true)]
    scenes: Vec<PathBuf>,

    /// Slack for spatial relations
    #[arg(long, default_value_t = DEFAULT_EPS)]
    eps: f32,

    /// Overwrite each record instead of printing a summary
    #[arg(long)]
    in_place: bool,
}

fn process(path: &Path, args: &Args) -> bevy_scenegen::Result<()> {
    let record = SceneRecord::load(path)?;
    let mut spec = record.to_spec();
    let table = spec.compute_relationships(args.eps);

    let changed = *table != record.relationships;
    for name in PLANAR_RELATIONS {
        let pairs: usize = table.get(name).map_or(0, |rows| rows.iter().map(Vec::len).sum());
        println!("{}\t{}\t{}", path.display(), name, pairs);
    }

    if args.in_place && changed {
        SceneRecord::from_spec(&spec, record.info).save(path)?;
        info!("updated {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut failures = 0;
    for path in &args.scenes {
        if let Err(e) = process(path, &args) {
            error!("{}: {}", path.display(), e);
            failures += 1;
        }
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
