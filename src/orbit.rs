//! Deterministic multi-camera orbit around the scene origin.
//!
//! Shots are split over a fixed number of height tiers. Tier `j` sits at polar
//! angle `φ_j = max_polar / tiers · (j + 1)` (measured from +Z, so tier 0 is
//! the most top-down view) and its shots are spread evenly in azimuth:
//!
//! ```text
//! x = R · cos(az) · sin(φ)
//! y = R · sin(az) · sin(φ)
//! z = R · cos(φ)
//! ```
//!
//! Every camera looks at the origin with +Z as up, so repeated runs produce the
//! same multi-view coverage of whatever scene is placed there.

use bevy::prelude::{Transform, Vec3};
use std::f32::consts::{PI, TAU};
use std::path::PathBuf;
use thiserror::Error;

/// Polar angle of the lowest tier: 0.3π (54°) from vertical.
pub const DEFAULT_MAX_POLAR: f32 = 0.3 * PI;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrbitError {
    #[error("orbit needs at least one camera")]
    NoCameras,

    #[error("orbit needs at least one height tier")]
    NoTiers,

    #[error("orbit radius must be positive and finite, got {0}")]
    InvalidRadius(f32),
}

/// Orbit layout.
#[derive(Clone, Debug, PartialEq)]
pub struct OrbitConfig {
    /// Distance from every camera to the origin
    pub radius: f32,
    /// Total number of camera poses
    pub num_cams: usize,
    /// Number of height tiers the poses are split across
    pub num_heights: usize,
    /// Polar angle (radians from +Z) of the last tier
    pub max_polar: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            radius: 10.0,
            num_cams: 8,
            num_heights: 8,
            max_polar: DEFAULT_MAX_POLAR,
        }
    }
}

impl OrbitConfig {
    pub fn validate(&self) -> Result<(), OrbitError> {
        if self.num_cams == 0 {
            return Err(OrbitError::NoCameras);
        }
        if self.num_heights == 0 {
            return Err(OrbitError::NoTiers);
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(OrbitError::InvalidRadius(self.radius));
        }
        Ok(())
    }

    /// Shots assigned to each tier. Earlier tiers absorb the remainder.
    pub fn tier_sizes(&self) -> Vec<usize> {
        if self.num_heights == 0 {
            return Vec::new();
        }
        let base = self.num_cams / self.num_heights;
        let extra = self.num_cams % self.num_heights;
        (0..self.num_heights)
            .map(|tier| base + usize::from(tier < extra))
            .collect()
    }

    /// Polar angle of a tier, strictly increasing with the tier index.
    pub fn polar_angle(&self, tier: usize) -> f32 {
        self.max_polar / self.num_heights as f32 * (tier + 1) as f32
    }
}

/// Azimuth of shot `slot` out of `shots` in a tier.
///
/// Shots are `2π / shots` apart, offset by half a step.
pub fn azimuth(slot: usize, shots: usize) -> f32 {
    (2.0 * slot as f32 - 1.0) * PI / shots as f32
}

/// One camera placement for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraPose {
    /// Position in the orbit sequence (also the image index)
    pub index: usize,
    /// Height tier
    pub tier: usize,
    /// Index within the tier
    pub slot: usize,
    /// Polar angle from +Z in radians
    pub polar: f32,
    /// Azimuth in radians
    pub azimuth: f32,
    /// World transform; translation is the camera position, looking at the origin
    pub transform: Transform,
    /// Azimuth step of this pose's tier in radians
    pub rotation: f32,
    /// Where the rendered frame is written
    pub file_path: PathBuf,
}

impl CameraPose {
    pub fn position(&self) -> Vec3 {
        self.transform.translation
    }

    /// Camera-to-world matrix as nested rows.
    pub fn transform_matrix(&self) -> [[f32; 4]; 4] {
        self.transform.compute_matrix().transpose().to_cols_array_2d()
    }
}

/// Generate the full orbit. `path_for` maps a pose index to its output file.
pub fn generate_orbit<F>(config: &OrbitConfig, mut path_for: F) -> Result<Vec<CameraPose>, OrbitError>
where
    F: FnMut(usize) -> PathBuf,
{
    config.validate()?;

    let mut poses = Vec::with_capacity(config.num_cams);
    for (tier, &shots) in config.tier_sizes().iter().enumerate() {
        let polar = config.polar_angle(tier);
        for slot in 0..shots {
            let az = azimuth(slot, shots);
            let position = Vec3::new(
                config.radius * az.cos() * polar.sin(),
                config.radius * az.sin() * polar.sin(),
                config.radius * polar.cos(),
            );
            let index = poses.len();
            poses.push(CameraPose {
                index,
                tier,
                slot,
                polar,
                azimuth: az,
                transform: Transform::from_translation(position).looking_at(Vec3::ZERO, Vec3::Z),
                rotation: TAU / shots as f32,
                file_path: path_for(index),
            });
        }
    }
    Ok(poses)
}
