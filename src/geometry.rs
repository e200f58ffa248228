//! Vector helpers and random sampling primitives.
//!
//! Scenes are Z-up: the ground plane is `z = 0` and every object rests on it,
//! so collision checks only ever look at the `(x, y)` components.

use bevy::math::{Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Normal of the ground plane.
pub const GROUND_NORMAL: Vec3 = Vec3::Z;

/// Rectangular region of the ground plane that object centers are drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl Bounds {
    pub fn new(x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Square region `[-half_extent, half_extent]²` centered on the origin.
    pub fn square(half_extent: f32) -> Self {
        Self::new(-half_extent, half_extent, -half_extent, half_extent)
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    /// A region is usable only if both extents are strictly positive and finite.
    pub fn is_valid(&self) -> bool {
        self.width().is_finite() && self.height().is_finite() && self.width() > 0.0 && self.height() > 0.0
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x_min && point.x <= self.x_max && point.y >= self.y_min && point.y <= self.y_max
    }

    /// Draw a point uniformly from the region.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        Vec2::new(
            rng.gen_range(self.x_min..=self.x_max),
            rng.gen_range(self.y_min..=self.y_max),
        )
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::square(3.0)
    }
}

/// Euclidean distance between two ground-plane points.
pub fn planar_distance(a: Vec2, b: Vec2) -> f32 {
    a.distance(b)
}

/// Gap between two discs: center distance minus both radii. Negative when they overlap.
pub fn clearance(a: Vec2, radius_a: f32, b: Vec2, radius_b: f32) -> f32 {
    planar_distance(a, b) - radius_a - radius_b
}

/// Signed length of the displacement `from -> to` along `direction`.
pub fn directional_offset(from: Vec3, to: Vec3, direction: Vec3) -> f32 {
    (to - from).dot(direction)
}

/// Project a vector onto the ground plane and normalize it.
///
/// Returns `Vec3::ZERO` for vectors parallel to the plane normal.
pub fn project_onto_ground(v: Vec3) -> Vec3 {
    (v - v.dot(GROUND_NORMAL) * GROUND_NORMAL).normalize_or_zero()
}

/// Uniform offset in `[-magnitude, magnitude]` on every axis.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, magnitude: f32) -> Vec3 {
    if magnitude <= 0.0 {
        return Vec3::ZERO;
    }
    Vec3::new(
        rng.gen_range(-magnitude..=magnitude),
        rng.gen_range(-magnitude..=magnitude),
        rng.gen_range(-magnitude..=magnitude),
    )
}

/// Rotation about the vertical axis, in degrees, uniform in `[0, 360)`.
pub fn sample_rotation_deg<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.gen_range(0.0..360.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_planar_distance() {
        let d = planar_distance(Vec2::new(0.0, 0.0), Vec2::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_clearance_negative_on_overlap() {
        let gap = clearance(Vec2::ZERO, 1.0, Vec2::new(1.5, 0.0), 1.0);
        assert!((gap + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_directional_offset_sign() {
        let from = Vec3::new(0.0, 0.0, 0.5);
        let to = Vec3::new(-2.0, 0.0, 0.5);
        assert!(directional_offset(from, to, Vec3::NEG_X) > 0.0);
        assert!(directional_offset(from, to, Vec3::X) < 0.0);
        assert!(directional_offset(from, to, Vec3::Y).abs() < 1e-6);
    }

    #[test]
    fn test_project_onto_ground() {
        let v = project_onto_ground(Vec3::new(1.0, 1.0, 5.0));
        assert!(v.z.abs() < 1e-6);
        assert!((v.length() - 1.0).abs() < 1e-5);
        assert_eq!(project_onto_ground(Vec3::Z), Vec3::ZERO);
    }

    #[test]
    fn test_bounds_sample_inside() {
        let bounds = Bounds::square(3.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(bounds.contains(bounds.sample(&mut rng)));
        }
    }

    #[test]
    fn test_bounds_validity() {
        assert!(Bounds::default().is_valid());
        assert!(!Bounds::new(1.0, 1.0, 0.0, 2.0).is_valid());
        assert!(!Bounds::new(0.0, 2.0, 3.0, -3.0).is_valid());
    }

    #[test]
    fn test_jitter_magnitude() {
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(jitter(&mut rng, 0.0), Vec3::ZERO);
        for _ in 0..200 {
            let j = jitter(&mut rng, 1.0);
            assert!(j.abs().max_element() <= 1.0);
        }
    }

    #[test]
    fn test_rotation_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let r = sample_rotation_deg(&mut rng);
            assert!((0.0..360.0).contains(&r));
        }
    }
}
