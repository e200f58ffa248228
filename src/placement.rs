//! Constrained random placement of object footprints on the ground plane.
//!
//! Each slot is a disc of known radius. Candidates are drawn uniformly from
//! [`Bounds`] and rejected until they keep `min_dist` clearance from every
//! disc accepted so far. When one slot burns through its local retries the
//! whole batch is thrown away and placement starts again from the first slot;
//! the number of such restarts is capped so a run can never spin forever.

use crate::geometry::{clearance, Bounds};
use bevy::math::Vec2;
use log::{debug, trace};
use rand::Rng;
use std::f32::consts::PI;
use thiserror::Error;

/// Densest packing of equal discs in the plane (hexagonal): π / (2√3).
pub const HEX_PACKING_DENSITY: f32 = 0.906_899_7;

/// One accepted footprint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

impl Placement {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Optional spacing rule along the scene's cardinal directions.
///
/// A candidate is rejected when, along any of `directions`, it sits strictly
/// between 0 and `margin` away from an already accepted object. This keeps
/// "left of" / "in front of" judgements away from the ambiguous band.
#[derive(Clone, Debug, PartialEq)]
pub struct MarginConstraint {
    pub margin: f32,
    /// Planar unit vectors (usually left, right, front, behind).
    pub directions: Vec<Vec2>,
}

/// Placement tuning knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementConfig {
    /// Minimum gap between the edges of any two discs
    pub min_dist: f32,
    /// Region the disc centers are drawn from
    pub bounds: Bounds,
    /// Candidates tried for one slot before the whole batch restarts
    pub max_local_retries: u32,
    /// Whole-batch restarts allowed before giving up
    pub max_restarts: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            min_dist: 0.25,
            bounds: Bounds::default(),
            max_local_retries: 50,
            max_restarts: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    #[error("placement bounds are empty or not finite: {0:?}")]
    InvalidBounds(Bounds),

    #[error("slot {slot} has an invalid collision radius: {radius}")]
    InvalidRadius { slot: usize, radius: f32 },

    #[error("{count} objects need {required:.2} units² of padded footprint but the region holds at most {capacity:.2}")]
    Infeasible {
        count: usize,
        required: f32,
        capacity: f32,
    },

    #[error("could not place {count} objects after {restarts} full restarts")]
    Exhausted { count: usize, restarts: u32 },
}

/// Rejection sampler with whole-batch restarts.
#[derive(Clone, Debug, Default)]
pub struct PlacementEngine {
    config: PlacementConfig,
    margin: Option<MarginConstraint>,
}

impl PlacementEngine {
    pub fn new(config: PlacementConfig) -> Self {
        Self {
            config,
            margin: None,
        }
    }

    /// Also enforce the cardinal-direction margin.
    pub fn with_margin(mut self, margin: MarginConstraint) -> Self {
        self.margin = Some(margin);
        self
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Reject requests that cannot fit even under the densest possible packing.
    ///
    /// This is a necessary condition only: passing it does not promise the
    /// sampler will find a layout, but failing it proves nothing ever will.
    pub fn check_feasible(&self, radii: &[f32]) -> Result<(), PlacementError> {
        let bounds = &self.config.bounds;
        if !bounds.is_valid() {
            return Err(PlacementError::InvalidBounds(*bounds));
        }
        for (slot, &radius) in radii.iter().enumerate() {
            if !radius.is_finite() || radius < 0.0 {
                return Err(PlacementError::InvalidRadius { slot, radius });
            }
        }
        if radii.len() < 2 {
            return Ok(());
        }

        let pad = self.config.min_dist.max(0.0) / 2.0;
        let r_max = radii.iter().copied().fold(0.0_f32, f32::max);
        let required: f32 = radii.iter().map(|r| PI * (r + pad) * (r + pad)).sum();
        let capacity = HEX_PACKING_DENSITY
            * (bounds.width() + 2.0 * (r_max + pad))
            * (bounds.height() + 2.0 * (r_max + pad));

        if required > capacity {
            return Err(PlacementError::Infeasible {
                count: radii.len(),
                required,
                capacity,
            });
        }
        Ok(())
    }

    /// Place one disc per entry of `radii`, returning them in slot order.
    pub fn place<R: Rng + ?Sized>(
        &self,
        radii: &[f32],
        rng: &mut R,
    ) -> Result<Vec<Placement>, PlacementError> {
        self.check_feasible(radii)?;

        let mut accepted = Vec::with_capacity(radii.len());
        for restart in 0..=self.config.max_restarts {
            accepted.clear();
            match self.fill_batch(radii, &mut accepted, rng) {
                Ok(()) => {
                    if restart > 0 {
                        debug!("placed {} objects after {} restarts", radii.len(), restart);
                    }
                    return Ok(accepted);
                }
                Err(slot) => {
                    debug!(
                        "slot {} exceeded {} retries, restarting placement ({}/{})",
                        slot,
                        self.config.max_local_retries,
                        restart + 1,
                        self.config.max_restarts
                    );
                }
            }
        }

        Err(PlacementError::Exhausted {
            count: radii.len(),
            restarts: self.config.max_restarts,
        })
    }

    /// Fill every slot or report the slot that ran out of retries.
    fn fill_batch<R: Rng + ?Sized>(
        &self,
        radii: &[f32],
        accepted: &mut Vec<Placement>,
        rng: &mut R,
    ) -> Result<(), usize> {
        for (slot, &radius) in radii.iter().enumerate() {
            let mut tries = 0u32;
            loop {
                tries += 1;
                if tries > self.config.max_local_retries {
                    return Err(slot);
                }
                let candidate = self.config.bounds.sample(rng);
                if self.accepts(candidate, radius, accepted) {
                    trace!("slot {} accepted after {} tries", slot, tries);
                    accepted.push(Placement {
                        x: candidate.x,
                        y: candidate.y,
                        radius,
                    });
                    break;
                }
            }
        }
        Ok(())
    }

    fn accepts(&self, candidate: Vec2, radius: f32, accepted: &[Placement]) -> bool {
        accepted.iter().all(|other| {
            if clearance(candidate, radius, other.position(), other.radius) < self.config.min_dist {
                return false;
            }
            match &self.margin {
                Some(rule) => {
                    let delta = candidate - other.position();
                    rule.directions.iter().all(|dir| {
                        let along = delta.dot(*dir);
                        !(along > 0.0 && along < rule.margin)
                    })
                }
                None => true,
            }
        })
    }
}

/// Minimum pairwise clearance of a finished layout (`f32::INFINITY` for fewer than two discs).
pub fn min_clearance(placements: &[Placement]) -> f32 {
    let mut min = f32::INFINITY;
    for (i, a) in placements.iter().enumerate() {
        for b in &placements[i + 1..] {
            min = min.min(clearance(a.position(), a.radius, b.position(), b.radius));
        }
    }
    min
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine(min_dist: f32, half_extent: f32, retries: u32) -> PlacementEngine {
        PlacementEngine::new(PlacementConfig {
            min_dist,
            bounds: Bounds::square(half_extent),
            max_local_retries: retries,
            max_restarts: 1000,
        })
    }

    #[test]
    fn test_placement_respects_min_dist() {
        let engine = engine(0.25, 3.0, 50);
        let radii = [0.7, 0.35, 0.7, 0.35, 0.49, 0.7];
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let placed = engine.place(&radii, &mut rng).unwrap();
            assert_eq!(placed.len(), radii.len());
            assert!(min_clearance(&placed) >= 0.25 - 1e-5, "seed {}", seed);
        }
    }

    #[test]
    fn test_placement_keeps_slot_order_and_radii() {
        let engine = engine(0.1, 3.0, 50);
        let radii = [0.1, 0.2, 0.3];
        let mut rng = StdRng::seed_from_u64(1);
        let placed = engine.place(&radii, &mut rng).unwrap();
        let got: Vec<f32> = placed.iter().map(|p| p.radius).collect();
        assert_eq!(got, radii);
        for p in &placed {
            assert!(Bounds::square(3.0).contains(p.position()));
        }
    }

    #[test]
    fn test_tight_layout_eventually_succeeds() {
        // Two unit discs in a 3x3 box: most candidates collide, restarts are common.
        let engine = engine(0.0, 1.5, 5);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let placed = engine.place(&[1.0, 1.0], &mut rng).unwrap();
            assert!(min_clearance(&placed) >= -1e-5);
        }
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let engine = PlacementEngine::new(PlacementConfig {
            max_local_retries: 0,
            max_restarts: 3,
            ..PlacementConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(0);
        let err = engine.place(&[0.5, 0.5], &mut rng).unwrap_err();
        assert_eq!(
            err,
            PlacementError::Exhausted {
                count: 2,
                restarts: 3
            }
        );
    }

    #[test]
    fn test_infeasible_request_fails_fast() {
        let engine = engine(0.25, 1.0, 50);
        let radii = vec![0.7; 40];
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            engine.place(&radii, &mut rng),
            Err(PlacementError::Infeasible { count: 40, .. })
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        let bad_bounds = PlacementEngine::new(PlacementConfig {
            bounds: Bounds::new(1.0, -1.0, 0.0, 1.0),
            ..PlacementConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            bad_bounds.place(&[0.5], &mut rng),
            Err(PlacementError::InvalidBounds(_))
        ));

        let engine = PlacementEngine::default();
        assert!(matches!(
            engine.place(&[0.5, f32::NAN], &mut rng),
            Err(PlacementError::InvalidRadius { slot: 1, .. })
        ));
    }

    #[test]
    fn test_empty_request() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(PlacementEngine::default().place(&[], &mut rng).unwrap().is_empty());
    }

    #[test]
    fn test_margin_constraint() {
        let directions = vec![Vec2::X, Vec2::NEG_X, Vec2::Y, Vec2::NEG_Y];
        let engine = engine(0.0, 3.0, 200).with_margin(MarginConstraint {
            margin: 0.4,
            directions: directions.clone(),
        });
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let placed = engine.place(&[0.1, 0.1, 0.1, 0.1], &mut rng).unwrap();
            for (i, a) in placed.iter().enumerate() {
                for (j, b) in placed.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let delta = a.position() - b.position();
                    for dir in &directions {
                        let along = delta.dot(*dir);
                        // Only the later slot was checked against the earlier one,
                        // but the rule is symmetric under direction negation.
                        assert!(!(along > 1e-4 && along < 0.4 - 1e-4), "seed {}", seed);
                    }
                }
            }
        }
    }

    #[test]
    fn test_placement_error_display() {
        let err = PlacementError::Exhausted {
            count: 4,
            restarts: 10,
        };
        assert!(err.to_string().contains("4 objects"));
        assert!(err.to_string().contains("10"));
    }
}
