//! Scene reference frame and pairwise spatial relations.
//!
//! Directions are derived once per scene from a reference camera and flattened
//! onto the ground plane, so "left" means left as seen from that camera. A
//! relation `rel` holds from object `i` to object `j` when the displacement
//! `j - i` projects onto the relation's direction by more than `eps`.

use crate::geometry::{directional_offset, project_onto_ground, GROUND_NORMAL};
use bevy::math::Vec2;
use bevy::prelude::{Transform, Vec3};
use std::collections::BTreeMap;

/// Default slack that keeps near-perpendicular pairs out of every relation.
pub const DEFAULT_EPS: f32 = 0.2;

/// Relations that never enter the pairwise table.
pub const VERTICAL_RELATIONS: [&str; 2] = ["above", "below"];

/// Relations that do.
pub const PLANAR_RELATIONS: [&str; 4] = ["behind", "front", "left", "right"];

/// Relation name → direction vector.
pub type Directions = BTreeMap<String, Vec3>;

/// Relation name → (object `i` → sorted indices `j` with `relation(i → j)`).
pub type RelationshipTable = BTreeMap<String, Vec<Vec<usize>>>;

/// Derive the six scene directions from a camera transform.
pub fn directions_from_camera(camera: &Transform) -> Directions {
    let forward = camera.rotation * Vec3::NEG_Z;
    let left = camera.rotation * Vec3::NEG_X;

    let behind = project_onto_ground(forward);
    let left = project_onto_ground(left);

    let mut directions = Directions::new();
    directions.insert("behind".to_string(), behind);
    directions.insert("front".to_string(), -behind);
    directions.insert("left".to_string(), left);
    directions.insert("right".to_string(), -left);
    directions.insert("above".to_string(), GROUND_NORMAL);
    directions.insert("below".to_string(), -GROUND_NORMAL);
    directions
}

/// Planar parts of the four horizontal directions, for margin checks during placement.
pub fn planar_directions(directions: &Directions) -> Vec<Vec2> {
    PLANAR_RELATIONS
        .iter()
        .filter_map(|name| directions.get(*name))
        .map(|d| d.truncate())
        .collect()
}

/// Compute the relationship table for a set of object positions.
pub fn infer_relationships(positions: &[Vec3], directions: &Directions, eps: f32) -> RelationshipTable {
    let mut table = RelationshipTable::new();
    for (name, &direction) in directions {
        if VERTICAL_RELATIONS.contains(&name.as_str()) {
            continue;
        }
        let rows = positions
            .iter()
            .enumerate()
            .map(|(i, &from)| {
                positions
                    .iter()
                    .enumerate()
                    .filter(|&(j, &to)| j != i && directional_offset(from, to, direction) > eps)
                    .map(|(j, _)| j)
                    .collect::<Vec<_>>()
            })
            .collect();
        table.insert(name.clone(), rows);
    }
    table
}
