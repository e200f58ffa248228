//! Per-slot attribute sampling: shape, color, material, size and rotation.

use crate::catalog::{Catalog, CatalogError, ShapeColorRestriction};
use crate::geometry::sample_rotation_deg;
use rand::seq::SliceRandom;
use rand::Rng;
use std::f32::consts::SQRT_2;

/// Attributes drawn for one slot, before it is positioned.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeBundle {
    /// Symbolic shape name (catalog key)
    pub shape: String,
    /// Symbolic color name (catalog key)
    pub color: String,
    /// Symbolic material name (catalog key)
    pub material: String,
    /// Symbolic size name (catalog key)
    pub size: String,
    /// Nominal scale from the size table
    pub scale: f32,
    /// Footprint radius used for collision checks; also the scale the object is rendered at
    pub radius: f32,
    /// Rotation about the vertical axis in degrees, `[0, 360)`
    pub rotation_deg: f32,
}

/// Whether a shape needs the diagonal correction.
///
/// Either the symbolic name or the asset id may mark the shape as a cube, so
/// catalogs that alias a cube asset under another name still get shrunk.
pub fn is_cube_like(shape: &str, asset_id: &str) -> bool {
    shape.eq_ignore_ascii_case("cube") || asset_id.to_ascii_lowercase().contains("cube")
}

/// Derive the collision radius from a shape, its asset id and its nominal scale.
///
/// Spheres and cylinders of scale `s` have a footprint radius of `s`. A cube of
/// the same nominal scale has a half-diagonal of `s·√2`, so it is shrunk by
/// `1/√2` to keep every shape inside the same bounding radius.
pub fn compute_collision_radius(shape: &str, asset_id: &str, scale: f32) -> f32 {
    if is_cube_like(shape, asset_id) {
        scale / SQRT_2
    } else {
        scale
    }
}

/// Draws [`AttributeBundle`]s from a catalog, optionally under a shape→colors restriction.
pub struct AttributeSampler<'a> {
    catalog: &'a Catalog,
    restriction: Option<&'a ShapeColorRestriction>,
    shapes: Vec<&'a str>,
    colors: Vec<&'a str>,
    materials: Vec<&'a str>,
    sizes: Vec<(&'a str, f32)>,
}

impl<'a> AttributeSampler<'a> {
    pub fn new(catalog: &'a Catalog, restriction: Option<&'a ShapeColorRestriction>) -> Self {
        let shapes = match restriction {
            Some(table) => table.shapes().collect(),
            None => catalog.shapes().names().collect(),
        };
        Self {
            catalog,
            restriction,
            shapes,
            colors: catalog.color_names().collect(),
            materials: catalog.materials().names().collect(),
            sizes: catalog.sizes().collect(),
        }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Draw one bundle.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<AttributeBundle, CatalogError> {
        let &(size, scale) = self
            .sizes
            .choose(rng)
            .ok_or(CatalogError::EmptyTable("sizes"))?;

        let shape = *self
            .shapes
            .choose(rng)
            .ok_or(CatalogError::EmptyTable("shape"))?;
        let asset_id = self.catalog.shapes().id(shape)?;

        let color = match self.restriction {
            Some(table) => table
                .allowed_colors(shape)
                .and_then(|allowed| allowed.choose(&mut *rng))
                .map(String::as_str)
                .ok_or_else(|| CatalogError::EmptyColorList(shape.to_string()))?,
            None => *self
                .colors
                .choose(rng)
                .ok_or(CatalogError::EmptyTable("colors"))?,
        };

        let material = *self
            .materials
            .choose(rng)
            .ok_or(CatalogError::EmptyTable("material"))?;

        Ok(AttributeBundle {
            shape: shape.to_string(),
            color: color.to_string(),
            material: material.to_string(),
            size: size.to_string(),
            scale,
            radius: compute_collision_radius(shape, asset_id, scale),
            rotation_deg: sample_rotation_deg(rng),
        })
    }

    /// Draw one bundle per slot.
    pub fn sample_many<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<AttributeBundle>, CatalogError> {
        (0..count).map(|_| self.sample(rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::PROPERTIES;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    #[test]
    fn test_collision_radius_cube_shrink() {
        let cube = compute_collision_radius("cube", "SmoothCube_v2", 0.7);
        assert!((cube - 0.7 / SQRT_2).abs() < 1e-6);
        assert!((compute_collision_radius("Cube", "Block", 1.0) - 0.707_106_77).abs() < 1e-6);
        assert_eq!(compute_collision_radius("sphere", "Sphere", 0.7), 0.7);
        assert_eq!(compute_collision_radius("cylinder", "SmoothCylinder", 0.35), 0.35);
    }

    #[test]
    fn test_collision_radius_keys_on_asset_id() {
        let aliased = compute_collision_radius("block", "SmoothCube_v2", 0.7);
        assert!((aliased - 0.7 / SQRT_2).abs() < 1e-6);
        assert!(!is_cube_like("cuboid", "Brick"));

        let catalog = Catalog::from_json_str(
            r#"{
                "shapes": {"block": "SmoothCube_v2"},
                "colors": {"red": [173, 35, 35]},
                "materials": {"rubber": "Rubber"},
                "sizes": {"large": 0.7}
            }"#,
        )
        .unwrap();
        let sampler = AttributeSampler::new(&catalog, None);
        let bundle = sampler.sample(&mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(bundle.shape, "block");
        assert_eq!(bundle.scale, 0.7);
        assert!((bundle.radius - 0.7 / SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_unrestricted_sampling_covers_catalog() {
        let catalog = Catalog::from_json_str(PROPERTIES).unwrap();
        let sampler = AttributeSampler::new(&catalog, None);
        let mut rng = StdRng::seed_from_u64(5);
        let bundles = sampler.sample_many(2000, &mut rng).unwrap();

        let shapes: BTreeSet<_> = bundles.iter().map(|b| b.shape.as_str()).collect();
        let colors: BTreeSet<_> = bundles.iter().map(|b| b.color.as_str()).collect();
        let materials: BTreeSet<_> = bundles.iter().map(|b| b.material.as_str()).collect();
        let sizes: BTreeSet<_> = bundles.iter().map(|b| b.size.as_str()).collect();
        assert_eq!(shapes.len(), 3);
        assert_eq!(colors.len(), 8);
        assert_eq!(materials.len(), 2);
        assert_eq!(sizes.len(), 2);
    }

    #[test]
    fn test_bundle_radius_matches_shape() {
        let catalog = Catalog::from_json_str(PROPERTIES).unwrap();
        let sampler = AttributeSampler::new(&catalog, None);
        let mut rng = StdRng::seed_from_u64(9);
        for bundle in sampler.sample_many(500, &mut rng).unwrap() {
            assert_eq!(bundle.scale, catalog.size_scale(&bundle.size).unwrap());
            assert_eq!(
                bundle.radius,
                compute_collision_radius(
                    &bundle.shape,
                    catalog.shapes().id(&bundle.shape).unwrap(),
                    bundle.scale
                )
            );
            assert!((0.0..360.0).contains(&bundle.rotation_deg));
        }
    }

    #[test]
    fn test_restricted_sampling_respects_table() {
        let catalog = Catalog::from_json_str(PROPERTIES).unwrap();
        let restriction = ShapeColorRestriction::from_json_str(
            r#"{"cube": ["gray", "blue"], "cylinder": ["red"]}"#,
            &catalog,
        )
        .unwrap();
        let sampler = AttributeSampler::new(&catalog, Some(&restriction));
        let mut rng = StdRng::seed_from_u64(21);

        let mut seen_shapes = BTreeSet::new();
        for bundle in sampler.sample_many(1000, &mut rng).unwrap() {
            seen_shapes.insert(bundle.shape.clone());
            match bundle.shape.as_str() {
                "cube" => assert!(bundle.color == "gray" || bundle.color == "blue"),
                "cylinder" => assert_eq!(bundle.color, "red"),
                other => panic!("unexpected shape {}", other),
            }
        }
        assert_eq!(seen_shapes.len(), 2);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let catalog = Catalog::from_json_str(PROPERTIES).unwrap();
        let sampler = AttributeSampler::new(&catalog, None);
        let a = sampler.sample_many(20, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = sampler.sample_many(20, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }
}
