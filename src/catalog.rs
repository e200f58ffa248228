//! Property catalog: symbolic shape/material/color/size names and the assets
//! or values they resolve to.
//!
//! The catalog is loaded once per run from a `properties.json` file:
//!
//! ```json
//! {
//!   "shapes":    { "cube": "SmoothCube_v2", "sphere": "Sphere" },
//!   "colors":    { "red": [173, 35, 35], "blue": [42, 75, 215] },
//!   "materials": { "rubber": "Rubber", "metal": "MyMetal" },
//!   "sizes":     { "large": 0.7, "small": 0.35 }
//! }
//! ```
//!
//! Every lookup that can miss returns [`CatalogError::UnknownKey`], so bad data
//! is caught before the scene graph is touched.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or querying the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("catalog table `{0}` is empty")]
    EmptyTable(&'static str),

    #[error("unknown {table} key `{key}`")]
    UnknownKey { table: &'static str, key: String },

    #[error("{table} id `{id}` is mapped from more than one name")]
    DuplicateId { table: &'static str, id: String },

    #[error("size `{name}` has invalid scale {scale}")]
    InvalidSize { name: String, scale: f32 },

    #[error("shape `{0}` has no allowed colors")]
    EmptyColorList(String),
}

/// Two-way mapping between symbolic names and asset ids.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameMap {
    table: &'static str,
    by_name: BTreeMap<String, String>,
    by_id: BTreeMap<String, String>,
}

impl NameMap {
    fn build(table: &'static str, entries: BTreeMap<String, String>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::EmptyTable(table));
        }
        let mut by_id = BTreeMap::new();
        for (name, id) in &entries {
            if by_id.insert(id.clone(), name.clone()).is_some() {
                return Err(CatalogError::DuplicateId {
                    table,
                    id: id.clone(),
                });
            }
        }
        Ok(Self {
            table,
            by_name: entries,
            by_id,
        })
    }

    /// Asset id for a symbolic name.
    pub fn id(&self, name: &str) -> Result<&str, CatalogError> {
        self.by_name
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CatalogError::UnknownKey {
                table: self.table,
                key: name.to_string(),
            })
    }

    /// Symbolic name for an asset id.
    pub fn name(&self, id: &str) -> Result<&str, CatalogError> {
        self.by_id
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| CatalogError::UnknownKey {
                table: self.table,
                key: id.to_string(),
            })
    }

    /// Whether `name` is a known symbolic name.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct PropertiesFile {
    shapes: BTreeMap<String, String>,
    colors: BTreeMap<String, [u8; 3]>,
    materials: BTreeMap<String, String>,
    sizes: BTreeMap<String, f32>,
}

/// Resolved property catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    shapes: NameMap,
    materials: NameMap,
    colors: BTreeMap<String, [f32; 4]>,
    sizes: BTreeMap<String, f32>,
}

impl Catalog {
    /// Load and validate a `properties.json` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json = read_file(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Parse and validate catalog JSON already in memory.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: PropertiesFile = serde_json::from_str(json)?;

        if file.colors.is_empty() {
            return Err(CatalogError::EmptyTable("colors"));
        }
        if file.sizes.is_empty() {
            return Err(CatalogError::EmptyTable("sizes"));
        }
        for (name, &scale) in &file.sizes {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(CatalogError::InvalidSize {
                    name: name.clone(),
                    scale,
                });
            }
        }

        // RGB bytes become linear RGBA with full opacity.
        let colors = file
            .colors
            .into_iter()
            .map(|(name, rgb)| {
                let rgba = [
                    rgb[0] as f32 / 255.0,
                    rgb[1] as f32 / 255.0,
                    rgb[2] as f32 / 255.0,
                    1.0,
                ];
                (name, rgba)
            })
            .collect();

        Ok(Self {
            shapes: NameMap::build("shape", file.shapes)?,
            materials: NameMap::build("material", file.materials)?,
            colors,
            sizes: file.sizes,
        })
    }

    /// Shape names ↔ shape asset ids.
    pub fn shapes(&self) -> &NameMap {
        &self.shapes
    }

    /// Material names ↔ material asset ids.
    pub fn materials(&self) -> &NameMap {
        &self.materials
    }

    /// RGBA in `[0, 1]` for a color name.
    pub fn color_rgba(&self, name: &str) -> Result<[f32; 4], CatalogError> {
        self.colors
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::UnknownKey {
                table: "color",
                key: name.to_string(),
            })
    }

    /// Nominal scale for a size name.
    pub fn size_scale(&self, name: &str) -> Result<f32, CatalogError> {
        self.sizes
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::UnknownKey {
                table: "size",
                key: name.to_string(),
            })
    }

    /// Color names in sorted order.
    pub fn color_names(&self) -> impl Iterator<Item = &str> {
        self.colors.keys().map(String::as_str)
    }

    /// `(name, scale)` pairs in sorted name order.
    pub fn sizes(&self) -> impl Iterator<Item = (&str, f32)> {
        self.sizes.iter().map(|(name, &scale)| (name.as_str(), scale))
    }
}

/// Optional table restricting which colors each shape may take.
///
/// Loaded from JSON of the form `{"cube": ["gray", "blue"], "sphere": ["red"]}`.
/// Every shape and color must exist in the catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeColorRestriction {
    allowed: BTreeMap<String, Vec<String>>,
}

impl ShapeColorRestriction {
    /// Load a restriction file, checking every key against `catalog`.
    pub fn load<P: AsRef<Path>>(path: P, catalog: &Catalog) -> Result<Self, CatalogError> {
        let json = read_file(path.as_ref())?;
        Self::from_json_str(&json, catalog)
    }

    /// Parse a restriction table already in memory.
    pub fn from_json_str(json: &str, catalog: &Catalog) -> Result<Self, CatalogError> {
        let allowed: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
        if allowed.is_empty() {
            return Err(CatalogError::EmptyTable("shape_color_combos"));
        }
        for (shape, colors) in &allowed {
            catalog.shapes().id(shape)?;
            if colors.is_empty() {
                return Err(CatalogError::EmptyColorList(shape.clone()));
            }
            for color in colors {
                catalog.color_rgba(color)?;
            }
        }
        Ok(Self { allowed })
    }

    /// Restricted shapes in sorted order.
    pub fn shapes(&self) -> impl Iterator<Item = &str> {
        self.allowed.keys().map(String::as_str)
    }

    /// Colors `shape` may take, or `None` if the shape is not in the table.
    pub fn allowed_colors(&self, shape: &str) -> Option<&[String]> {
        self.allowed.get(shape).map(Vec::as_slice)
    }
}

fn read_file(path: &Path) -> Result<String, CatalogError> {
    fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}
