//! Crate-level error type.

use crate::batch::DriverError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::manifest::ManifestError;
use crate::orbit::OrbitError;
use crate::placement::PlacementError;
use crate::scene::{AssemblyError, SceneGraphError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Orbit(#[from] OrbitError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    SceneGraph(#[from] SceneGraphError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub type Result<T> = std::result::Result<T, Error>;
