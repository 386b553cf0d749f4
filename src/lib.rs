//! Cellmap - administrative boundaries as spherical cell sets
//!
//! This library reconstructs region boundaries from raw fragments, covers them
//! with cells of a quad-tree over the sphere and drives the per-region pipeline
//! used by the `cellmap` binary.

pub mod cover;
pub mod error;
pub mod generator;
pub mod models;
pub mod ring;
pub mod sphere;

pub use cover::{Coverer, Mode, PreparedGeometry};
pub use error::{CoverError, GeometryError};
pub use models::{Fragment, Region, RegionCode};
pub use ring::{BuildOptions, RingBuilder};
pub use sphere::{CellCollection, CellId};
