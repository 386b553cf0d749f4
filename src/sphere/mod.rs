//! Quad-tree subdivision of the sphere.
//!
//! Cells are addressed by face, level and integer `(i, j)` coordinates and
//! packed into sortable 64-bit identifiers.

mod cell;
mod collection;
pub mod coords;

pub use cell::CellId;
pub use collection::CellCollection;
pub use coords::{coord_from_point, point_from_coord, EARTH_RADIUS_KM, MAX_LEVEL};
