//! Boundary reconstruction.
//!
//! Turns the unordered, arbitrarily directed fragments of a region boundary
//! into closed rings and assembles them into polygons with holes.

mod builder;
mod table;

pub use builder::{BuildOptions, CoastlineOmission, RingBuilder};
pub use table::{GeometryTable, Role, Segment, ANTARCTIC_SEGMENT_ID};
